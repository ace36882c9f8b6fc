use async_trait::async_trait;
use tracing::instrument;

use crate::cache::store::Store;
use crate::cache::{Freshness, LOCATIONS_TTL};
use crate::fleet::models::{UserId, VehicleLocation};
use crate::fleet::FleetApi;
use crate::poller::LocationSource;
use crate::prelude::*;

/// Per-user vehicle locations behind the freshness layer.
#[derive(Clone)]
pub struct LocationCache<S> {
    api: FleetApi,
    freshness: Freshness<S>,
}

impl<S: Store> LocationCache<S> {
    pub fn new(api: FleetApi, freshness: Freshness<S>) -> Self {
        Self { api, freshness }
    }

    #[instrument(skip_all, fields(user_id = user_id, force = force))]
    pub async fn get(&self, user_id: UserId, force: bool) -> Result<Vec<VehicleLocation>> {
        let api = self.api.clone();
        self.freshness
            .get(&cache_key(user_id), LOCATIONS_TTL, force, move || async move {
                api.user_locations(user_id).await
            })
            .await
    }
}

#[async_trait]
impl<S: Store + 'static> LocationSource for LocationCache<S> {
    async fn locations(&self, user_id: UserId, force: bool) -> Result<Vec<VehicleLocation>> {
        self.get(user_id, force).await
    }
}

fn cache_key(user_id: UserId) -> String {
    format!("user_{}_locations", user_id)
}
