use tracing::instrument;

use crate::cache::store::Store;
use crate::cache::{Freshness, USERS_TTL};
use crate::fleet::models::{User, UserId};
use crate::fleet::FleetApi;
use crate::prelude::*;

pub const ROSTER_KEY: &str = "users";

/// User roster behind the freshness layer.
#[derive(Clone)]
pub struct RosterCache<S> {
    api: FleetApi,
    freshness: Freshness<S>,
}

impl<S: Store> RosterCache<S> {
    pub fn new(api: FleetApi, freshness: Freshness<S>) -> Self {
        Self { api, freshness }
    }

    #[instrument(skip_all, fields(force = force))]
    pub async fn get(&self, force: bool) -> Result<Vec<User>> {
        let api = self.api.clone();
        self.freshness
            .get(ROSTER_KEY, USERS_TTL, force, move || async move {
                api.list_users().await
            })
            .await
    }

    pub async fn get_user(&self, user_id: UserId, force: bool) -> Result<Option<User>> {
        Ok(self
            .get(force)
            .await?
            .into_iter()
            .find(|user| user.id == user_id))
    }
}
