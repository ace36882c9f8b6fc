use itertools::Itertools;
use tracing::{info, warn};

use crate::cache::roster::RosterCache;
use crate::cache::Freshness;
use crate::fleet::FleetApi;
use crate::opts::RosterOpts;
use crate::prelude::*;
use crate::redis;

pub async fn run(opts: RosterOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "roster"));

    let api = FleetApi::new(&opts.connections.api_url)?;
    let redis = redis::open(&opts.connections.redis_uri).await?;
    let roster = RosterCache::new(api, Freshness::new(redis));

    let mut users = roster.get(opts.force).await?;
    if users.is_empty() {
        // The UI shows «No users returned from service» with a retry button.
        warn!("no users returned from the service, retrying with a forced refetch");
        users = roster.get(true).await?;
    }
    if users.is_empty() {
        return Err(anyhow!("no users returned from the service"));
    }

    info!(n_users = users.len(), "done");
    for user in &users {
        let vehicles = user
            .vehicles
            .iter()
            .map(|vehicle| format!("{} {}", vehicle.make, vehicle.model))
            .join(", ");
        println!("#{} {} {}: {}", user.id, user.name, user.surname, vehicles);
    }
    Ok(())
}
