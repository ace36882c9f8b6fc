//! The `track` subcommand: polls one user's vehicle locations and drives
//! the map-sync view until Ctrl-C.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cache::locations::LocationCache;
use crate::cache::roster::RosterCache;
use crate::cache::Freshness;
use crate::fleet::FleetApi;
use crate::geocode::{AddressMemoizer, Nominatim};
use crate::logging::{format_duration, format_elapsed};
use crate::map::{ConsoleMap, MapSync};
use crate::message::Messages;
use crate::opts::TrackOpts;
use crate::periodic::Periodic;
use crate::poller::LocationPoller;
use crate::prelude::*;
use crate::redis;

pub async fn run(opts: TrackOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "tracker"));

    let api = FleetApi::new(&opts.connections.api_url)?;
    let redis = redis::open(&opts.connections.redis_uri).await?;
    let roster = RosterCache::new(api.clone(), Freshness::new(redis.clone()));
    let locations = LocationCache::new(api, Freshness::new(redis));
    let poller = LocationPoller::new(locations, opts.poll_period);
    let messages = Arc::new(Messages::default());
    let memoizer = Arc::new(AddressMemoizer::new(Nominatim::new()?));

    let user = match roster.get_user(opts.user_id, opts.force).await? {
        Some(user) => user,
        None => {
            // The UI shows «Failed to retrieve user» with a retry button.
            warn!(user_id = opts.user_id, "user not found, retrying with a forced refetch");
            roster
                .get_user(opts.user_id, true)
                .await?
                .ok_or_else(|| anyhow!("user #{} not found", opts.user_id))?
        }
    };
    info!(
        user_id = user.id,
        name = user.name.as_str(),
        n_vehicles = user.vehicles.len(),
        "tracking",
    );

    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    let (selection_tx, mut selection_rx) = mpsc::unbounded_channel();
    messages.clear();
    let mut sync = MapSync::new(
        ConsoleMap,
        user.clone(),
        memoizer,
        Arc::clone(&messages),
        refresh_tx,
        selection_tx,
    );

    info!(period = format_duration(opts.poll_period).as_str(), "starting the poller");
    let start_instant = Instant::now();
    let mut handle = poller.poll(user.id, opts.force);
    let mut receiver = handle.subscribe();
    let mut retry_throttle = Periodic::new(opts.poll_period);
    let mut selection_pending = opts.vehicle_id;

    loop {
        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
                let locations = receiver.borrow_and_update().clone();
                if let Some(locations) = locations {
                    sync.on_locations(&locations).await;
                    if let Some(vehicle_id) = selection_pending.take() {
                        sync.set_selected(Some(vehicle_id)).await;
                    }
                    if let Some(location) = sync.selected_location() {
                        info!(
                            lat = location.lat,
                            lon = location.lon,
                            address = location.address.as_deref().unwrap_or(""),
                            "selected vehicle",
                        );
                    }
                }
                if !messages.is_empty() {
                    for notice in messages.take() {
                        warn!(text = notice.text(), "notice");
                        // One forced refetch per poll period at most.
                        if retry_throttle.should_trigger() {
                            notice.retry();
                        }
                    }
                }
            }
            Some(()) = refresh_rx.recv() => {
                info!("forced refresh requested");
                handle.stop();
                handle = poller.poll(user.id, true);
                receiver = handle.subscribe();
            }
            Some(selection) = selection_rx.recv() => {
                match selection {
                    Some(vehicle) => {
                        info!(vehicle_id = vehicle.id, make = vehicle.make.as_str(), "vehicle selected")
                    }
                    None => info!("selection cleared"),
                }
            }
            _ = signal::ctrl_c() => {
                info!(tracked_for = format_elapsed(start_instant).as_str(), "stopping…");
                handle.stop();
                break;
            }
        }
    }
    messages.clear();
    Ok(())
}
