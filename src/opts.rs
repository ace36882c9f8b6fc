//! CLI options.

use clap::{Args, Parser};

use crate::fleet::models::{UserId, VehicleId};
use crate::prelude::*;

pub mod parsers;

#[derive(Parser)]
#[command(version, about, rename_all = "kebab-case")]
pub struct Opts {
    /// Sentry DSN
    #[arg(short, long, env = "FLEET_DASHBOARD_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Sentry traces sample rate
    #[arg(long, env = "FLEET_DASHBOARD_TRACES_SAMPLE_RATE", default_value = "0.0")]
    pub traces_sample_rate: f32,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    Roster(RosterOpts),
    Track(TrackOpts),
    Resolve(ResolveOpts),
}

/// Lists the users and their vehicles
#[derive(Args)]
pub struct RosterOpts {
    #[command(flatten)]
    pub connections: ConnectionOpts,

    /// Bypass the cached roster
    #[arg(short, long)]
    pub force: bool,
}

/// Tracks one user's vehicles on the map
#[derive(Args)]
pub struct TrackOpts {
    #[command(flatten)]
    pub connections: ConnectionOpts,

    /// User ID to track
    #[arg(short, long, value_parser = parsers::user_id)]
    pub user_id: UserId,

    /// Vehicle to select once the first locations arrive
    #[arg(long)]
    pub vehicle_id: Option<VehicleId>,

    /// Bypass the cached locations on the first tick
    #[arg(short, long)]
    pub force: bool,

    /// Location reload period
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub poll_period: StdDuration,
}

/// Reverse-geocodes a coordinate pair
#[derive(Args)]
pub struct ResolveOpts {
    /// Latitude, degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude, degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
}

#[derive(Args)]
pub struct ConnectionOpts {
    /// Fleet API base URL
    #[arg(
        short,
        long,
        env = "FLEET_DASHBOARD_API_URL",
        default_value = "http://mobi.connectedcar360.net/api/"
    )]
    pub api_url: String,

    /// Redis URI
    #[arg(
        short,
        long,
        env = "FLEET_DASHBOARD_REDIS_URI",
        default_value = "redis://127.0.0.1/0"
    )]
    pub redis_uri: String,
}
