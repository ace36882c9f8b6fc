use clap::Parser;

use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod cache;
mod fleet;
mod geocode;
mod logging;
mod map;
mod message;
mod opts;
mod periodic;
mod poller;
mod prelude;
mod redis;
mod roster;
mod tracker;

#[tokio::main]
async fn main() -> Result {
    let opts = Opts::parse();
    let _sentry_guard = logging::init(opts.sentry_dsn.clone(), opts.traces_sample_rate)?;

    match opts.subcommand {
        Subcommand::Roster(opts) => roster::run(opts).await,
        Subcommand::Track(opts) => tracker::run(opts).await,
        Subcommand::Resolve(opts) => geocode::run(opts).await,
    }
}
