//! Reverse geocoding with per-coordinate memoization.

use std::sync::Arc;

use async_trait::async_trait;
use clap::{crate_name, crate_version};
use moka::future::Cache;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::opts::ResolveOpts;
use crate::prelude::*;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<String>;
}

pub struct Nominatim {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: String,
}

impl Nominatim {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(crate_name!(), "/", crate_version!()))
            .timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReverseGeocoder for Nominatim {
    #[instrument(skip_all, fields(lat = lat, lon = lon))]
    async fn reverse(&self, lat: f64, lon: f64) -> Result<String> {
        let url = Url::parse_with_params(
            NOMINATIM_URL,
            &[
                ("lat", lat.to_string().as_str()),
                ("lon", lon.to_string().as_str()),
                ("format", "json"),
                ("addressdetails", "0"),
                ("accept-language", "en-US,en"),
            ],
        )?;
        let response: ReverseResponse = self
            .client
            .get(url)
            .send()
            .await
            .context("reverse geocoding request has failed")?
            .error_for_status()?
            .json()
            .await
            .context("could not parse the reverse geocoding response")?;
        Ok(response.display_name)
    }
}

/// Exact coordinate pair, keyed by bit pattern so the same floats always
/// map to the same entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CoordinateKey {
    lat_bits: u64,
    lon_bits: u64,
}

impl CoordinateKey {
    fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_bits: lat.to_bits(),
            lon_bits: lon.to_bits(),
        }
    }
}

/// Bounded address cache: one geocoding request per distinct coordinate
/// pair, with concurrent callers for the same pair coalesced onto one
/// in-flight request.
pub struct AddressMemoizer<G> {
    geocoder: Arc<G>,
    cache: Cache<CoordinateKey, String>,
}

impl<G: ReverseGeocoder + 'static> AddressMemoizer<G> {
    const MAX_CAPACITY: u64 = 10_000;

    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder: Arc::new(geocoder),
            cache: Cache::builder().max_capacity(Self::MAX_CAPACITY).build(),
        }
    }

    /// Resolves the coordinates to a human-readable address. A failed
    /// lookup is memoized as the empty string and not retried.
    pub async fn resolve(&self, lat: f64, lon: f64) -> String {
        let geocoder = Arc::clone(&self.geocoder);
        self.cache
            .get_with(CoordinateKey::new(lat, lon), async move {
                match geocoder.reverse(lat, lon).await {
                    Ok(address) => {
                        debug!(lat, lon, address = address.as_str(), "resolved");
                        address
                    }
                    Err(error) => {
                        error!(lat, lon, "reverse geocoding failed: {:#}", error);
                        String::new()
                    }
                }
            })
            .await
    }
}

pub async fn run(opts: ResolveOpts) -> Result {
    let memoizer = AddressMemoizer::new(Nominatim::new()?);
    let address = memoizer.resolve(opts.lat, opts.lon).await;
    match address.as_str() {
        "" => println!("no address found"),
        address => println!("{}", address),
    }
    Ok(())
}
