use std::sync::Arc;

use clap::{crate_name, crate_version};
use reqwest::Url;
use tracing::instrument;

use self::models::{normalize_users, Response, User, UserEntry, UserId, VehicleLocation};
use crate::prelude::*;

pub mod models;

#[derive(Clone)]
pub struct FleetApi {
    base_url: Arc<Url>,
    client: reqwest::Client,
}

impl FleetApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(crate_name!(), "/", crate_version!()))
            .timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: Arc::new(Url::parse(base_url).context("failed to parse the API base URL")?),
            client,
        })
    }

    /// Fetches the user roster, discarding the zero-id filler records.
    #[instrument(skip_all)]
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let url = self.url(&[("op", "list")])?;
        let response: Response<Vec<UserEntry>> = self.call(url).await?;
        Ok(normalize_users(response.data))
    }

    /// Fetches the current locations of the user's vehicles.
    #[instrument(skip_all, fields(user_id = user_id))]
    pub async fn user_locations(&self, user_id: UserId) -> Result<Vec<VehicleLocation>> {
        let url = self.url(&[("op", "getlocations"), ("userid", &user_id.to_string())])?;
        let response: Response<Vec<VehicleLocation>> = self.call(url).await?;
        Ok(response.data)
    }

    fn url(&self, params: &[(&str, &str)]) -> Result<Url> {
        Ok(Url::parse_with_params(self.base_url.as_str(), params)?)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.client
            .get(url)
            .send()
            .await
            .context("request has failed")?
            .error_for_status()?
            .json()
            .await
            .context("could not parse JSON")
    }
}
