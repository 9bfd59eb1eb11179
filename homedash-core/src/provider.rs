use std::time::Duration;

use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    Config,
    error::{FetchError, FetchStep},
};

pub mod gtfs;
pub mod nws;

/// Where each feed lives.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base URL of the weather.gov API, without a trailing slash.
    pub weather_base_url: String,
    pub arrivals_url: String,
    pub alerts_url: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weather_base_url: config.weather.base_url.trim_end_matches('/').to_string(),
            arrivals_url: config.transit.arrivals_url.clone(),
            alerts_url: config.transit.alerts_url.clone(),
        }
    }
}

/// HTTP client for the weather and transit feeds.
///
/// Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    endpoints: Endpoints,
}

impl FeedClient {
    pub fn new(endpoints: Endpoints, timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { http, endpoints })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            Endpoints::from_config(config),
            config.refresh.request_timeout(),
            &config.user_agent,
        )
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get_bytes(
        &self,
        step: FetchStep,
        url: &str,
        accept: Option<&str>,
    ) -> Result<Vec<u8>, FetchError> {
        debug!(%step, url, "fetching");

        let mut req = self.http.get(url);
        if let Some(accept) = accept {
            req = req.header(header::ACCEPT, accept);
        }

        let res = req
            .send()
            .await
            .map_err(|e| FetchError::network(step, e))?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| FetchError::network(step, e))?;

        if !status.is_success() {
            return Err(FetchError::status(
                step,
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        debug!(%step, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, step: FetchStep, url: &str) -> Result<T, FetchError> {
        let body = self
            .get_bytes(step, url, Some("application/geo+json"))
            .await?;

        serde_json::from_slice(&body).map_err(|e| FetchError::parse(step, e.to_string()))
    }
}
