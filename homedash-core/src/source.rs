use async_trait::async_trait;
use chrono_tz::Tz;
use std::fmt::Debug;

use crate::{
    Config,
    error::FetchError,
    model::{Arrivals, ServiceAlert, WeatherSnapshot},
    normalize::{AlertWindow, limit_alerts},
    provider::{FeedClient, nws::WeatherQuery},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Weather,
    Arrivals,
    Alerts,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Weather => "weather",
            SourceId::Arrivals => "arrivals",
            SourceId::Alerts => "alerts",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[SourceId::Weather, SourceId::Arrivals, SourceId::Alerts]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetch-and-normalize pipeline feeding a cache.
#[async_trait]
pub trait Source: Send + Sync + Debug {
    type Output: Send + Sync + 'static;

    fn id(&self) -> SourceId;

    async fn load(&self) -> Result<Self::Output, FetchError>;
}

#[derive(Debug, Clone)]
pub struct WeatherSource {
    client: FeedClient,
    query: WeatherQuery,
}

impl WeatherSource {
    pub fn new(client: FeedClient, query: WeatherQuery) -> Self {
        Self { client, query }
    }
}

#[async_trait]
impl Source for WeatherSource {
    type Output = WeatherSnapshot;

    fn id(&self) -> SourceId {
        SourceId::Weather
    }

    async fn load(&self) -> Result<WeatherSnapshot, FetchError> {
        self.client.fetch_weather(&self.query).await
    }
}

#[derive(Debug, Clone)]
pub struct ArrivalsSource {
    client: FeedClient,
    stop_ids: Vec<String>,
    tz: Tz,
}

impl ArrivalsSource {
    pub fn new(client: FeedClient, stop_ids: Vec<String>, tz: Tz) -> Self {
        Self {
            client,
            stop_ids,
            tz,
        }
    }
}

#[async_trait]
impl Source for ArrivalsSource {
    type Output = Arrivals;

    fn id(&self) -> SourceId {
        SourceId::Arrivals
    }

    async fn load(&self) -> Result<Arrivals, FetchError> {
        self.client.fetch_arrivals(self.stop_ids.as_slice(), self.tz).await
    }
}

#[derive(Debug, Clone)]
pub struct AlertsSource {
    client: FeedClient,
    route_filter: String,
    window: Option<AlertWindow>,
    max_alerts: Option<usize>,
}

impl AlertsSource {
    pub fn new(
        client: FeedClient,
        route_filter: String,
        window: Option<AlertWindow>,
        max_alerts: Option<usize>,
    ) -> Self {
        Self {
            client,
            route_filter,
            window,
            max_alerts,
        }
    }
}

#[async_trait]
impl Source for AlertsSource {
    type Output = Vec<ServiceAlert>;

    fn id(&self) -> SourceId {
        SourceId::Alerts
    }

    async fn load(&self) -> Result<Vec<ServiceAlert>, FetchError> {
        let alerts = self
            .client
            .fetch_alerts(&self.route_filter, self.window.as_ref())
            .await?;
        Ok(limit_alerts(alerts, self.max_alerts))
    }
}

/// The three production sources described by `config`.
pub fn sources_from_config(
    config: &Config,
    client: FeedClient,
) -> anyhow::Result<(WeatherSource, ArrivalsSource, AlertsSource)> {
    let tz = config.tz()?;

    Ok((
        WeatherSource::new(client.clone(), WeatherQuery::from_config(config)),
        ArrivalsSource::new(client.clone(), config.transit.stop_ids(), tz),
        AlertsSource::new(
            client,
            config.transit.route_filter.clone(),
            config.alert_window()?,
            config.transit.max_alerts,
        ),
    ))
}
