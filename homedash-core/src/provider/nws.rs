//! National Weather Service (api.weather.gov) forecast feed.
//!
//! A forecast is resolved in two steps: the `/points/{lat},{lon}` lookup
//! names the gridpoint forecast URL, which is then fetched. The hourly
//! forecast is an optional third request used only for the high/low range.

use serde::Deserialize;
use tracing::warn;

use crate::{
    Config,
    error::{FetchError, FetchStep},
    model::WeatherSnapshot,
    normalize::{RawWeather, normalize_weather},
};

use super::FeedClient;

/// Everything needed to fetch and normalize one location's forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Overrides the place name reported by the point lookup.
    pub location_name: Option<String>,
    pub hourly: bool,
    /// How many hourly periods the high/low range covers.
    pub hourly_periods: usize,
}

impl WeatherQuery {
    pub fn from_config(config: &Config) -> Self {
        Self {
            latitude: config.location.latitude,
            longitude: config.location.longitude,
            location_name: config.location.name.clone(),
            hourly: config.weather.hourly,
            hourly_periods: config.weather.hourly_periods,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointResponse {
    pub properties: PointProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointProperties {
    #[serde(default)]
    pub forecast: Option<String>,
    #[serde(default)]
    pub forecast_hourly: Option<String>,
    #[serde(default)]
    pub relative_location: Option<RelativeLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelativeLocation {
    pub properties: RelativeLocationProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelativeLocationProperties {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub properties: ForecastProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastProperties {
    #[serde(default)]
    pub periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub name: String,
    /// Plain number in the legacy format, `{value, unitCode}` otherwise.
    #[serde(default)]
    pub temperature: Option<Reading>,
    #[serde(default)]
    pub temperature_unit: Option<String>,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub detailed_forecast: String,
    #[serde(default)]
    pub wind_speed: Option<Reading>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Text(String),
    Quantity(QuantitativeValue),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeValue {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit_code: String,
}

/// The hourly forecast URL for a gridpoint forecast URL.
pub fn hourly_url(forecast_url: &str) -> String {
    if let Some(base) = forecast_url.strip_suffix("/forecast") {
        format!("{base}/forecast/hourly")
    } else {
        forecast_url.replacen("forecast", "forecast/hourly", 1)
    }
}

impl FeedClient {
    /// Resolve the gridpoint for `query` and fetch its forecast.
    pub async fn fetch_weather(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError> {
        let raw = self.fetch_raw_weather(query).await?;
        normalize_weather(&raw, query)
    }

    pub async fn fetch_raw_weather(&self, query: &WeatherQuery) -> Result<RawWeather, FetchError> {
        let point_url = format!(
            "{}/points/{:.4},{:.4}",
            self.endpoints.weather_base_url, query.latitude, query.longitude
        );

        let point: PointResponse = self.get_json(FetchStep::PointLookup, &point_url).await?;

        let forecast_url = point.properties.forecast.clone().ok_or_else(|| {
            FetchError::data_absent(FetchStep::PointLookup, "properties.forecast is missing")
        })?;

        let forecast: ForecastResponse = self.get_json(FetchStep::Forecast, &forecast_url).await?;

        let hourly = if query.hourly {
            let url = point
                .properties
                .forecast_hourly
                .clone()
                .unwrap_or_else(|| hourly_url(&forecast_url));

            match self
                .get_json::<ForecastResponse>(FetchStep::HourlyForecast, &url)
                .await
            {
                Ok(hourly) => Some(hourly),
                Err(err) => {
                    warn!(error = %err, "hourly forecast unavailable, continuing without high/low");
                    None
                }
            }
        } else {
            None
        };

        Ok(RawWeather {
            point,
            forecast,
            hourly,
        })
    }
}
