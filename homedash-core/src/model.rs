use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::celsius;

/// Latest forecast for the configured location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    /// Forecast period label, e.g. "Tonight".
    pub period_name: String,
    pub temperature_f: f64,
    pub short_forecast: String,
    pub detailed_forecast: String,
    pub wind_speed: String,
    pub icon: Option<String>,
    /// Only set when the hourly forecast was fetched successfully.
    pub high_temp_f: Option<f64>,
    pub low_temp_f: Option<f64>,
}

impl WeatherSnapshot {
    /// Always derived from `temperature_f`.
    pub fn temperature_c(&self) -> f64 {
        celsius(self.temperature_f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainArrival {
    pub stop_id: String,
    pub minutes_until_arrival: i64,
    pub trip_id: String,
    pub route_id: String,
    pub arrival_time: DateTime<Utc>,
    /// `arrival_time` in the dashboard's reference timezone.
    pub arrival_time_local: DateTime<FixedOffset>,
}

/// Arrivals keyed by stop id.
pub type Arrivals = BTreeMap<String, Vec<TrainArrival>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAlert {
    pub header_text: String,
    pub description_text: String,
    /// Start of the first active period, if the feed reported one.
    pub active_timestamp: Option<DateTime<Utc>>,
    pub route_ids: Vec<String>,
}
