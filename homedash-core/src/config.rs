use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::normalize::AlertWindow;

/// Where the forecast is fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Display name; when absent the point lookup's city is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: Some("Bushwick".to_string()),
            latitude: 40.7128,
            longitude: -74.0060,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// Fetch the hourly forecast for the high/low range.
    pub hourly: bool,
    pub hourly_periods: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.gov".to_string(),
            hourly: true,
            hourly_periods: 24,
        }
    }
}

/// A platform to show arrivals for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopConfig {
    pub id: String,
    /// Column heading, e.g. "To 8 Av".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl StopConfig {
    pub fn new(id: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            id: id.into(),
            label: label.map(str::to_string),
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub arrivals_url: String,
    pub alerts_url: String,
    pub route_filter: String,
    /// Keep only alerts active between today and this many days ahead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_window_days: Option<u32>,
    /// Keep only the newest N alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alerts: Option<usize>,
    /// Arrivals rendered per stop.
    pub arrivals_shown: usize,
    pub stops: Vec<StopConfig>,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            arrivals_url: "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-l"
                .to_string(),
            alerts_url:
                "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/camsys%2Fsubway-alerts"
                    .to_string(),
            route_filter: "L".to_string(),
            alert_window_days: None,
            max_alerts: Some(2),
            arrivals_shown: 3,
            stops: vec![
                StopConfig::new("L15N", Some("To 8 Av")),
                StopConfig::new("L15S", Some("To Canarsie")),
            ],
        }
    }
}

impl TransitConfig {
    pub fn stop_ids(&self) -> Vec<String> {
        self.stops.iter().map(|s| s.id.clone()).collect()
    }
}

/// Refresh periods and request timeout, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub weather_secs: u64,
    pub arrivals_secs: u64,
    pub alerts_secs: u64,
    pub render_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            weather_secs: 600,
            arrivals_secs: 30,
            alerts_secs: 60,
            render_secs: 30,
            request_timeout_secs: 5,
        }
    }
}

impl RefreshConfig {
    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.weather_secs)
    }

    pub fn arrivals_interval(&self) -> Duration {
        Duration::from_secs(self.arrivals_secs)
    }

    pub fn alerts_interval(&self) -> Duration {
        Duration::from_secs(self.alerts_secs)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// timezone = "America/New_York"
///
/// [location]
/// latitude = 40.7128
/// longitude = -74.006
///
/// [transit]
/// route_filter = "L"
/// stops = [{ id = "L15N", label = "To 8 Av" }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA name of the timezone used for local times and the alert window.
    pub timezone: String,
    pub user_agent: String,
    pub location: LocationConfig,
    pub weather: WeatherConfig,
    pub transit: TransitConfig,
    pub refresh: RefreshConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            user_agent: concat!("homedash/", env!("CARGO_PKG_VERSION"), " (personal dashboard)")
                .to_string(),
            location: LocationConfig::default(),
            weather: WeatherConfig::default(),
            transit: TransitConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the default path, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "homedash", "homedash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Reject values the refresh tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        let loc = &self.location;
        if !(-90.0..=90.0).contains(&loc.latitude) {
            bail!("latitude {} is out of range (-90..=90)", loc.latitude);
        }
        if !(-180.0..=180.0).contains(&loc.longitude) {
            bail!("longitude {} is out of range (-180..=180)", loc.longitude);
        }

        let refresh = &self.refresh;
        for (name, secs) in [
            ("refresh.weather_secs", refresh.weather_secs),
            ("refresh.arrivals_secs", refresh.arrivals_secs),
            ("refresh.alerts_secs", refresh.alerts_secs),
            ("refresh.render_secs", refresh.render_secs),
            ("refresh.request_timeout_secs", refresh.request_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be greater than zero");
            }
        }

        if self.weather.hourly_periods == 0 {
            bail!("weather.hourly_periods must be greater than zero");
        }
        if self.transit.stops.is_empty() {
            bail!(
                "No stops configured.\n\
                 Hint: run `homedash configure` or add [[transit.stops]] entries."
            );
        }
        if let Some(stop) = self.transit.stops.iter().find(|s| s.id.trim().is_empty()) {
            bail!("transit stop with label {:?} has an empty id", stop.label);
        }
        if self.transit.route_filter.trim().is_empty() {
            bail!("transit.route_filter must not be empty");
        }

        Ok(())
    }

    /// The reference timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Unknown timezone '{}': {e}", self.timezone))
    }

    pub fn alert_window(&self) -> Result<Option<AlertWindow>> {
        let tz = self.tz()?;
        Ok(self
            .transit
            .alert_window_days
            .map(|days| AlertWindow { days, tz }))
    }

    pub fn set_location(&mut self, name: Option<String>, latitude: f64, longitude: f64) {
        self.location = LocationConfig {
            name,
            latitude,
            longitude,
        };
    }

    /// Add a stop, or replace the label of an existing one.
    pub fn upsert_stop(&mut self, id: &str, label: Option<&str>) {
        match self.transit.stops.iter_mut().find(|s| s.id == id) {
            Some(stop) => stop.label = label.map(str::to_string),
            None => self.transit.stops.push(StopConfig::new(id, label)),
        }
    }
}
