use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use homedash_core::{
    Arrivals, Config, Dashboard, FeedClient, StopConfig, WeatherQuery, normalize::limit_alerts,
};
use inquire::{Confirm, CustomType, Text};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};

use crate::render::{self, Frame};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "homedash",
    version,
    about = "Weather, train arrivals and service alerts in one terminal screen"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Keep refreshing in the background and redraw until Ctrl-C.
    Run,

    /// Fetch and print the current forecast once.
    Weather,

    /// Fetch and print upcoming arrivals once.
    Arrivals {
        /// Stop id, e.g. "L15N". Repeatable; defaults to the configured stops.
        #[arg(long = "stop", value_name = "ID")]
        stops: Vec<String>,
    },

    /// Fetch and print service alerts once.
    Alerts {
        /// Route to filter on; defaults to the configured route.
        #[arg(long)]
        route: Option<String>,
    },

    /// Interactively set location and stops, then save the config file.
    Configure,

    /// Print the config file path.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Run) {
            Command::Run => run_dashboard(&load_config(&path)?).await,
            Command::Weather => show_weather(&load_config(&path)?).await,
            Command::Arrivals { stops } => show_arrivals(&load_config(&path)?, stops).await,
            Command::Alerts { route } => show_alerts(&load_config(&path)?, route).await,
            Command::Configure => configure(&path),
            Command::ConfigPath => {
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load_from(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", path.display()))?;
    Ok(config)
}

async fn run_dashboard(config: &Config) -> anyhow::Result<()> {
    let tz = config.tz()?;
    let client = FeedClient::from_config(config)?;
    let mut dashboard = Dashboard::start(config, client)?;
    let stop_ids = config.transit.stop_ids();

    // First frame after one request timeout so the initial refresh can land.
    let mut ticker = interval_at(
        Instant::now() + config.refresh.request_timeout(),
        config.refresh.render_interval(),
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let weather = dashboard.weather();
                let arrivals = dashboard.arrivals(stop_ids.as_slice(), now);
                let alerts = dashboard.alerts();
                let status = dashboard.status(now);

                let screen = render::frame(&Frame {
                    weather: weather.as_deref(),
                    arrivals: &arrivals,
                    alerts: &alerts,
                    status: &status,
                    stops: &config.transit.stops,
                    arrivals_shown: config.transit.arrivals_shown,
                    route: &config.transit.route_filter,
                    tz,
                    now,
                });
                print!("{CLEAR_SCREEN}{screen}");
            }
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                info!("shutting down");
                break;
            }
        }
    }

    dashboard.shutdown();
    Ok(())
}

async fn show_weather(config: &Config) -> anyhow::Result<()> {
    let client = FeedClient::from_config(config)?;

    let snapshot = match client.fetch_weather(&WeatherQuery::from_config(config)).await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(error = %err, "weather fetch failed");
            None
        }
    };

    print!("{}", render::weather_panel(snapshot.as_ref()));
    Ok(())
}

async fn show_arrivals(config: &Config, requested: Vec<String>) -> anyhow::Result<()> {
    let tz = config.tz()?;
    let client = FeedClient::from_config(config)?;
    let stops = resolve_stops(config, requested);
    let stop_ids: Vec<&str> = stops.iter().map(|s| s.id.as_str()).collect();

    let arrivals = match client.fetch_arrivals(stop_ids.as_slice(), tz).await {
        Ok(arrivals) => arrivals,
        Err(err) => {
            warn!(error = %err, "arrivals fetch failed");
            Arrivals::new()
        }
    };

    print!(
        "{}",
        render::arrivals_panel(&arrivals, &stops, config.transit.arrivals_shown)
    );
    Ok(())
}

async fn show_alerts(config: &Config, route: Option<String>) -> anyhow::Result<()> {
    let tz = config.tz()?;
    let client = FeedClient::from_config(config)?;
    let route = route.unwrap_or_else(|| config.transit.route_filter.clone());
    let window = config.alert_window()?;

    let alerts = match client.fetch_alerts(&route, window.as_ref()).await {
        Ok(alerts) => limit_alerts(alerts, config.transit.max_alerts),
        Err(err) => {
            warn!(error = %err, "alerts fetch failed");
            Vec::new()
        }
    };

    print!("{}", render::alerts_panel(&alerts, &route, tz));
    Ok(())
}

/// Requested stop ids, labelled from config where known; all configured
/// stops when none were requested.
fn resolve_stops(config: &Config, requested: Vec<String>) -> Vec<StopConfig> {
    if requested.is_empty() {
        return config.transit.stops.clone();
    }

    requested
        .into_iter()
        .map(|id| {
            config
                .transit
                .stops
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .unwrap_or_else(|| StopConfig::new(id, None))
        })
        .collect()
}

fn configure(path: &Path) -> anyhow::Result<()> {
    let mut config = Config::load_from(path)?;

    let current_name = config.location.name.clone().unwrap_or_default();
    let name = Text::new("Location name:")
        .with_default(&current_name)
        .with_help_message("Leave empty to use the city from the forecast lookup")
        .prompt()?;
    let latitude = CustomType::<f64>::new("Latitude:")
        .with_default(config.location.latitude)
        .with_error_message("Please enter a number")
        .prompt()?;
    let longitude = CustomType::<f64>::new("Longitude:")
        .with_default(config.location.longitude)
        .with_error_message("Please enter a number")
        .prompt()?;

    let name = name.trim();
    config.set_location(
        (!name.is_empty()).then(|| name.to_string()),
        latitude,
        longitude,
    );

    let route = Text::new("Route to show alerts for:")
        .with_default(&config.transit.route_filter)
        .prompt()?;
    config.transit.route_filter = route.trim().to_string();

    while Confirm::new("Add or relabel a stop?")
        .with_default(false)
        .prompt()?
    {
        let id = Text::new("Stop id (e.g. L15N):").prompt()?;
        let label = Text::new("Label (e.g. To 8 Av):").prompt()?;
        let (id, label) = (id.trim(), label.trim());
        if id.is_empty() {
            continue;
        }
        config.upsert_stop(id, (!label.is_empty()).then_some(label));
    }

    config.validate()?;
    config.save_to(path)?;
    println!("Saved configuration to {}", path.display());

    Ok(())
}
