//! Read API for the display layer.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    Config,
    cache::{CacheEntry, RefreshCache, RefreshStats, spawn_refresh_loop},
    model::{Arrivals, ServiceAlert, WeatherSnapshot},
    normalize::rebase_arrivals,
    provider::FeedClient,
    source::{Source, SourceId, sources_from_config},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub weather: Duration,
    pub arrivals: Duration,
    pub alerts: Duration,
}

impl Intervals {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weather: config.refresh.weather_interval(),
            arrivals: config.refresh.arrivals_interval(),
            alerts: config.refresh.alerts_interval(),
        }
    }
}

/// Per-source refresh health, for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    pub id: SourceId,
    pub last_updated_at: Option<DateTime<Utc>>,
    /// The snapshot is older than two refresh periods.
    pub stale: bool,
    /// The refresh task is still alive.
    pub running: bool,
    pub stats: RefreshStats,
}

/// Owns one cache and one refresh task per data source.
///
/// The refresh tasks live as long as the `Dashboard`; dropping it (or
/// calling [`Dashboard::shutdown`]) stops them. Caches start empty.
#[derive(Debug)]
pub struct Dashboard {
    weather: Arc<RefreshCache<WeatherSnapshot>>,
    arrivals: Arc<RefreshCache<Arrivals>>,
    alerts: Arc<RefreshCache<Vec<ServiceAlert>>>,
    intervals: Intervals,
    tasks: Vec<(SourceId, JoinHandle<()>)>,
}

impl Dashboard {
    /// Validate `config` and start refreshing every source it describes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config, client: FeedClient) -> anyhow::Result<Self> {
        config.validate()?;
        let (weather, arrivals, alerts) = sources_from_config(config, client)?;

        info!(
            location = ?config.location.name,
            stops = ?config.transit.stop_ids(),
            route = %config.transit.route_filter,
            "starting dashboard"
        );

        Ok(Self::with_sources(
            weather,
            arrivals,
            alerts,
            Intervals::from_config(config),
        ))
    }

    pub fn with_sources<W, A, L>(weather: W, arrivals: A, alerts: L, intervals: Intervals) -> Self
    where
        W: Source<Output = WeatherSnapshot> + 'static,
        A: Source<Output = Arrivals> + 'static,
        L: Source<Output = Vec<ServiceAlert>> + 'static,
    {
        let weather_cache = Arc::new(RefreshCache::new(SourceId::Weather));
        let arrivals_cache = Arc::new(RefreshCache::new(SourceId::Arrivals));
        let alerts_cache = Arc::new(RefreshCache::new(SourceId::Alerts));

        let tasks = vec![
            (
                SourceId::Weather,
                spawn_refresh_loop(weather_cache.clone(), weather, intervals.weather),
            ),
            (
                SourceId::Arrivals,
                spawn_refresh_loop(arrivals_cache.clone(), arrivals, intervals.arrivals),
            ),
            (
                SourceId::Alerts,
                spawn_refresh_loop(alerts_cache.clone(), alerts, intervals.alerts),
            ),
        ];

        Self {
            weather: weather_cache,
            arrivals: arrivals_cache,
            alerts: alerts_cache,
            intervals,
            tasks,
        }
    }

    /// Latest forecast, or `None` while unavailable.
    pub fn weather(&self) -> Option<Arc<CacheEntry<WeatherSnapshot>>> {
        self.weather.read()
    }

    /// Upcoming arrivals for `stop_ids` as of `now`.
    ///
    /// Every requested stop is present; stops with nothing cached map to an
    /// empty list.
    pub fn arrivals<S: AsRef<str>>(&self, stop_ids: &[S], now: DateTime<Utc>) -> Arrivals {
        match self.arrivals.read() {
            Some(entry) => rebase_arrivals(&entry.value, stop_ids, now),
            None => stop_ids
                .iter()
                .map(|id| (id.as_ref().to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Current alerts, newest first; empty while unavailable.
    pub fn alerts(&self) -> Vec<ServiceAlert> {
        self.alerts
            .read()
            .map(|entry| entry.value.clone())
            .unwrap_or_default()
    }

    /// Refresh health of every source as of `now`, in [`SourceId::all`] order.
    pub fn status(&self, now: DateTime<Utc>) -> Vec<SourceStatus> {
        SourceId::all()
            .iter()
            .map(|&id| {
                let (last_updated_at, stale, stats) = match id {
                    SourceId::Weather => freshness(&self.weather, self.intervals.weather, now),
                    SourceId::Arrivals => freshness(&self.arrivals, self.intervals.arrivals, now),
                    SourceId::Alerts => freshness(&self.alerts, self.intervals.alerts, now),
                };
                SourceStatus {
                    id,
                    last_updated_at,
                    stale,
                    running: self.is_running(id),
                    stats,
                }
            })
            .collect()
    }

    fn is_running(&self, id: SourceId) -> bool {
        self.tasks
            .iter()
            .any(|(task_id, task)| *task_id == id && !task.is_finished())
    }

    /// Stop all refresh tasks. Cached values stay readable.
    pub fn shutdown(&mut self) {
        for (_, task) in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn freshness<T: Send + Sync + 'static>(
    cache: &RefreshCache<T>,
    period: Duration,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, bool, RefreshStats) {
    let entry = cache.read();
    let stale = entry
        .as_ref()
        .is_some_and(|e| e.is_stale(period * 2, now));
    (entry.map(|e| e.last_updated_at), stale, cache.stats())
}
