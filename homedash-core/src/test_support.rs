//! Feed builders and fake sources shared by the test modules.

use std::{
    collections::VecDeque,
    marker::PhantomData,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    error::{FetchError, FetchStep},
    source::{Source, SourceId},
};

use gtfs_rt::{
    Alert, EntitySelector, FeedEntity, FeedHeader, FeedMessage, TimeRange, TranslatedString,
    TripDescriptor, TripUpdate, translated_string::Translation,
    trip_update::{StopTimeEvent, StopTimeUpdate},
};

pub(crate) fn feed(entity: Vec<FeedEntity>) -> FeedMessage {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            ..Default::default()
        },
        entity,
        ..Default::default()
    }
}

pub(crate) fn stop_time(stop_id: &str, arrival: i64) -> StopTimeUpdate {
    StopTimeUpdate {
        stop_id: Some(stop_id.to_string()),
        arrival: Some(StopTimeEvent {
            time: Some(arrival),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn trip_entity(trip_id: &str, route_id: &str, updates: Vec<StopTimeUpdate>) -> FeedEntity {
    FeedEntity {
        id: trip_id.to_string(),
        trip_update: Some(TripUpdate {
            trip: TripDescriptor {
                trip_id: Some(trip_id.to_string()),
                route_id: Some(route_id.to_string()),
                ..Default::default()
            },
            stop_time_update: updates,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn translated(text: Option<&str>) -> Option<TranslatedString> {
    text.map(|t| TranslatedString {
        translation: vec![Translation {
            text: t.to_string(),
            ..Default::default()
        }],
        ..Default::default()
    })
}

pub(crate) fn alert_entity(
    header: Option<&str>,
    description: Option<&str>,
    routes: &[&str],
    start: Option<i64>,
) -> FeedEntity {
    FeedEntity {
        id: header.or(description).unwrap_or("alert").to_string(),
        alert: Some(Alert {
            header_text: translated(header),
            description_text: translated(description),
            informed_entity: routes
                .iter()
                .map(|r| EntitySelector {
                    route_id: Some(r.to_string()),
                    ..Default::default()
                })
                .collect(),
            active_period: start
                .map(|s| TimeRange {
                    start: Some(s as u64),
                    ..Default::default()
                })
                .into_iter()
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Replays a fixed list of results, one per `load`.
#[derive(Debug)]
pub(crate) struct ScriptedSource<T> {
    script: Mutex<VecDeque<Result<T, FetchError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl<T> ScriptedSource<T> {
    pub(crate) fn new(script: Vec<Result<T, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleep for `delay` inside every `load`.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T> Source for ScriptedSource<T>
where
    T: Send + Sync + std::fmt::Debug + 'static,
{
    type Output = T;

    fn id(&self) -> SourceId {
        SourceId::Weather
    }

    async fn load(&self) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Err(FetchError::data_absent(FetchStep::Forecast, "script exhausted")))
    }
}

/// Always fails with a 503.
#[derive(Debug)]
pub(crate) struct FailingSource<T> {
    id: SourceId,
    _output: PhantomData<fn() -> T>,
}

impl<T> FailingSource<T> {
    pub(crate) fn new(id: SourceId) -> Self {
        Self {
            id,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Source for FailingSource<T>
where
    T: Send + Sync + std::fmt::Debug + 'static,
{
    type Output = T;

    fn id(&self) -> SourceId {
        self.id
    }

    async fn load(&self) -> Result<T, FetchError> {
        Err(FetchError::status(
            FetchStep::TransitFeed,
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
        ))
    }
}

/// Returns the number of times it has been called.
#[derive(Debug, Default)]
pub(crate) struct CountingSource {
    pub(crate) calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Source for CountingSource {
    type Output = u32;

    fn id(&self) -> SourceId {
        SourceId::Weather
    }

    async fn load(&self) -> Result<u32, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(n as u32)
    }
}
