//! Core library for the `homedash` status dashboard.
//!
//! This crate defines:
//! - Configuration loading and validation
//! - A feed client for the NWS forecast API and GTFS-realtime transit feeds
//! - Normalization of raw payloads into display-ready records
//! - Background-refreshed caches that keep the last good snapshot
//!
//! It is used by `homedash-cli`, but the [`Dashboard`] read API can back any
//! other front end.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod source;

#[cfg(test)]
mod test_support;

pub use cache::{CacheEntry, RefreshCache, RefreshOutcome, RefreshStats};
pub use config::{Config, StopConfig};
pub use dashboard::{Dashboard, Intervals, SourceStatus};
pub use error::{FetchError, FetchErrorKind, FetchStep};
pub use model::{Arrivals, ServiceAlert, TrainArrival, WeatherSnapshot};
pub use provider::{Endpoints, FeedClient, nws::WeatherQuery};
pub use source::{Source, SourceId};
