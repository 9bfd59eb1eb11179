//! Fetch error taxonomy shared by every feed.

use reqwest::StatusCode;
use thiserror::Error;

/// The request (or decoding stage) that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    PointLookup,
    Forecast,
    HourlyForecast,
    TransitFeed,
    AlertFeed,
}

impl FetchStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStep::PointLookup => "point lookup",
            FetchStep::Forecast => "forecast",
            FetchStep::HourlyForecast => "hourly forecast",
            FetchStep::TransitFeed => "transit feed",
            FetchStep::AlertFeed => "alert feed",
        }
    }
}

impl std::fmt::Display for FetchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Connection failure, timeout, or an unreadable body.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Malformed JSON or protobuf payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// Well-formed response missing a field we need.
    #[error("missing data: {0}")]
    DataAbsent(String),
}

/// A failed fetch. Always recoverable: callers keep whatever they had before.
#[derive(Debug, Error)]
#[error("{step} failed: {kind}")]
pub struct FetchError {
    pub step: FetchStep,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(step: FetchStep, kind: FetchErrorKind) -> Self {
        Self { step, kind }
    }

    pub fn network(step: FetchStep, err: reqwest::Error) -> Self {
        Self::new(step, FetchErrorKind::Network(err))
    }

    pub fn status(step: FetchStep, status: StatusCode, body: &str) -> Self {
        Self::new(
            step,
            FetchErrorKind::Status {
                status,
                body: truncate_body(body),
            },
        )
    }

    pub fn parse(step: FetchStep, msg: impl Into<String>) -> Self {
        Self::new(step, FetchErrorKind::Parse(msg.into()))
    }

    pub fn data_absent(step: FetchStep, msg: impl Into<String>) -> Self {
        Self::new(step, FetchErrorKind::DataAbsent(msg.into()))
    }

    /// True for transport failures and non-2xx responses.
    pub fn is_network(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::Network(_) | FetchErrorKind::Status { .. }
        )
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
