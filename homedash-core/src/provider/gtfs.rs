//! GTFS-realtime transit feeds (trip updates and service alerts).

use chrono::Utc;
use chrono_tz::Tz;
use gtfs_rt::FeedMessage;
use prost::Message;
use tracing::debug;

use crate::{
    error::{FetchError, FetchStep},
    model::{Arrivals, ServiceAlert},
    normalize::{AlertWindow, normalize_alerts, normalize_arrivals},
};

use super::FeedClient;

const PROTOBUF: &str = "application/x-protobuf";

/// Decode a GTFS-realtime `FeedMessage` body.
pub fn decode_feed(step: FetchStep, body: &[u8]) -> Result<FeedMessage, FetchError> {
    FeedMessage::decode(body)
        .map_err(|e| FetchError::parse(step, format!("failed to decode feed: {e}")))
}

impl FeedClient {
    pub async fn fetch_feed(&self, step: FetchStep, url: &str) -> Result<FeedMessage, FetchError> {
        let body = self.get_bytes(step, url, Some(PROTOBUF)).await?;
        let feed = decode_feed(step, &body)?;
        debug!(%step, entities = feed.entity.len(), "decoded feed");
        Ok(feed)
    }

    /// Upcoming arrivals at each of `stop_ids`, keyed by stop id.
    pub async fn fetch_arrivals<S: AsRef<str> + Sync>(
        &self,
        stop_ids: &[S],
        tz: Tz,
    ) -> Result<Arrivals, FetchError> {
        let feed = self
            .fetch_feed(FetchStep::TransitFeed, &self.endpoints.arrivals_url)
            .await?;
        Ok(normalize_arrivals(&feed, stop_ids, Utc::now(), tz))
    }

    /// Alerts that name `route_filter`, newest first.
    pub async fn fetch_alerts(
        &self,
        route_filter: &str,
        window: Option<&AlertWindow>,
    ) -> Result<Vec<ServiceAlert>, FetchError> {
        let feed = self
            .fetch_feed(FetchStep::AlertFeed, &self.endpoints.alerts_url)
            .await?;
        Ok(normalize_alerts(&feed, route_filter, Utc::now(), window))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        error::FetchErrorKind,
        provider::Endpoints,
        test_support::{alert_entity, feed, stop_time, trip_entity},
    };
    use chrono_tz::America::New_York;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FeedClient {
        let endpoints = Endpoints {
            weather_base_url: server.uri(),
            arrivals_url: format!("{}/nyct/gtfs-l", server.uri()),
            alerts_url: format!("{}/camsys/subway-alerts", server.uri()),
        };
        FeedClient::new(endpoints, Duration::from_secs(5), "homedash-test").unwrap()
    }

    #[test]
    fn decode_feed_reads_encoded_message() {
        let body = feed(vec![trip_entity("trip-7", "L", vec![stop_time("L15S", 1_741_968_000)])])
            .encode_to_vec();

        let decoded = decode_feed(FetchStep::TransitFeed, &body).unwrap();

        let update = decoded.entity[0].trip_update.as_ref().unwrap();
        assert_eq!(update.trip.trip_id.as_deref(), Some("trip-7"));
        assert_eq!(update.stop_time_update[0].stop_id.as_deref(), Some("L15S"));
    }

    #[tokio::test]
    async fn fetch_arrivals_decodes_trip_updates() {
        let server = MockServer::start().await;
        let now = Utc::now().timestamp();
        let body = feed(vec![
            trip_entity(
                "trip-1",
                "L",
                vec![stop_time("L15N", now + 600), stop_time("L15S", now - 120)],
            ),
            alert_entity(Some("not a trip"), None, &["L"], Some(now)),
        ])
        .encode_to_vec();

        Mock::given(method("GET"))
            .and(path("/nyct/gtfs-l"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let arrivals = client_for(&server)
            .fetch_arrivals(&["L15N", "L15S"], New_York)
            .await
            .unwrap();

        assert_eq!(arrivals["L15N"].len(), 1);
        assert!((9..=10).contains(&arrivals["L15N"][0].minutes_until_arrival));
        assert!(arrivals["L15S"].is_empty());
    }

    #[tokio::test]
    async fn fetch_alerts_filters_route() {
        let server = MockServer::start().await;
        let now = Utc::now().timestamp();
        let body = feed(vec![
            alert_entity(Some("L: delays"), None, &["L"], Some(now)),
            alert_entity(Some("G: suspended"), None, &["G"], Some(now)),
        ])
        .encode_to_vec();

        Mock::given(method("GET"))
            .and(path("/camsys/subway-alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let alerts = client_for(&server).fetch_alerts("L", None).await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].header_text, "L: delays");
    }

    #[tokio::test]
    async fn garbage_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nyct/gtfs-l"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xff, 0xff, 0xff]))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_arrivals(&["L15N"], New_York)
            .await
            .unwrap_err();

        assert_eq!(err.step, FetchStep::TransitFeed);
        assert!(matches!(err.kind, FetchErrorKind::Parse(_)));
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/camsys/subway-alerts"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_alerts("L", None).await.unwrap_err();

        assert_eq!(err.step, FetchStep::AlertFeed);
        assert!(err.is_network());
    }
}
