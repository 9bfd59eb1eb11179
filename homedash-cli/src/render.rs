//! Plain-text rendering of dashboard data.
//!
//! Every function here is pure: it takes already-read values and returns the
//! text to print. Absence of data is rendered as a normal state.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use homedash_core::{
    Arrivals, CacheEntry, ServiceAlert, SourceStatus, StopConfig, WeatherSnapshot,
};

pub const WEATHER_UNAVAILABLE: &str = "Failed to load weather data.";
const NO_DATA: &str = "No data";

/// Current conditions, or [`WEATHER_UNAVAILABLE`].
pub fn weather_panel(snapshot: Option<&WeatherSnapshot>) -> String {
    let Some(w) = snapshot else {
        return format!("{WEATHER_UNAVAILABLE}\n");
    };

    let mut lines = vec![
        format!("{} ({})", w.location_name, w.period_name),
        format!(
            "  {:.0}°F / {:.1}°C  {}",
            w.temperature_f,
            w.temperature_c(),
            w.short_forecast
        ),
    ];
    if !w.wind_speed.is_empty() {
        lines.push(format!("  Wind: {}", w.wind_speed));
    }
    if let (Some(high), Some(low)) = (w.high_temp_f, w.low_temp_f) {
        lines.push(format!("  High {high:.0}°F / Low {low:.0}°F"));
    }
    if !w.detailed_forecast.is_empty() {
        lines.push(format!("  {}", w.detailed_forecast));
    }
    block(lines)
}

/// One column per stop, in configured order, showing the first `shown` trains.
pub fn arrivals_panel(arrivals: &Arrivals, stops: &[StopConfig], shown: usize) -> String {
    let mut lines = Vec::new();
    for stop in stops {
        lines.push(stop.display_label().to_string());

        let upcoming = arrivals.get(&stop.id).map(Vec::as_slice).unwrap_or_default();
        if upcoming.is_empty() {
            lines.push(format!("  {NO_DATA}"));
            continue;
        }
        lines.extend(upcoming.iter().take(shown).map(|arrival| {
            format!(
                "  Departs in {} min ({})",
                arrival.minutes_until_arrival,
                arrival.arrival_time_local.format("%H:%M")
            )
        }));
    }
    block(lines)
}

/// Alerts newest first, each with its activation time in `tz`.
pub fn alerts_panel(alerts: &[ServiceAlert], route: &str, tz: Tz) -> String {
    if alerts.is_empty() {
        return format!("No current alerts for {route} train.\n");
    }

    let mut lines = Vec::new();
    for alert in alerts {
        let title = if alert.header_text.is_empty() {
            &alert.description_text
        } else {
            &alert.header_text
        };
        lines.push(match alert.active_timestamp {
            Some(ts) => format!("[{}] {title}", local_stamp(ts, tz)),
            None => title.clone(),
        });
        if !alert.header_text.is_empty() && !alert.description_text.is_empty() {
            lines.push(format!("  {}", alert.description_text));
        }
    }
    block(lines)
}

/// Last successful update per source, e.g. `weather 14:05:00 (stale) | arrivals never`.
pub fn status_line(status: &[SourceStatus], tz: Tz) -> String {
    let parts: Vec<String> = status
        .iter()
        .map(|s| {
            let mut part = match s.last_updated_at {
                Some(at) => format!("{} {}", s.id, at.with_timezone(&tz).format("%H:%M:%S")),
                None => format!("{} never", s.id),
            };
            if s.stale {
                part.push_str(" (stale)");
            }
            if !s.running {
                part.push_str(" (stopped)");
            }
            part
        })
        .collect();
    format!("Updated: {}\n", parts.join(" | "))
}

pub struct Frame<'a> {
    pub weather: Option<&'a CacheEntry<WeatherSnapshot>>,
    pub arrivals: &'a Arrivals,
    pub alerts: &'a [ServiceAlert],
    pub status: &'a [SourceStatus],
    pub stops: &'a [StopConfig],
    pub arrivals_shown: usize,
    pub route: &'a str,
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

/// The full screen shown by `homedash run`.
pub fn frame(f: &Frame<'_>) -> String {
    [
        format!("{}\n", local_stamp(f.now, f.tz)),
        weather_panel(f.weather.map(|e| &e.value)),
        arrivals_panel(f.arrivals, f.stops, f.arrivals_shown),
        format!(
            "{} train alerts\n{}",
            f.route,
            alerts_panel(f.alerts, f.route, f.tz)
        ),
        status_line(f.status, f.tz),
    ]
    .join("\n")
}

fn block(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn local_stamp(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use homedash_core::{RefreshStats, SourceId, TrainArrival};

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: "Bushwick".to_string(),
            period_name: "This Afternoon".to_string(),
            temperature_f: 68.0,
            short_forecast: "Sunny".to_string(),
            detailed_forecast: "Sunny, with a high near 72.".to_string(),
            wind_speed: "5 to 10 mph".to_string(),
            icon: None,
            high_temp_f: Some(72.0),
            low_temp_f: Some(58.0),
        }
    }

    fn arrival(stop: &str, minutes: i64) -> TrainArrival {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 16, 0, 0).unwrap()
            + chrono::Duration::minutes(minutes);
        TrainArrival {
            stop_id: stop.to_string(),
            minutes_until_arrival: minutes,
            trip_id: format!("trip-{minutes}"),
            route_id: "L".to_string(),
            arrival_time: at,
            arrival_time_local: at.with_timezone(&New_York).fixed_offset(),
        }
    }

    fn stops() -> Vec<StopConfig> {
        vec![
            StopConfig::new("L15N", Some("To 8 Av")),
            StopConfig::new("L15S", Some("To Canarsie")),
        ]
    }

    #[test]
    fn weather_panel_shows_both_units() {
        let text = weather_panel(Some(&snapshot()));

        assert!(text.starts_with("Bushwick (This Afternoon)"));
        assert!(text.contains("68°F / 20.0°C  Sunny"));
        assert!(text.contains("Wind: 5 to 10 mph"));
        assert!(text.contains("High 72°F / Low 58°F"));
    }

    #[test]
    fn missing_weather_is_a_message() {
        assert_eq!(weather_panel(None), "Failed to load weather data.\n");
    }

    #[test]
    fn arrivals_limited_per_stop() {
        let mut arrivals = Arrivals::new();
        arrivals.insert(
            "L15N".to_string(),
            vec![arrival("L15N", 1), arrival("L15N", 5), arrival("L15N", 9), arrival("L15N", 14)],
        );
        arrivals.insert("L15S".to_string(), Vec::new());

        let text = arrivals_panel(&arrivals, &stops(), 3);

        assert!(text.contains("To 8 Av\n  Departs in 1 min (12:01)\n"));
        assert!(text.contains("Departs in 9 min"));
        assert!(!text.contains("Departs in 14 min"));
        assert!(text.contains("To Canarsie\n  No data\n"));
    }

    #[test]
    fn stop_without_label_uses_id() {
        let text = arrivals_panel(&Arrivals::new(), &[StopConfig::new("G22N", None)], 3);
        assert_eq!(text, "G22N\n  No data\n");
    }

    #[test]
    fn alerts_show_local_time() {
        let alert = ServiceAlert {
            header_text: "Delays on the L".to_string(),
            description_text: "Signal problems at Bedford Av.".to_string(),
            active_timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 14, 16, 30, 0).unwrap()),
            route_ids: vec!["L".to_string()],
        };

        let text = alerts_panel(&[alert], "L", New_York);

        assert_eq!(
            text,
            "[2025-03-14 12:30] Delays on the L\n  Signal problems at Bedford Av.\n"
        );
    }

    #[test]
    fn description_only_alert_uses_description_as_title() {
        let alert = ServiceAlert {
            header_text: String::new(),
            description_text: "Elevator outage".to_string(),
            active_timestamp: None,
            route_ids: vec!["L".to_string()],
        };

        assert_eq!(alerts_panel(&[alert], "L", New_York), "Elevator outage\n");
    }

    #[test]
    fn no_alerts_message_names_route() {
        assert_eq!(
            alerts_panel(&[], "L", New_York),
            "No current alerts for L train.\n"
        );
    }

    fn status(id: SourceId, last_updated_at: Option<DateTime<Utc>>) -> SourceStatus {
        SourceStatus {
            id,
            last_updated_at,
            stale: false,
            running: true,
            stats: RefreshStats::default(),
        }
    }

    #[test]
    fn status_line_marks_missing_sources() {
        let updated = Utc.with_ymd_and_hms(2025, 3, 14, 16, 5, 0).unwrap();
        let lines = [
            status(SourceId::Weather, Some(updated)),
            status(SourceId::Arrivals, None),
        ];

        assert_eq!(
            status_line(&lines, New_York),
            "Updated: weather 12:05:00 | arrivals never\n"
        );
    }

    #[test]
    fn status_line_flags_stale_and_stopped_sources() {
        let updated = Utc.with_ymd_and_hms(2025, 3, 14, 16, 5, 0).unwrap();
        let lines = [
            SourceStatus {
                stale: true,
                ..status(SourceId::Weather, Some(updated))
            },
            SourceStatus {
                running: false,
                ..status(SourceId::Alerts, None)
            },
        ];

        assert_eq!(
            status_line(&lines, New_York),
            "Updated: weather 12:05:00 (stale) | alerts never (stopped)\n"
        );
    }

    #[test]
    fn frame_degrades_when_everything_is_missing() {
        let arrivals = Arrivals::new();
        let text = frame(&Frame {
            weather: None,
            arrivals: &arrivals,
            alerts: &[],
            status: &[],
            stops: &stops(),
            arrivals_shown: 3,
            route: "L",
            tz: New_York,
            now: Utc.with_ymd_and_hms(2025, 3, 14, 16, 0, 0).unwrap(),
        });

        assert!(text.starts_with("2025-03-14 12:00\n"));
        assert!(text.contains(WEATHER_UNAVAILABLE));
        assert!(text.contains("To 8 Av\n  No data"));
        assert!(text.contains("No current alerts for L train."));
    }
}
