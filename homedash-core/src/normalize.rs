//! Pure conversions from raw feed documents into display records.
//!
//! Nothing in here performs I/O or keeps state; every function takes the
//! reference time explicitly so results are reproducible.

use chrono::{DateTime, Days, Utc};
use chrono_tz::Tz;
use gtfs_rt::{FeedMessage, TranslatedString};

use crate::{
    error::{FetchError, FetchStep},
    model::{Arrivals, ServiceAlert, TrainArrival, WeatherSnapshot},
    provider::nws::{ForecastPeriod, ForecastResponse, PointResponse, Reading, WeatherQuery},
};

/// Raw documents gathered by one weather fetch.
#[derive(Debug, Clone)]
pub struct RawWeather {
    pub point: PointResponse,
    pub forecast: ForecastResponse,
    pub hourly: Option<ForecastResponse>,
}

pub fn celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

fn fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Whole minutes until `arrival`, rounded toward negative infinity.
pub fn minutes_until(arrival: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (arrival - now).num_milliseconds().div_euclid(60_000)
}

pub fn normalize_weather(raw: &RawWeather, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError> {
    let period = raw
        .forecast
        .properties
        .periods
        .first()
        .ok_or_else(|| FetchError::data_absent(FetchStep::Forecast, "forecast has no periods"))?;

    let temperature_f = period_temperature_f(period).ok_or_else(|| {
        FetchError::data_absent(FetchStep::Forecast, "first period has no temperature")
    })?;

    let (high_temp_f, low_temp_f) = raw
        .hourly
        .as_ref()
        .and_then(|hourly| hourly_range(hourly, query.hourly_periods))
        .map_or((None, None), |(high, low)| (Some(high), Some(low)));

    Ok(WeatherSnapshot {
        location_name: location_name(&raw.point, query),
        period_name: period.name.clone(),
        temperature_f,
        short_forecast: period.short_forecast.clone(),
        detailed_forecast: period.detailed_forecast.clone(),
        wind_speed: period.wind_speed.as_ref().map(wind_text).unwrap_or_default(),
        icon: period.icon.clone(),
        high_temp_f,
        low_temp_f,
    })
}

fn location_name(point: &PointResponse, query: &WeatherQuery) -> String {
    if let Some(name) = query.location_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }

    let relative = point
        .properties
        .relative_location
        .as_ref()
        .map(|r| &r.properties);

    match relative.map(|r| (r.city.as_deref(), r.state.as_deref())) {
        Some((Some(city), Some(state))) => format!("{city}, {state}"),
        Some((Some(city), None)) => city.to_string(),
        _ => format!("{:.4}, {:.4}", query.latitude, query.longitude),
    }
}

fn period_temperature_f(period: &ForecastPeriod) -> Option<f64> {
    match period.temperature.as_ref()? {
        Reading::Number(t) => match period.temperature_unit.as_deref() {
            Some("C") => Some(fahrenheit(*t)),
            _ => Some(*t),
        },
        Reading::Quantity(q) => {
            let t = q.value?;
            if q.unit_code.ends_with("degC") {
                Some(fahrenheit(t))
            } else {
                Some(t)
            }
        }
        Reading::Text(s) => s.trim().parse().ok(),
    }
}

fn wind_text(reading: &Reading) -> String {
    match reading {
        Reading::Text(s) => s.clone(),
        Reading::Number(v) => format!("{v:.0} mph"),
        Reading::Quantity(q) => {
            let unit = match q.unit_code.rsplit(':').next().unwrap_or_default() {
                "km_h-1" => "km/h",
                "m_s-1" => "m/s",
                "mi_h-1" | "" => "mph",
                other => other,
            };
            q.value
                .map(|v| format!("{v:.0} {unit}"))
                .unwrap_or_default()
        }
    }
}

/// (high, low) in °F across the first `periods` hourly entries.
fn hourly_range(hourly: &ForecastResponse, periods: usize) -> Option<(f64, f64)> {
    let temps: Vec<f64> = hourly
        .properties
        .periods
        .iter()
        .take(periods)
        .filter_map(period_temperature_f)
        .collect();

    let high = temps.iter().copied().reduce(f64::max)?;
    let low = temps.iter().copied().reduce(f64::min)?;
    Some((high, low))
}

/// Upcoming arrivals for each requested stop, soonest first.
///
/// Every requested stop is present in the result, possibly with no
/// arrivals. Trains that have already departed are dropped.
pub fn normalize_arrivals<S: AsRef<str>>(
    feed: &FeedMessage,
    stop_ids: &[S],
    now: DateTime<Utc>,
    tz: Tz,
) -> Arrivals {
    let mut arrivals: Arrivals = stop_ids
        .iter()
        .map(|id| (id.as_ref().to_string(), Vec::new()))
        .collect();

    for trip_update in feed.entity.iter().filter_map(|e| e.trip_update.as_ref()) {
        let trip_id = trip_update.trip.trip_id.clone().unwrap_or_default();
        let route_id = trip_update.trip.route_id.clone().unwrap_or_default();

        for update in &trip_update.stop_time_update {
            let Some(slot) = update.stop_id.as_deref().and_then(|id| arrivals.get_mut(id)) else {
                continue;
            };
            let Some(epoch) = update
                .arrival
                .as_ref()
                .and_then(|a| a.time)
                .filter(|t| *t != 0)
            else {
                continue;
            };

            let Some(arrival_time) = DateTime::<Utc>::from_timestamp(epoch, 0) else {
                continue;
            };
            let minutes = minutes_until(arrival_time, now);
            if minutes < 0 {
                continue;
            }

            slot.push(TrainArrival {
                stop_id: update.stop_id.clone().unwrap_or_default(),
                minutes_until_arrival: minutes,
                trip_id: trip_id.clone(),
                route_id: route_id.clone(),
                arrival_time,
                arrival_time_local: arrival_time.with_timezone(&tz).fixed_offset(),
            });
        }
    }

    for list in arrivals.values_mut() {
        list.sort_by_key(|a| a.minutes_until_arrival);
    }

    arrivals
}

/// Recompute minute offsets of previously normalized arrivals against `now`.
///
/// Requested stops missing from `cached` come back empty; arrivals that
/// have departed since they were cached are dropped.
pub fn rebase_arrivals<S: AsRef<str>>(cached: &Arrivals, stop_ids: &[S], now: DateTime<Utc>) -> Arrivals {
    stop_ids
        .iter()
        .map(|id| {
            let id = id.as_ref();
            let upcoming = cached
                .get(id)
                .map(|list| {
                    list.iter()
                        .filter_map(|a| {
                            let minutes = minutes_until(a.arrival_time, now);
                            (minutes >= 0).then(|| TrainArrival {
                                minutes_until_arrival: minutes,
                                ..a.clone()
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            (id.to_string(), upcoming)
        })
        .collect()
}

/// Date range, in a reference timezone, within which an alert is current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertWindow {
    /// Days after today still inside the window; 1 means today and tomorrow.
    pub days: u32,
    pub tz: Tz,
}

impl AlertWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let today = now.with_timezone(&self.tz).date_naive();
        let Some(last) = today.checked_add_days(Days::new(u64::from(self.days))) else {
            return false;
        };
        let date = timestamp.with_timezone(&self.tz).date_naive();
        today <= date && date <= last
    }
}

/// Alerts affecting `route_filter`, newest first.
pub fn normalize_alerts(
    feed: &FeedMessage,
    route_filter: &str,
    now: DateTime<Utc>,
    window: Option<&AlertWindow>,
) -> Vec<ServiceAlert> {
    let mut alerts: Vec<ServiceAlert> = feed
        .entity
        .iter()
        .filter_map(|e| e.alert.as_ref())
        .filter_map(|alert| {
            let header_text = first_translation(alert.header_text.as_ref());
            let description_text = first_translation(alert.description_text.as_ref());
            if header_text.is_empty() && description_text.is_empty() {
                return None;
            }

            let route_ids: Vec<String> = alert
                .informed_entity
                .iter()
                .filter_map(|ie| ie.route_id.clone())
                .filter(|r| !r.is_empty())
                .collect();
            if !route_ids.iter().any(|r| r == route_filter) {
                return None;
            }

            let active_timestamp = alert
                .active_period
                .first()
                .and_then(|p| p.start)
                .filter(|s| *s > 0)
                .and_then(|s| i64::try_from(s).ok())
                .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0));

            if let Some(window) = window {
                match active_timestamp {
                    Some(ts) if window.contains(ts, now) => {}
                    _ => return None,
                }
            }

            Some(ServiceAlert {
                header_text,
                description_text,
                active_timestamp,
                route_ids,
            })
        })
        .collect();

    alerts.sort_by(|a, b| b.active_timestamp.cmp(&a.active_timestamp));
    alerts
}

/// Keep only the newest `max` alerts.
pub fn limit_alerts(mut alerts: Vec<ServiceAlert>, max: Option<usize>) -> Vec<ServiceAlert> {
    if let Some(max) = max {
        alerts.truncate(max);
    }
    alerts
}

fn first_translation(text: Option<&TranslatedString>) -> String {
    text.and_then(|t| t.translation.first())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}
