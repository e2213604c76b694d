//! National Weather Service (api.weather.gov) observations, hourly forecast and
//! active alerts.

use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::{
    convert::{celsius_to_fahrenheit, mps_to_mph, pa_to_inhg},
    error::FetchError,
    format::{NOT_AVAILABLE, iso_clock, json_text, or_na, parse_iso, period_label},
    model::{Field, FieldBinding, Observation, Report, ReportKind},
};

use super::{ReportSource, SourceId, array_at, get_json, string_at};

const NWS_API_BASE: &str = "https://api.weather.gov";
const GEO_JSON: &str = "application/geo+json";

/// Future forecast periods included in the forecast report.
pub const MAX_FORECAST_PERIODS: usize = 2;

/// Keys of a `/stations/{id}/observations/latest` response.
pub const OBSERVATION_FIELDS: &[FieldBinding] = &[
    FieldBinding::new(Field::Timestamp, "/properties/timestamp"),
    FieldBinding::new(Field::Condition, "/properties/textDescription"),
    FieldBinding::new(Field::Temperature, "/properties/temperature/value"),
    FieldBinding::new(Field::Humidity, "/properties/relativeHumidity/value"),
    FieldBinding::new(Field::WindSpeed, "/properties/windSpeed/value"),
    FieldBinding::new(Field::WindDirection, "/properties/windDirection/value"),
    FieldBinding::new(Field::Pressure, "/properties/barometricPressure/value"),
];

/// Forecast endpoints resolved from a `/points` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastUrls {
    pub hourly: String,
    pub period: String,
}

/// Nearest observation station from a station list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: String,
    pub name: Option<String>,
}

pub fn observation_stations_url(points: &Json) -> Result<&str, FetchError> {
    string_at(points, &["/properties/observationStations", "/observationStations"])
        .ok_or(FetchError::MissingKey("observationStations"))
}

pub fn forecast_urls(points: &Json) -> Result<ForecastUrls, FetchError> {
    let hourly = string_at(points, &["/properties/forecastHourly", "/forecastHourly"])
        .ok_or(FetchError::MissingKey("forecastHourly"))?;
    let period = string_at(points, &["/properties/forecast", "/forecast"])
        .ok_or(FetchError::MissingKey("forecast"))?;

    Ok(ForecastUrls { hourly: hourly.to_string(), period: period.to_string() })
}

/// `City, ST` from a `/points` response, if the provider included it.
pub fn relative_location(points: &Json) -> Option<String> {
    let city = string_at(
        points,
        &["/properties/relativeLocation/properties/city", "/relativeLocation/city"],
    )?;
    let state = string_at(
        points,
        &["/properties/relativeLocation/properties/state", "/relativeLocation/state"],
    )?;
    Some(format!("{city}, {state}"))
}

pub fn nearest_station(stations: &Json) -> Result<Station, FetchError> {
    let first = array_at(stations, &["/features"])
        .first()
        .ok_or(FetchError::NoData("no weather stations found nearby"))?;

    let id = first
        .pointer("/properties/stationIdentifier")
        .and_then(Json::as_str)
        .ok_or(FetchError::MissingKey("stationIdentifier"))?;
    let name = first.pointer("/properties/name").and_then(Json::as_str);

    Ok(Station { id: id.to_string(), name: name.map(str::to_string) })
}

/// Render the latest observation of `station`.
pub fn render_observation<Tz>(station: &Station, payload: &Json, tz: &Tz) -> Report
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let obs = Observation::extract(payload, OBSERVATION_FIELDS);
    let time = or_na(obs.text(Field::Timestamp).and_then(|ts| iso_clock(&ts, tz)));

    let mut report = Report::lines(ReportKind::Conditions, "\n");
    report.push(format!("NWS Current Conditions as of {time}"));
    report.push(format!(
        "Station: {} ({})",
        station.name.as_deref().unwrap_or(NOT_AVAILABLE),
        station.id
    ));
    report.push(format!("Conditions: {}", or_na(obs.text(Field::Condition))));

    report.push_opt(
        obs.number(Field::Temperature)
            .map(|c| format!("Temperature: {:.1}°F", celsius_to_fahrenheit(c))),
    );
    report.push_opt(obs.number(Field::Humidity).map(|h| format!("Humidity: {h:.0}%")));

    if let Some(mps) = obs.number(Field::WindSpeed) {
        let mph = mps_to_mph(mps);
        report.push(match obs.number(Field::WindDirection) {
            Some(dir) => format!("Wind: {mph:.1} mph from {dir:.0}°"),
            None => format!("Wind Speed: {mph:.1} mph"),
        });
    }

    report.push_opt(
        obs.number(Field::Pressure)
            .map(|pa| format!("Pressure: {:.2} inHg", pa_to_inhg(pa))),
    );

    report
}

/// Periods starting strictly after `now`, in provider order, at most
/// [`MAX_FORECAST_PERIODS`]. Periods without a parsable start time are skipped.
pub fn upcoming_periods<'a>(periods: &'a [Json], now: DateTime<Utc>) -> Vec<(DateTime<Utc>, &'a Json)> {
    periods
        .iter()
        .filter_map(|p| {
            let start = p.get("startTime").and_then(Json::as_str).and_then(parse_iso);
            if start.is_none() {
                debug!("skipping forecast period without a valid startTime");
            }
            start.map(|s| (s, p))
        })
        .filter(|(start, _)| *start > now)
        .take(MAX_FORECAST_PERIODS)
        .collect()
}

/// Render the hourly forecast and the active alerts.
///
/// With no alerts, `No active alerts.` closes the forecast report and a single
/// report is returned. Otherwise the alerts follow as their own report.
pub fn render_forecast<Tz>(
    location: &str,
    periods: &[Json],
    alerts: &[Json],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Report>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut forecast = Report::lines(ReportKind::Forecast, "\r\n");
    forecast.push(format!("{location} WX Forecast:"));
    forecast.push(format!("Next {MAX_FORECAST_PERIODS} hours:"));

    for (start, period) in upcoming_periods(periods, now) {
        let field = |key: &str| or_na(json_text(period.get(key)));
        forecast.push(format!(
            "{}: {}°{}, wind {} {}, {}",
            period_label(&start, tz),
            field("temperature"),
            field("temperatureUnit"),
            field("windDirection"),
            field("windSpeed"),
            field("shortForecast"),
        ));
    }

    if alerts.is_empty() {
        forecast.push("No active alerts.");
        return vec![forecast];
    }

    let mut active = Report::lines(ReportKind::Alerts, "\r\n");
    active.push("Active alerts:");
    for alert in alerts {
        let event = or_na(json_text(alert.pointer("/properties/event")));
        let headline = or_na(json_text(alert.pointer("/properties/headline")));
        active.push(format!("- {event}: {headline}"));
    }

    vec![forecast, active]
}

#[derive(Debug, Clone)]
pub struct NwsCurrentSource {
    http: Client,
    lat: f64,
    lon: f64,
}

impl NwsCurrentSource {
    pub fn new(http: Client, lat: f64, lon: f64) -> Self {
        Self { http, lat, lon }
    }
}

#[async_trait]
impl ReportSource for NwsCurrentSource {
    fn id(&self) -> SourceId {
        SourceId::NwsCurrent
    }

    async fn fetch_reports(&self, _now: DateTime<Utc>) -> Result<Vec<Report>, FetchError> {
        info!("Looking up weather station for coordinates: {}, {}", self.lat, self.lon);
        let points_url = format!("{NWS_API_BASE}/points/{},{}", self.lat, self.lon);
        let points = get_json(&self.http, &points_url, Some(GEO_JSON)).await?;

        let stations_url = observation_stations_url(&points)?;
        info!("Fetching nearby stations...");
        let stations = get_json(&self.http, stations_url, Some(GEO_JSON)).await?;
        let station = nearest_station(&stations)?;
        info!(
            "Using station: {} ({})",
            station.name.as_deref().unwrap_or(NOT_AVAILABLE),
            station.id
        );

        let obs_url = format!("{NWS_API_BASE}/stations/{}/observations/latest", station.id);
        let latest = get_json(&self.http, &obs_url, Some(GEO_JSON)).await?;

        Ok(vec![render_observation(&station, &latest, &Local)])
    }
}

#[derive(Debug, Clone)]
pub struct NwsForecastSource {
    http: Client,
    lat: f64,
    lon: f64,
    location: String,
}

impl NwsForecastSource {
    pub fn new(http: Client, lat: f64, lon: f64, location: String) -> Self {
        Self { http, lat, lon, location }
    }
}

#[async_trait]
impl ReportSource for NwsForecastSource {
    fn id(&self) -> SourceId {
        SourceId::NwsForecast
    }

    async fn fetch_reports(&self, now: DateTime<Utc>) -> Result<Vec<Report>, FetchError> {
        let points_url = format!("{NWS_API_BASE}/points/{},{}", self.lat, self.lon);
        let points = get_json(&self.http, &points_url, Some(GEO_JSON)).await?;

        let urls = forecast_urls(&points)?;
        info!(
            "Location: {} ({}, {})",
            relative_location(&points).as_deref().unwrap_or(NOT_AVAILABLE),
            self.lat,
            self.lon
        );
        info!("Hourly forecast: {}", urls.hourly);
        info!("Period forecast: {}", urls.period);

        let hourly = get_json(&self.http, &urls.hourly, Some(GEO_JSON)).await?;
        let periods = array_at(&hourly, &["/properties/periods", "/periods"]);

        let alerts_url = format!("{NWS_API_BASE}/alerts/active?point={},{}", self.lat, self.lon);
        let alerts = get_json(&self.http, &alerts_url, Some(GEO_JSON)).await?;
        let features = array_at(&alerts, &["/features"]);
        info!("{} active alert(s)", features.len());

        Ok(render_forecast(&self.location, periods, features, now, &Local))
    }
}
