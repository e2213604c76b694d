//! Tempest (WeatherFlow) station observations and daily forecast.

use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use reqwest::Client;
use serde_json::{Value as Json, json};
use tracing::info;

use crate::{
    config::{Panel, TempestCredentials},
    convert::{celsius_to_fahrenheit, hpa_to_inhg, mm_to_inches, mps_to_mph, panel_power_watts},
    error::FetchError,
    format::{epoch_clock, or_na},
    model::{Field, FieldBinding, Observation, Report, ReportKind},
};

use super::{ReportSource, SourceId, get_json};

const TEMPEST_API_BASE: &str = "https://swd.weatherflow.com/swd/rest";

/// Keys of one entry of `obs[]` in the station observations response.
pub const OBSERVATION_FIELDS: &[FieldBinding] = &[
    FieldBinding::new(Field::Timestamp, "/timestamp"),
    FieldBinding::new(Field::Temperature, "/air_temperature"),
    FieldBinding::new(Field::FeelsLike, "/feels_like"),
    FieldBinding::new(Field::Humidity, "/relative_humidity"),
    FieldBinding::new(Field::Pressure, "/barometric_pressure"),
    FieldBinding::new(Field::PressureTrend, "/pressure_trend"),
    FieldBinding::new(Field::WindSpeed, "/wind_avg"),
    FieldBinding::new(Field::WindDirection, "/wind_direction"),
    FieldBinding::new(Field::Precipitation, "/precip_accum_local_day"),
    FieldBinding::new(Field::LightningStrikes, "/strike_count"),
    FieldBinding::new(Field::SolarRadiation, "/solar_radiation"),
];

/// Keys of one entry of `forecast.daily[]` in the better_forecast response.
pub const DAILY_FIELDS: &[FieldBinding] = &[
    FieldBinding::new(Field::Condition, "/conditions"),
    FieldBinding::new(Field::TemperatureHigh, "/air_temp_high"),
    FieldBinding::new(Field::TemperatureLow, "/air_temp_low"),
    FieldBinding::new(Field::PrecipProbability, "/precip_probability"),
    FieldBinding::new(Field::PrecipType, "/precip_type"),
    FieldBinding::new(Field::WindSpeed, "/wind_avg"),
    FieldBinding::new(Field::WindCardinal, "/wind_direction_cardinal"),
    FieldBinding::new(Field::Sunrise, "/sunrise"),
    FieldBinding::new(Field::Sunset, "/sunset"),
];

/// Render the latest station observation as one inline report.
///
/// `payload` is the full observations response; a missing `obs` list renders a
/// report with only its heading.
pub fn render_observation<Tz>(payload: &Json, location: &str, panel: Panel, tz: &Tz) -> Report
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let empty = json!({});
    let latest = payload.pointer("/obs/0").unwrap_or(&empty);
    let obs = Observation::extract(latest, OBSERVATION_FIELDS);

    let time = or_na(obs.number(Field::Timestamp).and_then(|ts| epoch_clock(ts, tz)));
    let mut report = Report::inline(ReportKind::Conditions, format!("WX {location} as of {time}"));

    report.push_opt(
        obs.number(Field::Temperature)
            .map(|c| format!("Temp:{:.0}°F", celsius_to_fahrenheit(c))),
    );
    report.push_opt(
        obs.number(Field::FeelsLike)
            .map(|c| format!("Feels Like: {:.0}°F", celsius_to_fahrenheit(c))),
    );
    report.push_opt(obs.number(Field::Humidity).map(|h| format!("Humidity:{h:.0}%")));

    if let Some(hpa) = obs.number(Field::Pressure) {
        report.push(format!("Barometer:{:.2} Hg", hpa_to_inhg(hpa)));
        report.push_opt(obs.text(Field::PressureTrend).map(|t| format!("and {t}")));
    }

    if let Some(mps) = obs.number(Field::WindSpeed) {
        let mph = mps_to_mph(mps);
        report.push(match obs.number(Field::WindDirection) {
            Some(dir) => format!("Wind:{mph:.0} mph at {dir:.0}°"),
            None => format!("Wind:{mph:.0} mph"),
        });
    }

    report.push_opt(
        obs.number(Field::Precipitation)
            .map(|mm| format!("Rain:{:.2} in", mm_to_inches(mm))),
    );
    report.push_opt(obs.number(Field::LightningStrikes).map(|n| format!("Lightning Strikes:{n:.0}")));

    if let Some(irradiance) = obs.number(Field::SolarRadiation) {
        report.push(format!("Solar Index:{irradiance:.0} W/m²"));
        report.push(format!(
            "Est panel power:{:.2} W",
            panel_power_watts(panel.area_m2, panel.efficiency, irradiance)
        ));
    }

    report
}

/// Render today's entry of a better_forecast response.
///
/// A response without a non-empty `forecast.daily` list is a data error.
pub fn render_daily<Tz>(
    payload: &Json,
    location: &str,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Report, FetchError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let daily = payload
        .pointer("/forecast/daily")
        .and_then(Json::as_array)
        .ok_or(FetchError::MissingKey("forecast.daily"))?;
    let today = daily.first().ok_or(FetchError::NoData("no forecast data available"))?;
    let day = Observation::extract(today, DAILY_FIELDS);

    let date = now.with_timezone(tz).format("%a %d %b");
    let mut report = Report::lines(ReportKind::Daily, "\n");
    report.push(format!("Daily Wx Forecast for {location} on {date}:"));
    report.push(format!("Conditions: {}", or_na(day.text(Field::Condition))));

    let high = day.number(Field::TemperatureHigh).map(celsius_to_fahrenheit);
    let low = day.number(Field::TemperatureLow).map(celsius_to_fahrenheit);
    match (high, low) {
        (Some(high), Some(low)) => report.push(format!("High/Low: {high:.0}°F / {low:.0}°F")),
        (Some(high), None) => report.push(format!("High: {high:.0}°F")),
        _ => {}
    }

    if let Some(chance) = day.number(Field::PrecipProbability) {
        let kind = day.text(Field::PrecipType).unwrap_or_else(|| "none".to_string());
        report.push(format!("Precip Chance: {chance:.0}% ({kind})"));
    }

    if let Some(mps) = day.number(Field::WindSpeed) {
        let mph = mps_to_mph(mps);
        report.push(match day.text(Field::WindCardinal).filter(|c| !c.is_empty()) {
            Some(cardinal) => format!("Wind: {mph:.0} mph {cardinal}"),
            None => format!("Wind: {mph:.0} mph"),
        });
    }

    let sunrise = or_na(day.number(Field::Sunrise).and_then(|ts| epoch_clock(ts, tz)));
    let sunset = or_na(day.number(Field::Sunset).and_then(|ts| epoch_clock(ts, tz)));
    report.push(format!("Sunrise: {sunrise} | Sunset: {sunset}"));

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct TempestCurrentSource {
    http: Client,
    credentials: TempestCredentials,
    panel: Panel,
    location: String,
}

impl TempestCurrentSource {
    pub fn new(http: Client, credentials: TempestCredentials, panel: Panel, location: String) -> Self {
        Self { http, credentials, panel, location }
    }
}

#[async_trait]
impl ReportSource for TempestCurrentSource {
    fn id(&self) -> SourceId {
        SourceId::TempestCurrent
    }

    async fn fetch_reports(&self, _now: DateTime<Utc>) -> Result<Vec<Report>, FetchError> {
        let url = format!(
            "{TEMPEST_API_BASE}/observations/station/{}?token={}",
            self.credentials.station_id, self.credentials.api_token
        );
        info!("Fetching observations for station {}...", self.credentials.station_id);

        let payload = get_json(&self.http, &url, None).await?;
        Ok(vec![render_observation(&payload, &self.location, self.panel, &Local)])
    }
}

#[derive(Debug, Clone)]
pub struct TempestDailySource {
    http: Client,
    credentials: TempestCredentials,
    location: String,
}

impl TempestDailySource {
    pub fn new(http: Client, credentials: TempestCredentials, location: String) -> Self {
        Self { http, credentials, location }
    }
}

#[async_trait]
impl ReportSource for TempestDailySource {
    fn id(&self) -> SourceId {
        SourceId::TempestDaily
    }

    async fn fetch_reports(&self, now: DateTime<Utc>) -> Result<Vec<Report>, FetchError> {
        let url = format!(
            "{TEMPEST_API_BASE}/better_forecast?station_id={}&token={}",
            self.credentials.station_id, self.credentials.api_token
        );
        info!("Fetching Better Forecast for station {}...", self.credentials.station_id);

        let payload = get_json(&self.http, &url, None).await?;
        Ok(vec![render_daily(&payload, &self.location, now, &Local)?])
    }
}
