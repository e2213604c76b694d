use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value as Json;
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::debug;

use crate::{
    config::Settings,
    error::{ConfigError, FetchError},
    model::Report,
    provider::{
        nws::{NwsCurrentSource, NwsForecastSource},
        tempest::{TempestCurrentSource, TempestDailySource},
    },
};

pub mod nws;
pub mod tempest;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One run's worth of reports, one variant per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    TempestCurrent,
    TempestDaily,
    NwsCurrent,
    NwsForecast,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::TempestCurrent => "tempest-current",
            SourceId::TempestDaily => "tempest-daily",
            SourceId::NwsCurrent => "nws-current",
            SourceId::NwsForecast => "nws-forecast",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[
            SourceId::TempestCurrent,
            SourceId::TempestDaily,
            SourceId::NwsCurrent,
            SourceId::NwsForecast,
        ]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SourceId {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        SourceId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == lower)
            .ok_or_else(|| {
                let supported: Vec<&str> = SourceId::all().iter().map(SourceId::as_str).collect();
                ConfigError::UnknownSource(value.to_string(), supported.join(", "))
            })
    }
}

#[async_trait]
pub trait ReportSource: Send + Sync + Debug {
    fn id(&self) -> SourceId;

    /// Fetch provider data and render it into 0..=3 reports, in send order.
    async fn fetch_reports(&self, now: DateTime<Utc>) -> Result<Vec<Report>, FetchError>;
}

/// Construct a report source from settings.
///
/// Fails before any network activity when a setting the source needs is absent.
pub fn source_from_settings(
    id: SourceId,
    settings: &Settings,
) -> Result<Box<dyn ReportSource>, ConfigError> {
    let http = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(ConfigError::HttpClient)?;

    let boxed: Box<dyn ReportSource> = match id {
        SourceId::TempestCurrent => Box::new(TempestCurrentSource::new(
            http,
            settings.tempest()?,
            settings.panel,
            settings.location_name.clone(),
        )),
        SourceId::TempestDaily => Box::new(TempestDailySource::new(
            http,
            settings.tempest()?,
            settings.location_name.clone(),
        )),
        SourceId::NwsCurrent => Box::new(NwsCurrentSource::new(http, settings.lat, settings.lon)),
        SourceId::NwsForecast => Box::new(NwsForecastSource::new(
            http,
            settings.lat,
            settings.lon,
            settings.location_name.clone(),
        )),
    };

    Ok(boxed)
}

/// GET `url` and parse the body as a JSON object. Non-2xx is an error.
pub(crate) async fn get_json(
    http: &Client,
    url: &str,
    accept: Option<&str>,
) -> Result<Json, FetchError> {
    debug!("GET {}", redact(url));

    let mut req = http.get(url);
    if let Some(accept) = accept {
        req = req.header(reqwest::header::ACCEPT, accept);
    }

    let res = req
        .send()
        .await
        .map_err(|source| FetchError::Http { url: redact(url), source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| FetchError::Http { url: redact(url), source })?;

    if !status.is_success() {
        return Err(FetchError::Status {
            url: redact(url),
            status,
            body: truncate_body(&body),
        });
    }

    let json: Json =
        serde_json::from_str(&body).map_err(|source| FetchError::Json { url: redact(url), source })?;

    if !json.is_object() {
        return Err(FetchError::NoData("response is not a JSON object"));
    }

    Ok(json)
}

/// First string found at any of `pointers`.
pub(crate) fn string_at<'a>(json: &'a Json, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .find_map(|p| json.pointer(p).and_then(Json::as_str))
}

/// Array at the first of `pointers` that holds one; empty when none do.
pub(crate) fn array_at<'a>(json: &'a Json, pointers: &[&str]) -> &'a [Json] {
    pointers
        .iter()
        .find_map(|p| json.pointer(p).and_then(Json::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Strip the query string so API tokens stay out of logs and error messages.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?…"),
        None => url.to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use serde_json::json;
    use std::{
        io::{Read, Write},
        net::TcpListener,
        sync::mpsc,
        thread,
    };

    /// Answers a single HTTP request with `status` and `body`, handing the raw
    /// request back through the returned channel.
    fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let n = stream.read(&mut buf).unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (format!("http://{addr}/points/1,2"), rx)
    }

    fn client() -> Client {
        Client::builder().user_agent("meshwx-test/1.0").build().unwrap()
    }

    #[tokio::test]
    async fn get_json_sends_headers_and_parses_object() {
        let (url, requests) = serve_once("200 OK", r#"{"forecast":"https://p"}"#);

        let json = get_json(&client(), &url, Some("application/geo+json")).await.unwrap();

        assert_eq!(json["forecast"], "https://p");
        let request = requests.recv().unwrap().to_lowercase();
        assert!(request.contains("user-agent: meshwx-test/1.0"));
        assert!(request.contains("accept: application/geo+json"));
    }

    #[tokio::test]
    async fn get_json_fails_on_error_status() {
        let (url, _requests) = serve_once("503 Service Unavailable", r#"{"title":"busy"}"#);

        let err = get_json(&client(), &url, None).await.unwrap_err();

        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 503);
                assert!(body.contains("busy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_json_rejects_non_object_payloads() {
        let (url, _requests) = serve_once("200 OK", "[1, 2, 3]");
        let err = get_json(&client(), &url, None).await.unwrap_err();
        assert!(matches!(err, FetchError::NoData(_)));

        let (url, _requests) = serve_once("200 OK", "not json");
        let err = get_json(&client(), &url, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Json { .. }));
    }

    fn settings(vars: &[(&'static str, &'static str)]) -> Settings {
        Settings::resolve(&FileConfig::default(), |key| {
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn source_id_as_str_roundtrip() {
        for id in SourceId::all() {
            let parsed = SourceId::try_from(id.as_str()).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
        assert_eq!(SourceId::try_from("NWS-Forecast").unwrap(), SourceId::NwsForecast);
    }

    #[test]
    fn unknown_source_error_lists_supported() {
        let err = SourceId::try_from("doesnotexist").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown report source 'doesnotexist'"));
        assert!(msg.contains("tempest-current"));
    }

    #[test]
    fn tempest_sources_need_credentials() {
        let cfg = settings(&[]);
        let err = source_from_settings(SourceId::TempestCurrent, &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TEMPEST_API_TOKEN")));

        let err = source_from_settings(SourceId::TempestDaily, &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TEMPEST_API_TOKEN")));
    }

    #[test]
    fn sources_build_when_configured() {
        let cfg = settings(&[("TEMPEST_API_TOKEN", "t"), ("TEMPEST_STATION_ID", "1")]);
        for id in SourceId::all() {
            let source = source_from_settings(*id, &cfg).expect("source should build");
            assert_eq!(source.id(), *id);
        }
    }

    #[test]
    fn lookups_fall_back_across_pointers() {
        let doc = json!({ "forecast": "root", "properties": { "periods": [1, 2] } });

        assert_eq!(string_at(&doc, &["/properties/forecast", "/forecast"]), Some("root"));
        assert_eq!(string_at(&doc, &["/missing"]), None);
        assert_eq!(array_at(&doc, &["/properties/periods", "/periods"]).len(), 2);
        assert!(array_at(&doc, &["/periods"]).is_empty());
    }

    #[test]
    fn redact_hides_tokens() {
        assert_eq!(redact("https://x/obs/1?token=secret"), "https://x/obs/1?…");
        assert_eq!(redact("https://api.weather.gov/points/1,2"), "https://api.weather.gov/points/1,2");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "°".repeat(300);
        let out = truncate_body(&body);
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
