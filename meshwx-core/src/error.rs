//! Error taxonomy for a single run.
//!
//! Every error is terminal for the run: configuration problems surface before any
//! network activity, fetch problems before the radio is touched, and transport
//! problems abort whatever fragments are still queued.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not determine platform config directory")]
    NoConfigDir,

    #[error("unknown report source '{0}'. Supported sources: {1}")]
    UnknownSource(String, String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },

    #[error("response is missing required key {0}")]
    MissingKey(&'static str),

    #[error("{0}")]
    NoData(&'static str),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {target}: {source}")]
    Connect { target: String, source: io::Error },

    #[error("failed to open serial port {port}: {source}")]
    Serial {
        port: String,
        source: serialport::Error,
    },

    #[error("radio I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame payload of {0} bytes exceeds the stream limit")]
    FrameTooLarge(usize),

    #[error("text of {len} chars exceeds the transport limit of {limit}")]
    TextTooLong { len: usize, limit: usize },

    #[error("timed out waiting for the radio to finish its config handshake")]
    HandshakeTimeout,

    #[error("radio closed the connection")]
    Closed,
}
