//! Core library for the `meshwx` relay.
//!
//! This crate defines:
//! - Configuration layered from a TOML file and the environment
//! - Report sources for Tempest stations and the National Weather Service
//! - Observation extraction, unit conversion and report rendering
//! - Chunking and paced delivery over a Meshtastic radio link
//!
//! It is used by `meshwx-cli`, but can also be reused by other binaries or services.

pub mod chunk;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod model;
pub mod provider;
pub mod radio;
pub mod sender;

pub use chunk::{Fragment, TRANSPORT_LIMIT, split_message};
pub use config::{FileConfig, RadioTarget, Settings};
pub use error::{ConfigError, FetchError, TransportError};
pub use model::{Observation, Report, ReportKind};
pub use provider::{ReportSource, SourceId, source_from_settings};
pub use radio::{RadioLink, connect};
pub use sender::{Outgoing, Pacing, deliver, prepare};
