use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::ConfigError;

pub const DEFAULT_CHANNEL_INDEX: u32 = 4;
/// Meshtastic nodes carry channel slots 0..=7.
pub const MAX_CHANNEL_INDEX: u32 = 7;
pub const DEFAULT_TCP_PORT: u16 = 4403;
pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_PANEL_SIZE: f64 = 0.04;
pub const DEFAULT_PANEL_EFFICIENCY: f64 = 0.20;
pub const DEFAULT_LAT: f64 = 33.74733;
pub const DEFAULT_LON: f64 = -111.77912;
pub const DEFAULT_USER_AGENT: &str = "WeatherApp/1.0 (your.email@example.com)";
pub const DEFAULT_LOCATION_NAME: &str = "NE Scottsdale";

/// Optional settings file. Every key may also be given as an environment variable
/// (upper-cased), which takes precedence.
///
/// Example TOML:
/// tempest_api_token = "..."
/// tempest_station_id = "12345"
/// meshtastic_interface = "serial"
/// meshtastic_port = "/dev/ttyUSB0"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempest_api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempest_station_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshtastic_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshtastic_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshtastic_tcp_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshtastic_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshtastic_baud: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_efficiency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
}

impl FileConfig {
    /// Load `path`, or the platform default location when `path` is `None`.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::config_file_path()?;
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };

        let contents = fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Save to `path` (or the default location), creating parent directories.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }

        let toml = toml::to_string_pretty(self)?;
        fs::write(&path, toml).map_err(|source| ConfigError::Write { path: path.clone(), source })?;

        Ok(path)
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "meshwx", "meshwx").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioTarget {
    Tcp { host: String, port: u16 },
    Serial { path: String, baud: u32 },
}

impl fmt::Display for RadioTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioTarget::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            RadioTarget::Serial { path, baud } => write!(f, "serial:{path}@{baud}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempestCredentials {
    pub api_token: String,
    pub station_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub area_m2: f64,
    pub efficiency: f64,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    tempest_token: Option<String>,
    tempest_station: Option<String>,
    pub channel_index: u32,
    pub radio: RadioTarget,
    pub panel: Panel,
    pub lat: f64,
    pub lon: f64,
    pub user_agent: String,
    pub location_name: String,
}

impl Settings {
    /// Resolve settings from the process environment layered over `file`.
    pub fn load(file: &FileConfig) -> Result<Self, ConfigError> {
        Self::resolve(file, |key| env::var(key).ok())
    }

    /// Resolve settings using `lookup` for overrides (usually the environment).
    pub fn resolve<F>(file: &FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let text = |key: &'static str, from_file: &Option<String>| -> Option<String> {
            lookup(key)
                .or_else(|| from_file.clone())
                .filter(|v| !v.trim().is_empty())
        };

        let tempest_token = text("TEMPEST_API_TOKEN", &file.tempest_api_token);
        let tempest_station = text("TEMPEST_STATION_ID", &file.tempest_station_id);

        let interface = text("MESHTASTIC_INTERFACE", &file.meshtastic_interface)
            .unwrap_or_else(|| "tcp".to_string());
        let radio = match interface.to_lowercase().as_str() {
            "tcp" => RadioTarget::Tcp {
                host: text("MESHTASTIC_HOST", &file.meshtastic_host)
                    .unwrap_or_else(|| "localhost".to_string()),
                port: parsed(&lookup, "MESHTASTIC_TCP_PORT", file.meshtastic_tcp_port)?
                    .unwrap_or(DEFAULT_TCP_PORT),
            },
            "serial" => RadioTarget::Serial {
                path: text("MESHTASTIC_PORT", &file.meshtastic_port)
                    .ok_or(ConfigError::Missing("MESHTASTIC_PORT"))?,
                baud: parsed(&lookup, "MESHTASTIC_BAUD", file.meshtastic_baud)?
                    .unwrap_or(DEFAULT_BAUD),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "MESHTASTIC_INTERFACE",
                    value: interface,
                    reason: "expected 'tcp' or 'serial'".to_string(),
                });
            }
        };

        let channel_index =
            parsed(&lookup, "CHANNEL_INDEX", file.channel_index)?.unwrap_or(DEFAULT_CHANNEL_INDEX);
        if channel_index > MAX_CHANNEL_INDEX {
            return Err(ConfigError::Invalid {
                key: "CHANNEL_INDEX",
                value: channel_index.to_string(),
                reason: format!("channel index must be between 0 and {MAX_CHANNEL_INDEX}"),
            });
        }

        Ok(Self {
            tempest_token,
            tempest_station,
            channel_index,
            radio,
            panel: Panel {
                area_m2: parsed(&lookup, "PANEL_SIZE", file.panel_size)?
                    .unwrap_or(DEFAULT_PANEL_SIZE),
                efficiency: parsed(&lookup, "PANEL_EFFICIENCY", file.panel_efficiency)?
                    .unwrap_or(DEFAULT_PANEL_EFFICIENCY),
            },
            lat: parsed(&lookup, "LAT", file.lat)?.unwrap_or(DEFAULT_LAT),
            lon: parsed(&lookup, "LON", file.lon)?.unwrap_or(DEFAULT_LON),
            user_agent: text("USER_AGENT", &file.user_agent)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            location_name: text("LOCATION_NAME", &file.location_name)
                .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string()),
        })
    }

    /// Tempest credentials, required by the Tempest report sources.
    pub fn tempest(&self) -> Result<TempestCredentials, ConfigError> {
        let api_token = self.tempest_token.clone().ok_or(ConfigError::Missing("TEMPEST_API_TOKEN"))?;
        let station_id =
            self.tempest_station.clone().ok_or(ConfigError::Missing("TEMPEST_STATION_ID"))?;

        Ok(TempestCredentials { api_token, station_id })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, from_file: Option<T>) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(from_file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(file: &FileConfig, vars: &[(&'static str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<&str, String> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        Settings::resolve(file, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = resolve(&FileConfig::default(), &[]).unwrap();

        assert_eq!(settings.channel_index, 4);
        assert_eq!(
            settings.radio,
            RadioTarget::Tcp { host: "localhost".into(), port: DEFAULT_TCP_PORT }
        );
        assert_eq!(settings.panel, Panel { area_m2: 0.04, efficiency: 0.20 });
        assert_eq!(settings.lat, DEFAULT_LAT);
        assert_eq!(settings.lon, DEFAULT_LON);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.location_name, "NE Scottsdale");
    }

    #[test]
    fn tempest_credentials_are_required_on_demand() {
        let settings = resolve(&FileConfig::default(), &[("TEMPEST_API_TOKEN", "tok")]).unwrap();
        let err = settings.tempest().unwrap_err();
        assert!(err.to_string().contains("TEMPEST_STATION_ID"));

        let settings = resolve(
            &FileConfig::default(),
            &[("TEMPEST_API_TOKEN", "tok"), ("TEMPEST_STATION_ID", "123")],
        )
        .unwrap();
        let creds = settings.tempest().unwrap();
        assert_eq!(creds.api_token, "tok");
        assert_eq!(creds.station_id, "123");
    }

    #[test]
    fn environment_overrides_file() {
        let file = FileConfig {
            channel_index: Some(2),
            location_name: Some("Ridge".into()),
            tempest_api_token: Some("file-token".into()),
            tempest_station_id: Some("1".into()),
            ..FileConfig::default()
        };

        let settings = resolve(&file, &[("CHANNEL_INDEX", "7"), ("TEMPEST_API_TOKEN", "env-token")])
            .unwrap();

        assert_eq!(settings.channel_index, 7);
        assert_eq!(settings.location_name, "Ridge");
        assert_eq!(settings.tempest().unwrap().api_token, "env-token");
    }

    #[test]
    fn serial_interface_requires_port() {
        let err = resolve(&FileConfig::default(), &[("MESHTASTIC_INTERFACE", "Serial")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MESHTASTIC_PORT")));

        let settings = resolve(
            &FileConfig::default(),
            &[("MESHTASTIC_INTERFACE", "serial"), ("MESHTASTIC_PORT", "/dev/ttyUSB0")],
        )
        .unwrap();
        assert_eq!(
            settings.radio,
            RadioTarget::Serial { path: "/dev/ttyUSB0".into(), baud: DEFAULT_BAUD }
        );
    }

    #[test]
    fn channel_index_out_of_range_is_invalid() {
        let err = resolve(&FileConfig::default(), &[("CHANNEL_INDEX", "8")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHANNEL_INDEX", .. }));
    }

    #[test]
    fn unknown_interface_is_invalid() {
        let err = resolve(&FileConfig::default(), &[("MESHTASTIC_INTERFACE", "ble")]).unwrap_err();
        assert!(err.to_string().contains("MESHTASTIC_INTERFACE"));
    }

    #[test]
    fn unparsable_number_is_invalid() {
        let err = resolve(&FileConfig::default(), &[("PANEL_SIZE", "big")]).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "PANEL_SIZE");
                assert_eq!(value, "big");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_config_round_trips_through_disk() {
        let dir = env::temp_dir().join(format!("meshwx-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let cfg = FileConfig {
            tempest_station_id: Some("999".into()),
            meshtastic_interface: Some("serial".into()),
            meshtastic_port: Some("/dev/ttyACM0".into()),
            lat: Some(40.0),
            ..FileConfig::default()
        };

        cfg.save(Some(&path)).unwrap();
        let loaded = FileConfig::load(Some(&path)).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded, cfg);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/meshwx.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
