//! Persistent client configuration.
//!
//! Persists configuration in a JSON file:
//! `~/.config/screenreader-cv/config.json`.
//!
//! This is separate from the user settings in the app envelope: it only holds
//! how the client reaches the backend and where it keeps its data.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{DEFAULT_BACKEND_URL, DEFAULT_TIMEOUT_SECS};
use crate::paths;

const APP_CONFIG_DIR_NAME: &str = "screenreader-cv";
const CONFIG_FILE_NAME: &str = "config.json";

/// Environment override for the backend base URL.
pub const BACKEND_URL_ENV: &str = "SCREENREADER_CV_BACKEND_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
    #[error("Unknown config key: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Verbosity of this client's own events. The HTTP stack underneath stays at
/// `warn` (or quieter) so request plumbing does not drown out capture logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Case-insensitive; `warning` is accepted for `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn directive(self) -> String {
        let deps = self.min(Self::Warn).name();
        let own = self.name();
        format!("{deps},screenreader_cv_lib={own},screenreader_cv={own}")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On-disk shape. Every field is optional so older or hand-edited files load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Names accepted by [`RawConfig::set`].
pub const CONFIG_KEYS: &[&str] = &["backend_url", "log_level", "request_timeout_secs", "data_dir"];

impl RawConfig {
    /// Sets one field from its string form. An empty value clears the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let trimmed = value.trim();
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let text = (!trimmed.is_empty()).then(|| trimmed.to_string());
        match key {
            "backend_url" => self.backend_url = text,
            "data_dir" => self.data_dir = text,
            "log_level" => {
                if let Some(level) = &text {
                    LogLevel::parse(level).ok_or_else(invalid)?;
                }
                self.log_level = text;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = match text {
                    Some(s) => Some(s.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(invalid)?),
                    None => None,
                };
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.backend_url = self.backend_url.filter(|s| !s.trim().is_empty());
        self.log_level = self.log_level.filter(|s| !s.trim().is_empty());
        self.data_dir = self.data_dir.filter(|s| !s.trim().is_empty());
        self
    }
}

pub fn config_path() -> Option<PathBuf> {
    let path = config_dir()?
        .join(APP_CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    Some(path)
}

fn ensure_config_dir_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn load_raw_config() -> Result<RawConfig, ConfigError> {
    let Some(path) = config_path() else {
        debug!("No config_dir available, using defaults only");
        return Ok(RawConfig::default());
    };
    load_raw_config_from(&path)
}

pub fn load_raw_config_from(path: &Path) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(RawConfig::default());
    }

    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

pub fn save_raw_config(cfg: RawConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_raw_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_raw_config_to(path: &Path, cfg: RawConfig) -> Result<(), ConfigError> {
    ensure_config_dir_exists(path)?;
    let data = serde_json::to_string_pretty(&cfg.normalized())?;
    fs::write(path, data)?;
    debug!(?path, "Config saved");
    Ok(())
}

pub fn load_or_default_config() -> RawConfig {
    match load_raw_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = ?err, "Failed to load existing config, starting fresh");
            RawConfig::default()
        }
    }
}

/// Configuration after every source has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub log_level: LogLevel,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Resolves from the config file, the environment and an optional CLI flag.
    pub fn resolve(raw: &RawConfig, backend_flag: Option<&str>) -> Result<Self, String> {
        let from_env = env::var(BACKEND_URL_ENV).ok();
        Ok(Self {
            backend_url: resolve_backend_url(backend_flag, from_env.as_deref(), raw),
            log_level: raw
                .log_level
                .as_deref()
                .and_then(LogLevel::parse)
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(
                raw.request_timeout_secs
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            data_dir: paths::resolve_data_dir(raw.data_dir.as_deref())?,
        })
    }
}

/// Flag, then environment, then config file, then the local default.
pub fn resolve_backend_url(flag: Option<&str>, from_env: Option<&str>, raw: &RawConfig) -> String {
    [flag, from_env, raw.backend_url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_BACKEND_URL)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_precedence() {
        let raw = RawConfig {
            backend_url: Some("http://from-file:1".into()),
            ..RawConfig::default()
        };
        assert_eq!(
            resolve_backend_url(Some("http://flag:3/"), Some("http://env:2"), &raw),
            "http://flag:3"
        );
        assert_eq!(
            resolve_backend_url(None, Some("http://env:2"), &raw),
            "http://env:2"
        );
        assert_eq!(resolve_backend_url(Some(" "), None, &raw), "http://from-file:1");
        assert_eq!(
            resolve_backend_url(None, None, &RawConfig::default()),
            DEFAULT_BACKEND_URL
        );
    }

    #[test]
    fn test_set_validates_values() {
        let mut cfg = RawConfig::default();
        cfg.set("log_level", "debug").unwrap();
        cfg.set("request_timeout_secs", "30").unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.request_timeout_secs, Some(30));

        assert!(matches!(
            cfg.set("log_level", "chatty"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("request_timeout_secs", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(cfg.set("colour", "red"), Err(ConfigError::UnknownKey(_))));

        cfg.set("log_level", "").unwrap();
        assert_eq!(cfg.log_level, None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("screenreader-cv-config-{}", nanoid::nanoid!(8)))
            .join(CONFIG_FILE_NAME);
        assert_eq!(load_raw_config_from(&path).unwrap(), RawConfig::default());

        let cfg = RawConfig {
            backend_url: Some("http://ocr.local:9000".into()),
            log_level: Some(String::new()),
            request_timeout_secs: Some(15),
            data_dir: None,
        };
        save_raw_config_to(&path, cfg).unwrap();

        let loaded = load_raw_config_from(&path).unwrap();
        assert_eq!(loaded.backend_url.as_deref(), Some("http://ocr.local:9000"));
        assert_eq!(loaded.log_level, None);
        assert_eq!(loaded.request_timeout_secs, Some(15));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse(" WARNING "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_log_directive_keeps_dependencies_quiet() {
        assert_eq!(
            LogLevel::Trace.directive(),
            "warn,screenreader_cv_lib=trace,screenreader_cv=trace"
        );
        assert_eq!(
            LogLevel::Error.directive(),
            "error,screenreader_cv_lib=error,screenreader_cv=error"
        );
    }
}
