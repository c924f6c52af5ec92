//! Versioned schema for the persisted envelope.
//!
//! Stored JSON is first read into a loose [`RawAppStorage`] whose sections are
//! plain JSON values, then converted field by field into the current types. A
//! field that fails to parse or is out of range falls back to its default and
//! is reported in [`Migrated::rejected`]; only an envelope that is not JSON at
//! all fails the load. History items are carried over verbatim.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::analytics::{Analytics, EngineUsage};
use crate::settings::{PreprocessingPatch, Settings, SettingsPatch};

use super::AppStorage;

/// Schema version written by this build.
pub const STORAGE_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Envelope as found on disk or in an import file.
#[derive(Debug, Default, Deserialize)]
pub struct RawAppStorage {
    #[serde(default)]
    pub history: Option<Value>,
    #[serde(default)]
    pub analytics: Option<Value>,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub version: Option<Value>,
}

impl RawAppStorage {
    /// True when all four top-level envelope keys were present.
    pub fn is_complete(&self) -> bool {
        self.history.is_some()
            && self.analytics.is_some()
            && self.settings.is_some()
            && self.version.is_some()
    }
}

/// Known schema versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Missing or unrecognised version string.
    Legacy(Option<String>),
    V1_0_0,
}

impl SchemaVersion {
    pub fn detect(version: Option<&str>) -> Self {
        match version {
            Some(STORAGE_VERSION) => Self::V1_0_0,
            other => Self::Legacy(other.map(str::to_string)),
        }
    }
}

/// A stored value that was dropped in favour of its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedField {
    /// Dotted path such as `settings.defaultEngine` or `history[3]`.
    pub field: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct Migrated {
    pub data: AppStorage,
    /// True when the input was on an older schema and should be rewritten.
    pub upgraded: bool,
    pub rejected: Vec<RejectedField>,
}

/// Parses stored JSON and brings it to the current schema.
pub fn parse_envelope(json: &str) -> Result<Migrated, MigrationError> {
    let raw: RawAppStorage = serde_json::from_str(json)?;
    Ok(migrate(raw))
}

pub fn migrate(raw: RawAppStorage) -> Migrated {
    let version = raw.version.as_ref().and_then(Value::as_str);
    let mut reader = FieldReader::default();
    let (data, upgraded) = match SchemaVersion::detect(version) {
        SchemaVersion::V1_0_0 => (load_v1_0_0(&mut reader, &raw), false),
        SchemaVersion::Legacy(from) => {
            info!(from = ?from, to = STORAGE_VERSION, "Migrating stored app data");
            (upgrade_legacy_to_v1_0_0(&mut reader, &raw), true)
        }
    };
    Migrated {
        data,
        upgraded,
        rejected: reader.rejected,
    }
}

/// Current schema: fill any fields a partial envelope is missing.
fn load_v1_0_0(reader: &mut FieldReader, raw: &RawAppStorage) -> AppStorage {
    AppStorage {
        history: reader
            .list(raw.history.as_ref(), "history")
            .unwrap_or_default(),
        analytics: read_analytics(reader, raw.analytics.as_ref()),
        settings: read_settings(reader, raw.settings.as_ref()),
        version: STORAGE_VERSION.to_string(),
    }
}

/// Anything older: keep history as-is, rebuild analytics and settings over
/// current defaults. 1.0.0 is the first versioned layout, so earlier data maps
/// onto it with the same field-by-field merge.
fn upgrade_legacy_to_v1_0_0(reader: &mut FieldReader, raw: &RawAppStorage) -> AppStorage {
    load_v1_0_0(reader, raw)
}

/// Reads individual fields out of loose JSON, collecting the ones it drops.
#[derive(Debug, Default)]
struct FieldReader {
    rejected: Vec<RejectedField>,
}

impl FieldReader {
    fn reject(&mut self, field: String, reason: String) {
        warn!(field = %field, reason = %reason, "Ignoring invalid stored value");
        self.rejected.push(RejectedField { field, reason });
    }

    fn parse<T: DeserializeOwned>(&mut self, value: &Value, field: String) -> Option<T> {
        match T::deserialize(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                self.reject(field, err.to_string());
                None
            }
        }
    }

    /// `value` if it is a JSON object; anything else is rejected.
    fn object<'v>(&mut self, value: Option<&'v Value>, field: &str) -> Option<&'v Value> {
        let value = value?;
        if value.is_object() {
            return Some(value);
        }
        if !value.is_null() {
            self.reject(field.to_string(), "expected an object".to_string());
        }
        None
    }

    fn field<T: DeserializeOwned>(
        &mut self,
        section: Option<&Value>,
        path: &str,
        key: &str,
    ) -> Option<T> {
        match section?.get(key)? {
            Value::Null => None,
            value => self.parse(value, format!("{path}.{key}")),
        }
    }

    /// Array whose entries are parsed one by one; bad entries are skipped.
    fn list<T: DeserializeOwned>(&mut self, value: Option<&Value>, path: &str) -> Option<Vec<T>> {
        match value? {
            Value::Null => None,
            Value::Array(entries) => Some(
                entries
                    .iter()
                    .enumerate()
                    .filter_map(|(i, entry)| self.parse(entry, format!("{path}[{i}]")))
                    .collect(),
            ),
            _ => {
                self.reject(path.to_string(), "expected an array".to_string());
                None
            }
        }
    }
}

fn read_analytics(reader: &mut FieldReader, section: Option<&Value>) -> Analytics {
    const PATH: &str = "analytics";
    const USAGE_PATH: &str = "analytics.engineUsage";
    let defaults = Analytics::default();
    let section = reader.object(section, PATH);
    let usage = reader.object(section.and_then(|s| s.get("engineUsage")), USAGE_PATH);
    Analytics {
        total_processed: reader
            .field(section, PATH, "totalProcessed")
            .unwrap_or(defaults.total_processed),
        average_processing_time: reader
            .field(section, PATH, "averageProcessingTime")
            .unwrap_or(defaults.average_processing_time),
        average_confidence: reader
            .field(section, PATH, "averageConfidence")
            .unwrap_or(defaults.average_confidence),
        engine_usage: EngineUsage {
            tesseract: reader
                .field(usage, USAGE_PATH, "tesseract")
                .unwrap_or(defaults.engine_usage.tesseract),
            easyocr: reader
                .field(usage, USAGE_PATH, "easyocr")
                .unwrap_or(defaults.engine_usage.easyocr),
            combined: reader
                .field(usage, USAGE_PATH, "combined")
                .unwrap_or(defaults.engine_usage.combined),
        },
        daily_stats: reader
            .list(section.and_then(|s| s.get("dailyStats")), "analytics.dailyStats")
            .unwrap_or(defaults.daily_stats),
    }
}

/// Applies stored settings one field at a time over the defaults. A field
/// that does not parse, or that would fail [`Settings::validate`], keeps its
/// default.
fn read_settings(reader: &mut FieldReader, section: Option<&Value>) -> Settings {
    const PATH: &str = "settings";
    const PRE_PATH: &str = "settings.preprocessing";
    let section = reader.object(section, PATH);
    let pre = reader.object(section.and_then(|s| s.get("preprocessing")), PRE_PATH);

    let preprocessing = |patch: PreprocessingPatch| SettingsPatch {
        preprocessing: Some(patch),
        ..SettingsPatch::default()
    };
    let candidates = [
        (
            "settings.maxHistoryItems",
            SettingsPatch {
                max_history_items: reader.field(section, PATH, "maxHistoryItems"),
                ..SettingsPatch::default()
            },
        ),
        (
            "settings.autoSave",
            SettingsPatch {
                auto_save: reader.field(section, PATH, "autoSave"),
                ..SettingsPatch::default()
            },
        ),
        (
            "settings.defaultEngine",
            SettingsPatch {
                default_engine: reader.field(section, PATH, "defaultEngine"),
                ..SettingsPatch::default()
            },
        ),
        (
            "settings.keyboardShortcuts",
            SettingsPatch {
                keyboard_shortcuts: reader.field(section, PATH, "keyboardShortcuts"),
                ..SettingsPatch::default()
            },
        ),
        (
            "settings.language",
            SettingsPatch {
                language: reader.field(section, PATH, "language"),
                ..SettingsPatch::default()
            },
        ),
        (
            "settings.preprocessing.contrast",
            preprocessing(PreprocessingPatch {
                contrast: reader.field(pre, PRE_PATH, "contrast"),
                ..PreprocessingPatch::default()
            }),
        ),
        (
            "settings.preprocessing.brightness",
            preprocessing(PreprocessingPatch {
                brightness: reader.field(pre, PRE_PATH, "brightness"),
                ..PreprocessingPatch::default()
            }),
        ),
        (
            "settings.preprocessing.noiseReduction",
            preprocessing(PreprocessingPatch {
                noise_reduction: reader.field(pre, PRE_PATH, "noiseReduction"),
                ..PreprocessingPatch::default()
            }),
        ),
    ];

    let mut settings = Settings::default();
    for (field, patch) in candidates {
        let candidate = settings.merged(patch);
        match candidate.validate() {
            Ok(()) => settings = candidate,
            Err(err) => reader.reject(field.to_string(), err.to_string()),
        }
    }
    settings
}
