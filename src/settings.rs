//! User preferences stored in the app envelope.
//!
//! Persisted settings are always read through [`SettingsPatch`], so a field that
//! is missing on disk (e.g. one added in a later release) falls back to its
//! default instead of failing the whole load.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::storage::{AppStore, StorageError};

pub const MIN_HISTORY_ITEMS: usize = 10;
pub const MAX_HISTORY_ITEMS: usize = 500;
pub const MIN_ADJUSTMENT: f64 = 0.5;
pub const MAX_ADJUSTMENT: f64 = 2.0;

/// OCR languages offered to the backend, as `(code, name)`.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("eng", "English"),
    ("spa", "Spanish"),
    ("fra", "French"),
    ("deu", "German"),
    ("ita", "Italian"),
    ("por", "Portuguese"),
    ("rus", "Russian"),
    ("jpn", "Japanese"),
    ("chi_sim", "Chinese (Simplified)"),
    ("chi_tra", "Chinese (Traditional)"),
    ("kor", "Korean"),
    ("ara", "Arabic"),
    ("hin", "Hindi"),
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("maxHistoryItems must be between 10 and 500, got {0}")]
    MaxHistoryItems(usize),
    #[error("{field} must be between 0.5 and 2.0, got {value}")]
    Adjustment { field: &'static str, value: f64 },
    #[error("Unsupported OCR language: {0}")]
    Language(String),
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Failed to persist settings: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultEngine {
    Tesseract,
    Easyocr,
    #[default]
    Both,
}

impl DefaultEngine {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Some(Self::Tesseract),
            "easyocr" => Some(Self::Easyocr),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tesseract => "tesseract",
            Self::Easyocr => "easyocr",
            Self::Both => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preprocessing {
    pub contrast: f64,
    pub brightness: f64,
    pub noise_reduction: bool,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            brightness: 1.0,
            noise_reduction: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_history_items: usize,
    pub auto_save: bool,
    pub default_engine: DefaultEngine,
    pub keyboard_shortcuts: bool,
    pub language: String,
    pub preprocessing: Preprocessing,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_history_items: 100,
            auto_save: true,
            default_engine: DefaultEngine::Both,
            keyboard_shortcuts: true,
            language: "eng".to_string(),
            preprocessing: Preprocessing::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_reduction: Option<bool>,
}

/// Partial settings; every `Some` field overrides the base it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_engine: Option<DefaultEngine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_shortcuts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing: Option<PreprocessingPatch>,
}

/// Setting names accepted by [`SettingsPatch::from_key_value`].
pub const SETTING_KEYS: &[&str] = &[
    "maxHistoryItems",
    "autoSave",
    "defaultEngine",
    "keyboardShortcuts",
    "language",
    "contrast",
    "brightness",
    "noiseReduction",
];

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Patch touching a single field, parsed from its text form. Range checks
    /// happen later in [`Settings::validate`].
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, SettingsError> {
        let value = value.trim();
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || match value.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            _ => Err(invalid()),
        };
        let number = || value.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(invalid);

        let mut patch = Self::default();
        let mut pre = PreprocessingPatch::default();
        match key {
            "maxHistoryItems" => {
                patch.max_history_items = Some(value.parse().map_err(|_| invalid())?)
            }
            "autoSave" => patch.auto_save = Some(flag()?),
            "defaultEngine" => {
                patch.default_engine = Some(DefaultEngine::from_str(value).ok_or_else(invalid)?)
            }
            "keyboardShortcuts" => patch.keyboard_shortcuts = Some(flag()?),
            "language" => patch.language = Some(value.to_string()),
            "contrast" => pre.contrast = Some(number()?),
            "brightness" => pre.brightness = Some(number()?),
            "noiseReduction" => pre.noise_reduction = Some(flag()?),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        if pre != PreprocessingPatch::default() {
            patch.preprocessing = Some(pre);
        }
        Ok(patch)
    }
}

impl Settings {
    /// Returns a copy of `self` with every field present in `patch` replaced.
    pub fn merged(&self, patch: SettingsPatch) -> Settings {
        let mut out = self.clone();
        if let Some(v) = patch.max_history_items {
            out.max_history_items = v;
        }
        if let Some(v) = patch.auto_save {
            out.auto_save = v;
        }
        if let Some(v) = patch.default_engine {
            out.default_engine = v;
        }
        if let Some(v) = patch.keyboard_shortcuts {
            out.keyboard_shortcuts = v;
        }
        if let Some(v) = patch.language {
            out.language = v;
        }
        if let Some(pre) = patch.preprocessing {
            if let Some(v) = pre.contrast {
                out.preprocessing.contrast = v;
            }
            if let Some(v) = pre.brightness {
                out.preprocessing.brightness = v;
            }
            if let Some(v) = pre.noise_reduction {
                out.preprocessing.noise_reduction = v;
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_HISTORY_ITEMS..=MAX_HISTORY_ITEMS).contains(&self.max_history_items) {
            return Err(SettingsError::MaxHistoryItems(self.max_history_items));
        }
        for (field, value) in [
            ("contrast", self.preprocessing.contrast),
            ("brightness", self.preprocessing.brightness),
        ] {
            if !(MIN_ADJUSTMENT..=MAX_ADJUSTMENT).contains(&value) {
                return Err(SettingsError::Adjustment { field, value });
            }
        }
        if !LANGUAGES.iter().any(|(code, _)| *code == self.language) {
            return Err(SettingsError::Language(self.language.clone()));
        }
        Ok(())
    }
}

impl AppStore {
    /// Current settings, already merged over defaults at load time.
    pub fn settings(&self) -> &Settings {
        &self.data().settings
    }

    /// Merges `patch` over the current settings and persists the result.
    /// Invalid values are rejected and nothing changes.
    pub fn save_settings(&mut self, patch: SettingsPatch) -> Result<&Settings, SettingsError> {
        let next = self.settings().merged(patch);
        next.validate()?;
        let previous = std::mem::replace(&mut self.data_mut().settings, next);
        if let Err(err) = self.flush() {
            self.data_mut().settings = previous;
            return Err(err.into());
        }
        info!("Settings saved");
        Ok(self.settings())
    }

    /// Restores every default. Only marks the store dirty; the caller decides
    /// when to flush. Returns true if anything actually changed.
    pub fn reset_settings(&mut self) -> bool {
        let changed = *self.settings() != Settings::default();
        self.data_mut().settings = Settings::default();
        info!(changed, "Settings reset to defaults");
        changed
    }
}
