//! OCR result types shared by the backend client, history and analytics.
//!
//! Field names follow the backend's JSON (snake_case) so results can be stored
//! verbatim in the history envelope.

use serde::{Deserialize, Serialize};

/// A recognised text region as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
    pub confidence: f64,
}

/// OCR result returned by every capture/upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// Overall confidence, 0-1.
    pub confidence: f64,
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
    /// Seconds spent by the backend.
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<bool>,
}

/// Where a history item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Screen,
    Region,
    Upload,
}

impl CaptureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Region => "region",
            Self::Upload => "upload",
        }
    }
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen rectangle in pixels, as sent to `/api/capture/region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        }
    }
}
