//! Client core for an OCR screen-reader backend: capture and upload through the
//! backend's HTTP API, a bounded history with running analytics, and user
//! settings, all kept in one persisted JSON envelope.

pub mod analytics;
pub mod backend;
pub mod capture;
pub mod config;
pub mod history;
pub mod paths;
pub mod render;
pub mod settings;
pub mod shortcuts;
pub mod storage;
pub mod transfer;
pub mod types;

use tracing_subscriber::EnvFilter;

pub use analytics::{Analytics, DailyStat, EngineBucket, EngineUsage, PeriodSummary};
pub use backend::{BackendClient, BackendError, EngineConfig};
pub use capture::{
    CaptureController, CaptureError, CaptureMode, CaptureOutcome, EngineToggles, Notice,
    NoticeKind, Notifier, TracingNotifier,
};
pub use config::{ClientConfig, LogLevel};
pub use history::{HistoryItem, HistoryUpdate};
pub use settings::{DefaultEngine, Settings, SettingsError, SettingsPatch};
pub use storage::{AppStorage, AppStore, FileStorage, MemoryStorage, SharedStore, StorageError};
pub use transfer::TransferError;
pub use types::{BoundingBox, CaptureSource, OcrResult, Region};

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
