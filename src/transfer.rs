//! Backup export and import of the app envelope.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::history::HistoryItem;
use crate::storage::migration::{self, RawAppStorage};
use crate::storage::{AppStorage, AppStore, StorageError};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid backup JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Backup is missing the `{0}` section")]
    MissingSection(&'static str),
    #[error("Backup has an invalid value at `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Failed to write imported data: {0}")]
    Storage(#[from] StorageError),
}

/// `screenreader-cv-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("screenreader-cv-backup-{}.json", date.format("%Y-%m-%d"))
}

/// `ocr-history-YYYY-MM-DD.json`
pub fn history_file_name(date: NaiveDate) -> String {
    format!("ocr-history-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_envelope(data: &AppStorage) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn export_history(items: &[HistoryItem]) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(items)?)
}

/// Parses and validates a backup without touching any store.
pub fn parse_backup(blob: &str) -> Result<AppStorage, TransferError> {
    let raw: RawAppStorage = serde_json::from_str(blob)?;
    if !raw.is_complete() {
        let missing = if raw.history.is_none() {
            "history"
        } else if raw.analytics.is_none() {
            "analytics"
        } else if raw.settings.is_none() {
            "settings"
        } else {
            "version"
        };
        return Err(TransferError::MissingSection(missing));
    }
    let migrated = migration::migrate(raw);
    if let Some(first) = migrated.rejected.into_iter().next() {
        return Err(TransferError::InvalidField {
            field: first.field,
            reason: first.reason,
        });
    }
    Ok(migrated.data)
}

impl AppStore {
    /// Full envelope as pretty JSON.
    pub fn export(&self) -> Result<String, TransferError> {
        export_envelope(self.data())
    }

    /// Replaces the whole envelope with `blob` and persists it. On any failure
    /// the current state, in memory and on disk, is left untouched.
    pub fn import(&mut self, blob: &str) -> Result<(), TransferError> {
        let data = match parse_backup(blob) {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "Rejected import");
                return Err(err);
            }
        };
        let history = data.history.len();
        let previous = self.replace_data(data);
        if let Err(err) = self.flush() {
            warn!(error = %err, "Import could not be persisted, restoring previous data");
            self.replace_data(previous);
            return Err(err.into());
        }
        info!(history, "App data imported");
        Ok(())
    }
}
