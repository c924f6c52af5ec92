//! Capture/upload controller.
//!
//! Drives one OCR request end to end: push the engine selection, call the
//! backend, record a successful result in the store, then update what is
//! displayed. Requests are numbered; a response that arrives after a newer one
//! was already displayed is still recorded but never shown over it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendClient, BackendError, EngineConfig};
use crate::history::HistoryItem;
use crate::settings::DefaultEngine;
use crate::storage::{SharedStore, StorageError};
use crate::types::{CaptureSource, OcrResult, Region};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Select at least one OCR engine")]
    NoEngineSelected,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureMode {
    Screen,
    Region(Region),
    Upload(PathBuf),
}

impl CaptureMode {
    pub fn source(&self) -> CaptureSource {
        match self {
            Self::Screen => CaptureSource::Screen,
            Self::Region(_) => CaptureSource::Region,
            Self::Upload(_) => CaptureSource::Upload,
        }
    }
}

/// Which OCR engines the next request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineToggles {
    pub tesseract: bool,
    pub easyocr: bool,
}

impl EngineToggles {
    pub fn any(&self) -> bool {
        self.tesseract || self.easyocr
    }
}

impl From<DefaultEngine> for EngineToggles {
    fn from(engine: DefaultEngine) -> Self {
        Self {
            tesseract: matches!(engine, DefaultEngine::Tesseract | DefaultEngine::Both),
            easyocr: matches!(engine, DefaultEngine::Easyocr | DefaultEngine::Both),
        }
    }
}

impl From<EngineToggles> for EngineConfig {
    fn from(toggles: EngineToggles) -> Self {
        Self {
            use_easyocr: toggles.easyocr,
            use_tesseract: toggles.tesseract,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => info!(title = %notice.title, "{}", notice.description),
            NoticeKind::Error => error!(title = %notice.title, "{}", notice.description),
        }
    }
}

/// Result currently shown to the user and the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedResult {
    pub seq: u64,
    pub item: HistoryItem,
}

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub seq: u64,
    pub item: HistoryItem,
    /// False when a newer result was already on display.
    pub displayed: bool,
}

#[derive(Debug, Clone, Copy)]
struct ControlState {
    toggles: EngineToggles,
    region_mode: bool,
    region: Region,
}

pub struct CaptureController {
    client: BackendClient,
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ControlState>,
    next_seq: AtomicU64,
    displayed: Mutex<Option<DisplayedResult>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CaptureController {
    /// Engine toggles start from the stored `defaultEngine` setting.
    pub fn new(client: BackendClient, store: SharedStore, notifier: Arc<dyn Notifier>) -> Self {
        let toggles = EngineToggles::from(lock(&*store).settings().default_engine);
        Self {
            client,
            store,
            notifier,
            state: Mutex::new(ControlState {
                toggles,
                region_mode: false,
                region: Region::default(),
            }),
            next_seq: AtomicU64::new(0),
            displayed: Mutex::new(None),
        }
    }

    pub fn toggles(&self) -> EngineToggles {
        lock(&self.state).toggles
    }

    pub fn toggle_tesseract(&self) -> bool {
        let mut state = lock(&self.state);
        state.toggles.tesseract = !state.toggles.tesseract;
        debug!(enabled = state.toggles.tesseract, "Tesseract toggled");
        state.toggles.tesseract
    }

    pub fn toggle_easyocr(&self) -> bool {
        let mut state = lock(&self.state);
        state.toggles.easyocr = !state.toggles.easyocr;
        debug!(enabled = state.toggles.easyocr, "EasyOCR toggled");
        state.toggles.easyocr
    }

    pub fn set_toggles(&self, toggles: EngineToggles) {
        lock(&self.state).toggles = toggles;
    }

    pub fn region_mode(&self) -> bool {
        lock(&self.state).region_mode
    }

    pub fn toggle_region_mode(&self) -> bool {
        let mut state = lock(&self.state);
        state.region_mode = !state.region_mode;
        debug!(region_mode = state.region_mode, "Region mode toggled");
        state.region_mode
    }

    pub fn region(&self) -> Region {
        lock(&self.state).region
    }

    pub fn set_region(&self, region: Region) {
        lock(&self.state).region = region;
    }

    pub fn displayed(&self) -> Option<DisplayedResult> {
        lock(&self.displayed).clone()
    }

    /// Clears what is shown. History is not touched.
    pub fn clear_result(&self) {
        *lock(&self.displayed) = None;
    }

    /// Region when region mode is on, otherwise the full screen.
    pub fn active_mode(&self) -> CaptureMode {
        let state = *lock(&self.state);
        if state.region_mode {
            CaptureMode::Region(state.region)
        } else {
            CaptureMode::Screen
        }
    }

    pub async fn capture_active(&self) -> Result<CaptureOutcome, CaptureError> {
        self.capture(self.active_mode()).await
    }

    pub async fn capture(&self, mode: CaptureMode) -> Result<CaptureOutcome, CaptureError> {
        let toggles = self.toggles();
        if !toggles.any() {
            warn!("Capture refused, no OCR engine selected");
            return Err(CaptureError::NoEngineSelected);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let source = mode.source();
        debug!(seq, %source, "Starting OCR request");

        if let Err(err) = self.client.push_config(toggles.into()).await {
            warn!(error = %err, "Failed to update engine config, continuing");
        }

        let (result, filename, region) = match self.request(&mode).await {
            Ok(ok) => ok,
            Err(err) => {
                warn!(seq, %source, error = %err, "OCR request failed");
                if let CaptureMode::Upload(_) = mode {
                    self.notifier
                        .notify(Notice::error("Upload failed", err.to_string()));
                }
                return Err(err.into());
            }
        };

        let item = HistoryItem::new(result, source, filename, region);
        self.record(&item)?;
        let displayed = self.show(seq, &item);

        self.notifier.notify(Notice::success(
            "Text extracted",
            format!(
                "{} characters at {:.1}% confidence in {:.2}s",
                item.result.text.chars().count(),
                item.result.confidence * 100.0,
                item.result.processing_time
            ),
        ));
        Ok(CaptureOutcome {
            seq,
            item,
            displayed,
        })
    }

    async fn request(
        &self,
        mode: &CaptureMode,
    ) -> Result<(OcrResult, Option<String>, Option<Region>), BackendError> {
        match mode {
            CaptureMode::Screen => Ok((self.client.capture_screen().await?, None, None)),
            CaptureMode::Region(region) => Ok((
                self.client.capture_region(*region).await?,
                None,
                Some(*region),
            )),
            CaptureMode::Upload(path) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                Ok((self.client.upload_image(path).await?, filename, None))
            }
        }
    }

    /// Appends to history (and analytics). Flushes right away when autoSave is on.
    fn record(&self, item: &HistoryItem) -> Result<(), StorageError> {
        let mut store = self.store.lock().map_err(|_| StorageError::Poisoned)?;
        store.append(item.clone());
        if store.settings().auto_save {
            if let Err(err) = store.flush() {
                warn!(error = %err, "Failed to persist app data after capture");
            }
        }
        Ok(())
    }

    fn show(&self, seq: u64, item: &HistoryItem) -> bool {
        let mut displayed = lock(&self.displayed);
        if let Some(current) = displayed.as_ref().filter(|current| current.seq > seq) {
            debug!(seq, shown = current.seq, "Stale OCR response not displayed");
            return false;
        }
        *displayed = Some(DisplayedResult {
            seq,
            item: item.clone(),
        });
        true
    }
}
