//! File-backed persistence, schema migration and backup restore.

use std::path::PathBuf;

use screenreader_cv_lib::storage::{StorageBackend, STORAGE_KEY, STORAGE_VERSION};
use screenreader_cv_lib::{
    AppStore, CaptureSource, FileStorage, HistoryItem, HistoryUpdate, OcrResult, SettingsPatch,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("screenreader-cv-{name}-{}", nanoid::nanoid!(8)))
}

fn result(text: &str, engine: &str) -> OcrResult {
    OcrResult {
        text: text.to_string(),
        confidence: 0.75,
        bounding_boxes: Vec::new(),
        processing_time: 1.5,
        engine: Some(engine.to_string()),
        primary_engine: Some(engine.to_string()),
        combined: Some(false),
    }
}

#[test]
fn test_backup_restores_into_a_fresh_data_dir() {
    let source_dir = temp_dir("source");
    let target_dir = temp_dir("target");

    let mut source = AppStore::open(Box::new(FileStorage::new(&source_dir)));
    source.append(HistoryItem::new(
        result("receipt total 12.50", "tesseract"),
        CaptureSource::Upload,
        Some("receipt.jpg".into()),
        None,
    ));
    source.append(HistoryItem::new(
        result("meeting notes", "easyocr"),
        CaptureSource::Screen,
        None,
        None,
    ));
    let id = source.history()[1].id.clone();
    assert!(source.update(
        &id,
        HistoryUpdate {
            tags: Some(vec!["expenses".into()]),
            notes: Some("march".into()),
        },
    ));
    source
        .save_settings(SettingsPatch::from_key_value("maxHistoryItems", "25").unwrap())
        .unwrap();
    let backup = source.export().unwrap();

    let mut target = AppStore::open(Box::new(FileStorage::new(&target_dir)));
    target.import(&backup).unwrap();

    let reopened = AppStore::open(Box::new(FileStorage::new(&target_dir)));
    assert_eq!(reopened.data(), source.data());
    assert_eq!(reopened.settings().max_history_items, 25);
    assert_eq!(reopened.search("EXPENSES").count(), 1);
    assert_eq!(reopened.data().analytics.total_processed, 2);

    let _ = std::fs::remove_dir_all(&source_dir);
    let _ = std::fs::remove_dir_all(&target_dir);
}

#[test]
fn test_legacy_file_is_migrated_and_rewritten() {
    let dir = temp_dir("legacy");
    let legacy = r#"{
        "history": [{
            "text": "kept verbatim", "confidence": 0.6, "processing_time": 3.0,
            "id": "1690000000000-zzzzzzzzz", "timestamp": 1690000000000,
            "source": "region", "region": {"x": 1, "y": 2, "width": 3, "height": 4},
            "tags": []
        }],
        "analytics": {"totalProcessed": 1, "engineUsage": {"combined": 1}},
        "settings": {"autoSave": false}
    }"#;
    let mut raw = FileStorage::new(&dir);
    raw.write(STORAGE_KEY, legacy).unwrap();

    let mut store = AppStore::open(Box::new(FileStorage::new(&dir)));
    assert!(store.is_dirty());
    assert_eq!(store.data().version, STORAGE_VERSION);
    assert_eq!(store.history()[0].id, "1690000000000-zzzzzzzzz");
    assert!(store.history()[0].result.bounding_boxes.is_empty());
    assert!(!store.settings().auto_save);
    assert_eq!(store.settings().language, "eng");
    assert_eq!(store.data().analytics.average_processing_time, 0.0);
    store.flush_if_dirty().unwrap();

    let stored = raw.read(STORAGE_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(value["version"], STORAGE_VERSION);
    assert_eq!(value["settings"]["maxHistoryItems"], 100);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_rejected_import_keeps_file_on_disk() {
    let dir = temp_dir("reject");
    let mut store = AppStore::open(Box::new(FileStorage::new(&dir)));
    store.append(HistoryItem::new(
        result("precious", "tesseract"),
        CaptureSource::Screen,
        None,
        None,
    ));
    store.flush().unwrap();
    let path = FileStorage::new(&dir).path_for(STORAGE_KEY);
    let before = std::fs::read_to_string(&path).unwrap();

    let partial = r#"{"history": [], "analytics": {}, "settings": {}}"#;
    assert!(store.import(partial).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(store.history()[0].result.text, "precious");

    let _ = std::fs::remove_dir_all(&dir);
}
