//! Bounded OCR history log, most recent item first.
//!
//! The log lives inside the app envelope owned by [`AppStore`]; every append
//! also feeds the analytics aggregator with the same item.

use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::AppStore;
use crate::types::{CaptureSource, OcrResult, Region};

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const ID_SUFFIX_LEN: usize = 9;

/// One persisted OCR operation: the backend result plus local metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub result: OcrResult,
    pub id: String,
    /// Epoch milliseconds at insertion.
    pub timestamp: i64,
    pub source: CaptureSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HistoryItem {
    /// Wraps a fresh backend result with a new id and the current timestamp.
    pub fn new(
        result: OcrResult,
        source: CaptureSource,
        filename: Option<String>,
        region: Option<Region>,
    ) -> Self {
        let timestamp = Local::now().timestamp_millis();
        Self {
            result,
            id: generate_id(timestamp),
            timestamp,
            source,
            filename,
            region,
            tags: Vec::new(),
            notes: Some(String::new()),
        }
    }

    /// Local calendar date the item was recorded on.
    pub fn local_date(&self) -> NaiveDate {
        Local
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| dt.date_naive())
            .unwrap_or_else(|| Local::now().date_naive())
    }

    fn matches(&self, needle: &str) -> bool {
        self.result.text.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
            || self
                .notes
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(needle))
    }
}

/// `<epoch-millis>-<9 lowercase alphanumerics>`.
fn generate_id(timestamp: i64) -> String {
    format!(
        "{}-{}",
        timestamp,
        nanoid::nanoid!(ID_SUFFIX_LEN, &ID_ALPHABET)
    )
}

/// Edits allowed on an existing item. Other fields are immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Items whose text, tags or notes contain `query`, ignoring case.
///
/// A blank query yields every item. Order is preserved.
pub fn search<'a>(
    items: &'a [HistoryItem],
    query: &str,
) -> impl Iterator<Item = &'a HistoryItem> + 'a {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(move |item| needle.is_empty() || item.matches(&needle))
}

/// Drops duplicate and blank tags, keeping first occurrences in order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

impl AppStore {
    pub fn history(&self) -> &[HistoryItem] {
        &self.data().history
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.data().history.iter().find(|item| item.id == id)
    }

    /// Inserts `item` at the head, records it in analytics, then trims the log
    /// to `maxHistoryItems`. Analytics are never affected by the trim.
    pub fn append(&mut self, item: HistoryItem) {
        let date = item.local_date();
        let data = self.data_mut();
        data.analytics.record(&item.result, date);

        let id = item.id.clone();
        data.history.insert(0, item);
        let cap = data.settings.max_history_items;
        if data.history.len() > cap {
            let evicted = data.history.len() - cap;
            data.history.truncate(cap);
            debug!(evicted, cap, "Evicted oldest history items");
        }
        info!(id = %id, total = data.analytics.total_processed, "History item recorded");
    }

    /// Removes the item with `id`. Returns false (and changes nothing) if absent.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.data().history.iter().position(|item| item.id == id) else {
            debug!(id = %id, "Delete ignored, no such history item");
            return false;
        };
        self.data_mut().history.remove(pos);
        info!(id = %id, "History item deleted");
        true
    }

    /// Empties the log. Analytics are kept.
    pub fn clear_history(&mut self) {
        let removed = self.data().history.len();
        self.data_mut().history.clear();
        info!(removed, "History cleared");
    }

    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a HistoryItem> + 'a {
        search(&self.data().history, query)
    }

    /// Applies tag/notes edits to the item with `id`. Returns false if absent.
    pub fn update(&mut self, id: &str, update: HistoryUpdate) -> bool {
        let Some(item) = self
            .data_mut()
            .history
            .iter_mut()
            .find(|item| item.id == id)
        else {
            debug!(id = %id, "Update ignored, no such history item");
            return false;
        };
        if let Some(tags) = update.tags {
            item.tags = normalize_tags(tags);
        }
        if let Some(notes) = update.notes {
            item.notes = Some(notes);
        }
        debug!(id = %id, "History item updated");
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    pub(crate) fn sample_result(text: &str, processing_time: f64, engine: Option<&str>) -> OcrResult {
        OcrResult {
            text: text.to_string(),
            confidence: 0.8,
            bounding_boxes: Vec::new(),
            processing_time,
            engine: engine.map(str::to_string),
            primary_engine: engine.map(str::to_string),
            combined: Some(engine.is_none()),
        }
    }

    pub(crate) fn sample_item(text: &str) -> HistoryItem {
        HistoryItem::new(sample_result(text, 1.0, None), CaptureSource::Screen, None, None)
    }

    fn store() -> AppStore {
        AppStore::open(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_generated_ids_have_expected_shape() {
        let item = sample_item("x");
        let (millis, suffix) = item.id.split_once('-').unwrap();
        assert_eq!(millis, item.timestamp.to_string());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(item.id, sample_item("x").id);
    }

    #[test]
    fn test_append_caps_history_but_not_analytics() {
        let mut store = store();
        store.data_mut().settings.max_history_items = 10;
        for i in 0..25 {
            store.append(sample_item(&format!("item {i}")));
        }

        assert_eq!(store.history().len(), 10);
        let texts: Vec<_> = store.history().iter().map(|i| i.result.text.clone()).collect();
        let expected: Vec<_> = (15..25).rev().map(|i| format!("item {i}")).collect();
        assert_eq!(texts, expected);
        assert_eq!(store.data().analytics.total_processed, 25);
        assert_eq!(store.data().analytics.engine_usage.total(), 25);
    }

    #[test]
    fn test_delete_missing_id_is_a_no_op() {
        let mut store = store();
        store.append(sample_item("keep"));
        let before = store.data().clone();
        assert!(!store.delete("nope"));
        assert_eq!(store.data(), &before);

        let id = store.history()[0].id.clone();
        assert!(store.delete(&id));
        assert!(store.history().is_empty());
        assert_eq!(store.data().analytics.total_processed, 1);
    }

    #[test]
    fn test_clear_keeps_analytics() {
        let mut store = store();
        store.append(sample_item("a"));
        store.append(sample_item("b"));
        store.clear_history();
        assert!(store.history().is_empty());
        assert_eq!(store.data().analytics.total_processed, 2);
    }

    #[test]
    fn test_search_matches_text_tags_and_notes() {
        let mut store = store();
        store.append(sample_item("Invoice Total: 42"));
        store.append(sample_item("meeting agenda"));
        store.append(sample_item("nothing here"));

        let agenda_id = store.history()[1].id.clone();
        let nothing_id = store.history()[0].id.clone();
        store.update(
            &agenda_id,
            HistoryUpdate {
                tags: Some(vec!["Work".into()]),
                notes: None,
            },
        );
        store.update(
            &nothing_id,
            HistoryUpdate {
                tags: None,
                notes: Some("call the INVOICE desk".into()),
            },
        );

        let hits: Vec<_> = store.search("invoice").map(|i| i.result.text.as_str()).collect();
        assert_eq!(hits, vec!["nothing here", "Invoice Total: 42"]);
        let hits: Vec<_> = store.search("WORK").map(|i| i.id.as_str()).collect();
        assert_eq!(hits, vec![agenda_id.as_str()]);
        assert_eq!(store.search("zebra").count(), 0);
    }

    #[test]
    fn test_blank_search_returns_everything_in_order() {
        let mut store = store();
        for text in ["one", "two", "three"] {
            store.append(sample_item(text));
        }
        let all: Vec<_> = store.search("   ").map(|i| i.id.clone()).collect();
        let ids: Vec<_> = store.history().iter().map(|i| i.id.clone()).collect();
        assert_eq!(all, ids);
        assert_eq!(store.search("").count(), 3);
    }

    #[test]
    fn test_update_normalizes_tags() {
        let mut store = store();
        store.append(sample_item("a"));
        let id = store.history()[0].id.clone();
        assert!(store.update(
            &id,
            HistoryUpdate {
                tags: Some(vec!["x".into(), " y ".into(), "x".into(), "".into()]),
                notes: None,
            },
        ));
        assert_eq!(store.get(&id).unwrap().tags, vec!["x", "y"]);
        assert!(!store.update("missing", HistoryUpdate::default()));
    }

    #[test]
    fn test_item_serializes_flat() {
        let item = sample_item("flat");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["text"], "flat");
        assert_eq!(value["source"], "screen");
        assert!(value.get("result").is_none());
        let back: HistoryItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }
}
