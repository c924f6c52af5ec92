//! Plain-text views of results, history, analytics and settings for the CLI.

use std::fmt::Write as _;

use chrono::{Local, TimeZone};

use crate::analytics::{Analytics, PeriodSummary};
use crate::history::HistoryItem;
use crate::settings::{Settings, LANGUAGES};
use crate::types::OcrResult;

const PREVIEW_CHARS: usize = 60;

fn percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// First line of `text`, shortened to a fixed width.
fn preview(text: &str) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

fn engine_label(result: &OcrResult) -> &str {
    result
        .primary_engine
        .as_deref()
        .or(result.engine.as_deref())
        .unwrap_or("combined")
}

pub fn result(result: &OcrResult, show_boxes: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Engine: {}  Confidence: {}  Time: {:.2}s  Regions: {}",
        engine_label(result),
        percent(result.confidence),
        result.processing_time,
        result.bounding_boxes.len()
    );
    out.push('\n');
    if result.text.trim().is_empty() {
        out.push_str("(no text detected)\n");
    } else {
        out.push_str(result.text.trim_end());
        out.push('\n');
    }
    if show_boxes && !result.bounding_boxes.is_empty() {
        out.push_str("\nBounding boxes:\n");
        for (i, b) in result.bounding_boxes.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{:<3} ({:.0},{:.0}) {:.0}x{:.0}  {:>6}  {}",
                i + 1,
                b.x,
                b.y,
                b.width,
                b.height,
                percent(b.confidence),
                b.text
            );
        }
    }
    out
}

pub fn history_list<'a>(items: impl IntoIterator<Item = &'a HistoryItem>) -> String {
    let mut out = String::new();
    let mut count = 0;
    for item in items {
        count += 1;
        let _ = writeln!(
            out,
            "{}  {}  {:<6}  {:>6}  {}",
            item.id,
            format_timestamp(item.timestamp),
            item.source,
            percent(item.result.confidence),
            preview(&item.result.text)
        );
    }
    if count == 0 {
        out.push_str("No history items.\n");
    }
    out
}

pub fn history_detail(item: &HistoryItem, show_boxes: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Id:       {}", item.id);
    let _ = writeln!(out, "Recorded: {}", format_timestamp(item.timestamp));
    let _ = writeln!(out, "Source:   {}", item.source);
    if let Some(name) = &item.filename {
        let _ = writeln!(out, "File:     {name}");
    }
    if let Some(r) = &item.region {
        let _ = writeln!(out, "Region:   {},{} {}x{}", r.x, r.y, r.width, r.height);
    }
    if !item.tags.is_empty() {
        let _ = writeln!(out, "Tags:     {}", item.tags.join(", "));
    }
    if let Some(notes) = item.notes.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "Notes:    {notes}");
    }
    out.push('\n');
    out.push_str(&result(&item.result, show_boxes));
    out
}

fn summary_line(label: &str, summary: &PeriodSummary) -> String {
    format!(
        "{label:<8} {} scans, avg {:.2}s, avg confidence {}",
        summary.total_count,
        summary.avg_time,
        percent(summary.avg_confidence)
    )
}

pub fn analytics(analytics: &Analytics) -> String {
    let mut out = String::new();
    let usage = &analytics.engine_usage;
    let _ = writeln!(out, "Total processed:   {}", analytics.total_processed);
    let _ = writeln!(
        out,
        "Avg processing:    {:.2}s",
        analytics.average_processing_time
    );
    let _ = writeln!(
        out,
        "Avg confidence:    {}",
        percent(analytics.average_confidence)
    );
    if analytics.total_processed > 0 {
        let _ = writeln!(
            out,
            "Most used engine:  {}",
            analytics.most_used_engine().as_str()
        );
    }
    let _ = writeln!(
        out,
        "Engine usage:      tesseract {}, easyocr {}, combined {}",
        usage.tesseract, usage.easyocr, usage.combined
    );
    out.push('\n');
    let _ = writeln!(out, "{}", summary_line("Week", &analytics.weekly_summary()));
    let _ = writeln!(out, "{}", summary_line("Month", &analytics.monthly_summary()));

    if !analytics.daily_stats.is_empty() {
        out.push_str("\nDaily:\n");
        for day in &analytics.daily_stats {
            let _ = writeln!(
                out,
                "  {}  {:>4}  {:.2}s  {}",
                day.date,
                day.count,
                day.avg_time,
                percent(day.avg_confidence)
            );
        }
    }
    out
}

pub fn settings(settings: &Settings) -> String {
    let language = LANGUAGES
        .iter()
        .find(|(code, _)| *code == settings.language)
        .map(|(_, name)| *name)
        .unwrap_or("unknown");
    let pre = &settings.preprocessing;
    let mut out = String::new();
    let _ = writeln!(out, "maxHistoryItems    {}", settings.max_history_items);
    let _ = writeln!(out, "autoSave           {}", settings.auto_save);
    let _ = writeln!(out, "defaultEngine      {}", settings.default_engine.as_str());
    let _ = writeln!(out, "keyboardShortcuts  {}", settings.keyboard_shortcuts);
    let _ = writeln!(out, "language           {} ({language})", settings.language);
    let _ = writeln!(out, "contrast           {:.2}", pre.contrast);
    let _ = writeln!(out, "brightness         {:.2}", pre.brightness);
    let _ = writeln!(out, "noiseReduction     {}", pre.noise_reduction);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::{sample_item, sample_result};
    use crate::types::BoundingBox;
    use chrono::NaiveDate;

    #[test]
    fn test_preview_takes_first_non_blank_line() {
        assert_eq!(preview("\n  \nhello\nworld"), "hello");
        let long = "x".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_result_lists_boxes_only_when_asked() {
        let mut r = sample_result("Total 42", 0.5, Some("tesseract"));
        r.bounding_boxes.push(BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 8.0,
            text: "Total".into(),
            confidence: 0.9,
        });
        let with = result(&r, true);
        assert!(with.contains("Engine: tesseract"));
        assert!(with.contains("(10,20) 30x8"));
        assert!(!result(&r, false).contains("Bounding boxes"));
    }

    #[test]
    fn test_empty_history_message() {
        assert_eq!(history_list(Vec::new()), "No history items.\n");
        let item = sample_item("line one\nline two");
        let listing = history_list([&item]);
        assert!(listing.starts_with(&item.id));
        assert!(listing.contains("line one"));
        assert!(!listing.contains("line two"));
    }

    #[test]
    fn test_analytics_shows_summaries() {
        let mut a = Analytics::default();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        a.record(&sample_result("a", 2.0, Some("easyocr")), date);
        let text = analytics(&a);
        assert!(text.contains("Total processed:   1"));
        assert!(text.contains("Most used engine:  easyocr"));
        assert!(text.contains("2024-05-01"));
    }

    #[test]
    fn test_settings_names_language() {
        assert!(settings(&Settings::default()).contains("eng (English)"));
    }
}
