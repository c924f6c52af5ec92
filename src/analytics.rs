//! Cumulative OCR analytics, updated incrementally as results are recorded.
//!
//! Analytics outlive the history log: evicting or deleting history items never
//! touches these numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::OcrResult;

/// Number of daily buckets kept; older days are dropped for good.
pub const MAX_DAILY_STATS: usize = 30;

const WEEK_DAYS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineUsage {
    pub tesseract: u64,
    pub easyocr: u64,
    pub combined: u64,
}

impl EngineUsage {
    pub fn total(&self) -> u64 {
        self.tesseract + self.easyocr + self.combined
    }
}

/// Bucket a result is counted under in [`EngineUsage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBucket {
    Tesseract,
    Easyocr,
    Combined,
}

impl EngineBucket {
    /// Anything other than `tesseract` or `easyocr`, including a missing value,
    /// counts as `combined`.
    pub fn from_primary_engine(primary_engine: Option<&str>) -> Self {
        match primary_engine {
            Some("tesseract") => Self::Tesseract,
            Some("easyocr") => Self::Easyocr,
            _ => Self::Combined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tesseract => "tesseract",
            Self::Easyocr => "easyocr",
            Self::Combined => "combined",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    pub count: u64,
    pub avg_time: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_processed: u64,
    pub average_processing_time: f64,
    pub average_confidence: f64,
    pub engine_usage: EngineUsage,
    /// Most recent day first, at most [`MAX_DAILY_STATS`] entries.
    pub daily_stats: Vec<DailyStat>,
}

/// Aggregate over a window of daily buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub total_count: u64,
    pub avg_time: f64,
    pub avg_confidence: f64,
}

/// `(old_mean * (n - 1) + value) / n`, with `n` the count including `value`.
fn incremental_mean(old_mean: f64, n: u64, value: f64) -> f64 {
    (old_mean * (n - 1) as f64 + value) / n as f64
}

impl Analytics {
    /// Records one successful OCR result observed on `date`.
    pub fn record(&mut self, result: &OcrResult, date: NaiveDate) {
        let processing_time = result.processing_time;
        let confidence = result.confidence;
        self.total_processed += 1;
        let n = self.total_processed;
        self.average_processing_time =
            incremental_mean(self.average_processing_time, n, processing_time);
        self.average_confidence = incremental_mean(self.average_confidence, n, confidence);

        let bucket = EngineBucket::from_primary_engine(result.primary_engine.as_deref());
        match bucket {
            EngineBucket::Tesseract => self.engine_usage.tesseract += 1,
            EngineBucket::Easyocr => self.engine_usage.easyocr += 1,
            EngineBucket::Combined => self.engine_usage.combined += 1,
        }

        match self.daily_stats.iter_mut().find(|s| s.date == date) {
            Some(day) => {
                day.count += 1;
                day.avg_time = incremental_mean(day.avg_time, day.count, processing_time);
                day.avg_confidence = incremental_mean(day.avg_confidence, day.count, confidence);
            }
            None => self.daily_stats.push(DailyStat {
                date,
                count: 1,
                avg_time: processing_time,
                avg_confidence: confidence,
            }),
        }

        self.daily_stats.sort_by(|a, b| b.date.cmp(&a.date));
        self.daily_stats.truncate(MAX_DAILY_STATS);

        trace!(
            total = self.total_processed,
            bucket = bucket.as_str(),
            %date,
            "Analytics updated"
        );
    }

    /// Summary of the seven most recent days that have data.
    pub fn weekly_summary(&self) -> PeriodSummary {
        summarize(&self.daily_stats[..self.daily_stats.len().min(WEEK_DAYS)])
    }

    /// Summary of every retained day (up to thirty).
    pub fn monthly_summary(&self) -> PeriodSummary {
        summarize(&self.daily_stats[..self.daily_stats.len().min(MAX_DAILY_STATS)])
    }

    /// Engine with the highest count; ties go to tesseract, then easyocr.
    pub fn most_used_engine(&self) -> EngineBucket {
        let EngineUsage {
            tesseract,
            easyocr,
            combined,
        } = self.engine_usage;
        if tesseract >= easyocr && tesseract >= combined {
            EngineBucket::Tesseract
        } else if easyocr >= combined {
            EngineBucket::Easyocr
        } else {
            EngineBucket::Combined
        }
    }
}

fn summarize(days: &[DailyStat]) -> PeriodSummary {
    let total_count: u64 = days.iter().map(|d| d.count).sum();
    if total_count == 0 {
        return PeriodSummary::default();
    }
    let weight = total_count as f64;
    PeriodSummary {
        total_count,
        avg_time: days.iter().map(|d| d.avg_time * d.count as f64).sum::<f64>() / weight,
        avg_confidence: days
            .iter()
            .map(|d| d.avg_confidence * d.count as f64)
            .sum::<f64>()
            / weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn ocr(processing_time: f64, confidence: f64, engine: Option<&str>) -> OcrResult {
        OcrResult {
            text: String::new(),
            confidence,
            bounding_boxes: Vec::new(),
            processing_time,
            engine: None,
            primary_engine: engine.map(str::to_string),
            combined: None,
        }
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let mut analytics = Analytics::default();
        for t in [1.0, 2.0, 3.0] {
            analytics.record(&ocr(t, 0.5, None), day(1));
        }
        assert_eq!(analytics.total_processed, 3);
        assert!((analytics.average_processing_time - 2.0).abs() < 1e-12);

        let times = [0.37, 1.91, 0.02, 4.4, 2.5, 0.81, 3.3];
        let mut analytics = Analytics::default();
        for t in times {
            analytics.record(&ocr(t, t / 5.0, Some("easyocr")), day(2));
        }
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        assert!((analytics.average_processing_time - mean).abs() < 1e-9);
        assert!((analytics.average_confidence - mean / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_engine_buckets() {
        let mut analytics = Analytics::default();
        analytics.record(&ocr(1.0, 0.9, Some("easyocr")), day(1));
        analytics.record(&ocr(1.0, 0.9, Some("easyocr")), day(1));
        analytics.record(&ocr(1.0, 0.9, Some("tesseract")), day(1));
        assert_eq!(
            analytics.engine_usage,
            EngineUsage {
                tesseract: 1,
                easyocr: 2,
                combined: 0
            }
        );

        analytics.record(&ocr(1.0, 0.9, Some("paddle")), day(1));
        analytics.record(&ocr(1.0, 0.9, None), day(1));
        assert_eq!(analytics.engine_usage.combined, 2);
        assert_eq!(analytics.engine_usage.total(), analytics.total_processed);
    }

    #[test]
    fn test_same_day_updates_existing_bucket() {
        let mut analytics = Analytics::default();
        analytics.record(&ocr(1.0, 0.8, None), day(5));
        analytics.record(&ocr(3.0, 0.4, None), day(5));
        assert_eq!(analytics.daily_stats.len(), 1);
        let today = &analytics.daily_stats[0];
        assert_eq!(today.count, 2);
        assert!((today.avg_time - 2.0).abs() < 1e-12);
        assert!((today.avg_confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_daily_stats_sorted_and_capped() {
        let mut analytics = Analytics::default();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for offset in [3, 40, 0, 12, 1, 39, 2] {
            analytics.record(&ocr(1.0, 1.0, None), start + chrono::Days::new(offset));
        }
        for offset in 4..36 {
            analytics.record(&ocr(1.0, 1.0, None), start + chrono::Days::new(offset));
        }

        assert_eq!(analytics.daily_stats.len(), MAX_DAILY_STATS);
        assert!(analytics
            .daily_stats
            .windows(2)
            .all(|w| w[0].date > w[1].date));
        assert_eq!(
            analytics.daily_stats[0].date,
            start + chrono::Days::new(40)
        );
        // The oldest days were discarded, not merely hidden.
        assert!(!analytics.daily_stats.iter().any(|d| d.date == start));
    }

    #[test]
    fn test_summaries_are_count_weighted() {
        let mut analytics = Analytics::default();
        analytics.record(&ocr(1.0, 1.0, None), day(1));
        analytics.record(&ocr(1.0, 1.0, None), day(1));
        analytics.record(&ocr(1.0, 1.0, None), day(1));
        analytics.record(&ocr(5.0, 0.0, None), day(2));

        let week = analytics.weekly_summary();
        assert_eq!(week.total_count, 4);
        assert!((week.avg_time - 2.0).abs() < 1e-12);
        assert!((week.avg_confidence - 0.75).abs() < 1e-12);
        assert_eq!(analytics.monthly_summary(), week);
        assert_eq!(Analytics::default().weekly_summary(), PeriodSummary::default());
    }

    #[test]
    fn test_most_used_engine_tie_break() {
        let mut analytics = Analytics::default();
        assert_eq!(analytics.most_used_engine(), EngineBucket::Tesseract);
        analytics.engine_usage = EngineUsage {
            tesseract: 1,
            easyocr: 3,
            combined: 3,
        };
        assert_eq!(analytics.most_used_engine(), EngineBucket::Easyocr);
        analytics.engine_usage.combined = 4;
        assert_eq!(analytics.most_used_engine(), EngineBucket::Combined);
    }
}
