//! Progress statistics over a word list

#[cfg(feature = "python")]
use pyo3::prelude::*;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::word::{Bucket, WordRecord};

/// Summary shown on the study dashboard
#[cfg_attr(feature = "python", pyclass)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    #[cfg_attr(feature = "python", pyo3(get))]
    pub total_words: usize,
    /// Words whose study date is today
    #[cfg_attr(feature = "python", pyo3(get))]
    pub studied_today: usize,
    /// Studied words as a rounded percentage of all words
    #[cfg_attr(feature = "python", pyo3(get))]
    pub progress: u32,
    /// Words flagged for review by hand
    #[cfg_attr(feature = "python", pyo3(get))]
    pub repeated_words: usize,
    /// Words flagged as new by hand
    #[cfg_attr(feature = "python", pyo3(get))]
    pub new_words: usize,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub studied_30_days: usize,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub studied_24_hours: usize,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub strict_coverage_count: usize,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub strict_coverage_percent: u32,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub due_words: usize,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub difficult_words: usize,
}

#[cfg(feature = "python")]
#[pymethods]
impl StudyStats {
    fn __repr__(&self) -> String {
        format!(
            "StudyStats(total={}, today={}, progress={}%)",
            self.total_words, self.studied_today, self.progress
        )
    }
}

/// Rounded percentage, 0 for an empty whole
fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// When a word was last marked studied; a bare date counts from midnight UTC
fn studied_at(record: &WordRecord) -> Option<DateTime<Utc>> {
    record.studied_timestamp.or_else(|| {
        record
            .studied_date
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    })
}

pub fn get_stats(records: &[WordRecord], now: DateTime<Utc>) -> StudyStats {
    let total = records.len();
    if total == 0 {
        return StudyStats::default();
    }

    let today = now.date_naive();
    let month_start = (now - Duration::days(30)).date_naive();
    let day_ago = now - Duration::hours(24);

    let mut stats = StudyStats {
        total_words: total,
        ..Default::default()
    };
    let mut studied = 0;

    for record in records {
        if record.studied {
            studied += 1;
        }
        if record.studied_date == Some(today) {
            stats.studied_today += 1;
        }
        if record.studied_date.is_some_and(|d| d >= month_start) {
            stats.studied_30_days += 1;
        }
        if studied_at(record).is_some_and(|at| at >= day_ago) {
            stats.studied_24_hours += 1;
        }
        if record.needs_review {
            stats.repeated_words += 1;
        }
        if record.is_new_word {
            stats.new_words += 1;
        }
        if record.is_fully_enhanced() {
            stats.strict_coverage_count += 1;
        }
        if record.is_due(now) {
            stats.due_words += 1;
        }
        if record.bucket == Bucket::Difficult {
            stats.difficult_words += 1;
        }
    }

    stats.progress = percent(studied, total);
    stats.strict_coverage_percent = percent(stats.strict_coverage_count, total);
    stats
}

// ============= Python Binding =============

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "get_stats")]
pub fn py_get_stats(db_path: &str, namespace: &str) -> PyResult<StudyStats> {
    crate::book::with_book(db_path, namespace, |book| Ok(book.stats()))
}
