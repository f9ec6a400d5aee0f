//! GoldWord Core - spaced-repetition scheduling for vocabulary flashcards
//!
//! Tracks each word's progress through a fixed interval ladder, buckets
//! words by difficulty and composes bounded daily study plans. Word lists
//! are stored per namespace in SQLite. Build with the `python` feature for
//! the Python extension module.

mod book;
mod clock;
mod config;
mod db;
mod fuzzy;
mod plan;
mod progress;
mod schedule;
mod word;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use book::{ImportMode, ImportReport, WordBook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PlanQuotas, StudyConfig};
pub use db::{init_database, MemoryRepository, NamespaceInfo, RecordRepository, Result, SqliteRepository, StoreError};
pub use fuzzy::{grade_answer, AnswerGrade};
pub use plan::{generate_daily_plan, DailyPlan, PlanEntry, Pool};
pub use progress::{get_stats, StudyStats};
pub use schedule::{
    advance, apply_answer, format_interval, interval_for, proficiency_level, regress, MAX_STAGE,
    STAGE_INTERVALS,
};
pub use word::{Bucket, Gloss, ReviewEntry, WordContent, WordRecord};

/// GoldWord Core Python Module
#[cfg(feature = "python")]
#[pymodule]
fn goldword_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Storage
    m.add_function(wrap_pyfunction!(db::py_init_database, m)?)?;
    m.add_function(wrap_pyfunction!(db::py_list_namespaces, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_clear_namespace, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_import_words, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_export_words, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_get_all_words, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_add_word, m)?)?;

    // Answers
    m.add_function(wrap_pyfunction!(book::py_record_answer, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_record_typed_answer, m)?)?;
    m.add_function(wrap_pyfunction!(fuzzy::py_grade_answer, m)?)?;

    // Flags
    m.add_function(wrap_pyfunction!(book::py_mark_word_for_review, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_unmark_word_for_review, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_mark_word_as_new, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_unmark_word_as_new, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_mark_word_as_studied, m)?)?;

    // Sessions and progress
    m.add_function(wrap_pyfunction!(book::py_get_words_for_review, m)?)?;
    m.add_function(wrap_pyfunction!(plan::py_generate_daily_plan, m)?)?;
    m.add_function(wrap_pyfunction!(book::py_start_session, m)?)?;
    m.add_function(wrap_pyfunction!(progress::py_get_stats, m)?)?;

    // Register classes
    m.add_class::<word::WordCard>()?;
    m.add_class::<db::NamespaceInfo>()?;
    m.add_class::<fuzzy::AnswerGrade>()?;
    m.add_class::<progress::StudyStats>()?;

    Ok(())
}
