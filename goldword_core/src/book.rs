//! The word book: one namespace's records and every operation on them
//!
//! A `WordBook` loads a namespace's document once and answers queries from
//! memory. Each mutation is one exclusive read-modify-write: take the
//! repository's write lock, pick up whatever other handles stored since,
//! apply the change, save the whole set and commit. Two books open on the
//! same namespace therefore never overwrite each other's answers.
//!
//! If a write fails the mutation is kept, the error is logged and handed to
//! the caller, and the book stops re-reading the store until a later write
//! succeeds: its in-memory set is the authoritative copy in the meantime.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::clock::{Clock, SystemClock};
use crate::config::StudyConfig;
use crate::db::{RecordRepository, Result, StoreError};
use crate::fuzzy::{grade_answer, AnswerGrade};
use crate::plan::{generate_daily_plan, DailyPlan};
use crate::progress::{get_stats, StudyStats};
use crate::schedule::apply_answer;
use crate::word::{Gloss, WordContent, WordRecord};

/// How an import treats the words already in the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Swap the whole set for the imported one
    #[default]
    Replace,
    /// Append unknown words, merge content onto known ones
    Merge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub updated: usize,
    /// Blank, duplicate or unreadable entries
    pub skipped: usize,
}

/// Word shown when a learner opens an empty book; due right away
fn seed_word(now: DateTime<Utc>) -> WordRecord {
    let mut record = WordRecord::with_content(
        "Remote",
        WordContent {
            phonetic: Some("rɪˈmoʊt".to_string()),
            part_of_speech: Some("adj.".to_string()),
            definition: Some("Far away from other places or people.".to_string()),
            chinese: Some("偏远的; 遥远的; 疏远的".to_string()),
            mnemonic: Some("Remote control (遥控器)".to_string()),
            collocations: vec![Gloss::new("Remote island", "偏远岛屿")],
            ..Default::default()
        },
    );
    record.next_review = Some(now);
    record
}

/// Decode array items one by one so a single bad entry does not sink the rest
fn decode_records(items: Vec<Value>) -> (Vec<WordRecord>, usize) {
    let total = items.len();
    let records: Vec<WordRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WordRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping unreadable word entry: {}", e);
                None
            }
        })
        .collect();
    let unreadable = total - records.len();
    (records, unreadable)
}

/// Normalize legacy layouts, drop blank words and later duplicates
fn tidy(records: Vec<WordRecord>) -> (Vec<WordRecord>, usize) {
    let total = records.len();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(total);

    for mut record in records {
        if record.word.is_empty() || !seen.insert(record.word.clone()) {
            continue;
        }
        record.lift_legacy_content();
        kept.push(record);
    }

    let dropped = total - kept.len();
    (kept, dropped)
}

fn build_index(records: &[WordRecord]) -> HashMap<String, usize> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.word.clone(), i))
        .collect()
}

/// Stored word list of a namespace; a document that cannot be decoded reads as empty
fn load_records<R: RecordRepository>(repo: &R, namespace: &str) -> Result<Vec<WordRecord>> {
    let Some(raw) = repo.load(namespace)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(items) => Ok(tidy(decode_records(items).0).0),
        Err(e) => {
            log::warn!("Word list for '{}' is corrupt, reading it as empty: {}", namespace, e);
            Ok(Vec::new())
        }
    }
}

pub struct WordBook<R: RecordRepository, C: Clock = SystemClock> {
    repo: R,
    namespace: String,
    clock: C,
    config: StudyConfig,
    records: Vec<WordRecord>,
    index: HashMap<String, usize>,
    /// Holds changes the repository has not accepted yet
    unsaved: bool,
}

impl<R: RecordRepository, C: Clock> WordBook<R, C> {
    /// Load a namespace. A document that cannot be decoded opens as an
    /// empty book; only backend failures are errors.
    pub fn open(repo: R, namespace: impl Into<String>, clock: C) -> Result<Self> {
        let namespace = namespace.into();
        let records = load_records(&repo, &namespace)?;
        let config = StudyConfig::load(&repo, &namespace)?;
        let index = build_index(&records);

        log::debug!("Opened '{}' with {} words", namespace, records.len());
        Ok(Self {
            repo,
            namespace,
            clock,
            config,
            records,
            index,
            unsaved: false,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WordRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&WordRecord> {
        self.records.get(index)
    }

    pub fn position(&self, word: &str) -> Option<usize> {
        self.index.get(word.trim()).copied()
    }

    pub fn find(&self, word: &str) -> Option<&WordRecord> {
        self.position(word).map(|i| &self.records[i])
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Pick up words and settings stored through other handles.
    /// A book holding unsaved changes keeps its own copy.
    pub fn reload(&mut self) -> Result<()> {
        if self.unsaved {
            return Ok(());
        }
        self.records = load_records(&self.repo, &self.namespace)?;
        self.index = build_index(&self.records);
        self.config = StudyConfig::load(&self.repo, &self.namespace)?;
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let result = serde_json::to_string(&self.records)
            .map_err(StoreError::Serialize)
            .and_then(|doc| self.repo.save(&self.namespace, &doc));

        match &result {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                self.unsaved = true;
                log::error!("Failed to save word list for '{}': {}", self.namespace, e);
            }
        }
        result
    }

    /// Run `f` as one exclusive read-modify-write. `f` returns `None` when
    /// it changed nothing, and then nothing is saved.
    fn write<T>(&mut self, f: impl FnOnce(&mut Self, DateTime<Utc>) -> Option<T>) -> Result<Option<T>> {
        self.repo.begin_exclusive()?;

        let result = self.reload().and_then(|()| {
            let now = self.clock.now();
            match f(self, now) {
                Some(out) => self.persist().map(|()| Some(out)),
                None => Ok(None),
            }
        });

        match result {
            Ok(out) => {
                if let Err(e) = self.repo.commit() {
                    self.unsaved = true;
                    log::error!("Failed to commit '{}': {}", self.namespace, e);
                    return Err(e);
                }
                Ok(out)
            }
            Err(e) => {
                if let Err(rb) = self.repo.rollback() {
                    log::warn!("Rollback failed for '{}': {}", self.namespace, rb);
                }
                Err(e)
            }
        }
    }

    fn push(&mut self, record: WordRecord) -> usize {
        let index = self.records.len();
        self.index.insert(record.word.clone(), index);
        self.records.push(record);
        index
    }

    /// Apply `f` to the word at `index` and persist. The word is looked up
    /// again after reloading, so the returned position is current.
    /// `Ok(None)` when out of range.
    fn update(&mut self, index: usize, f: impl FnOnce(&mut WordRecord, DateTime<Utc>)) -> Result<Option<usize>> {
        let Some(word) = self.records.get(index).map(|r| r.word.clone()) else {
            return Ok(None);
        };

        self.write(|book, now| {
            let index = book.position(&word)?;
            f(&mut book.records[index], now);
            Some(index)
        })
    }

    /// Add a word by hand. An existing word keeps its record and index.
    pub fn add_word(&mut self, word: &str) -> Result<Option<usize>> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(None);
        }
        if let Some(index) = self.position(word) {
            return Ok(Some(index));
        }

        let added = self.write(|book, _| {
            book.position(word)
                .is_none()
                .then(|| book.push(WordRecord::new(word)))
        })?;
        Ok(added.or_else(|| self.position(word)))
    }

    /// Write enhanced content for a word, leaving its schedule untouched
    pub fn upsert_content(&mut self, word: &str, content: WordContent) -> Result<Option<usize>> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(None);
        }

        self.write(|book, _| {
            Some(match book.position(word) {
                Some(index) => {
                    book.records[index].content = content;
                    index
                }
                None => book.push(WordRecord::with_content(word, content)),
            })
        })
    }

    /// Import a JSON array of word records.
    ///
    /// Missing scheduling fields take the fresh-word defaults. Within the
    /// document the first occurrence of a word wins.
    pub fn import_json(&mut self, document: &str, mode: ImportMode) -> Result<ImportReport> {
        let items: Vec<Value> = serde_json::from_str(document).map_err(StoreError::Parse)?;
        let (decoded, unreadable) = decode_records(items);
        let (incoming, dropped) = tidy(decoded);

        let mut report = ImportReport {
            skipped: unreadable + dropped,
            ..Default::default()
        };

        self.write(|book, _| {
            match mode {
                ImportMode::Replace => {
                    report.added = incoming.len();
                    book.index = build_index(&incoming);
                    book.records = incoming;
                }
                ImportMode::Merge => {
                    for record in incoming {
                        match book.position(&record.word) {
                            Some(index) => {
                                book.records[index].content.merge_from(record.content);
                                report.updated += 1;
                            }
                            None => {
                                book.push(record);
                                report.added += 1;
                            }
                        }
                    }
                }
            }
            Some(())
        })?;

        log::info!(
            "Imported into '{}' ({:?}): {} added, {} updated, {} skipped",
            self.namespace,
            mode,
            report.added,
            report.updated,
            report.skipped
        );
        Ok(report)
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records).map_err(StoreError::Serialize)
    }

    /// Grade one answer, reschedule the word and persist
    pub fn record_answer(&mut self, index: usize, is_correct: bool) -> Result<Option<&WordRecord>> {
        let Some(index) = self.update(index, |record, now| apply_answer(record, is_correct, now))? else {
            return Ok(None);
        };
        Ok(self.records.get(index))
    }

    pub fn record_answer_for(&mut self, word: &str, is_correct: bool) -> Result<Option<&WordRecord>> {
        match self.position(word) {
            Some(index) => self.record_answer(index, is_correct),
            None => Ok(None),
        }
    }

    /// Grade a typed answer against the word and record the outcome
    pub fn record_typed_answer(&mut self, index: usize, typed: &str) -> Result<Option<AnswerGrade>> {
        let Some(record) = self.records.get(index) else {
            return Ok(None);
        };
        let grade = grade_answer(typed, &record.word, self.config.typed_answer_threshold);
        self.record_answer(index, grade.is_correct)?;
        Ok(Some(grade))
    }

    pub fn mark_word_for_review(&mut self, index: usize) -> Result<bool> {
        Ok(self.update(index, |record, _| record.needs_review = true)?.is_some())
    }

    pub fn unmark_word_for_review(&mut self, index: usize) -> Result<bool> {
        Ok(self.update(index, |record, _| record.needs_review = false)?.is_some())
    }

    pub fn mark_word_as_new(&mut self, index: usize) -> Result<bool> {
        Ok(self.update(index, |record, _| record.is_new_word = true)?.is_some())
    }

    pub fn unmark_word_as_new(&mut self, index: usize) -> Result<bool> {
        Ok(self.update(index, |record, _| record.is_new_word = false)?.is_some())
    }

    pub fn mark_word_as_studied(&mut self, index: usize) -> Result<bool> {
        Ok(self.update(index, mark_studied)?.is_some())
    }

    /// "I know it": studied and answered correctly
    pub fn answer_known(&mut self, index: usize) -> Result<bool> {
        let found = self.update(index, |record, now| {
            mark_studied(record, now);
            apply_answer(record, true, now);
        })?;
        Ok(found.is_some())
    }

    /// "I forgot": a wrong answer that also puts the word back on the new list
    pub fn answer_forgotten(&mut self, index: usize) -> Result<bool> {
        let found = self.update(index, |record, now| {
            apply_answer(record, false, now);
            record.is_new_word = true;
        })?;
        Ok(found.is_some())
    }

    /// Flip the review flag; flagging also marks the word as new.
    /// Returns the flag's new value.
    pub fn toggle_dont_remember(&mut self, index: usize) -> Result<Option<bool>> {
        let mut flagged = false;
        let found = self.update(index, |record, _| {
            record.needs_review = !record.needs_review;
            if record.needs_review {
                record.is_new_word = true;
            }
            flagged = record.needs_review;
        })?;
        Ok(found.map(|_| flagged))
    }

    /// Words due now, in store order
    pub fn words_for_review(&self) -> Vec<(usize, &WordRecord)> {
        let now = self.clock.now();
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_due(now))
            .collect()
    }

    /// Words not studied yet or flagged for review
    pub fn words_to_study(&self) -> Vec<(usize, &WordRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.studied || r.needs_review)
            .collect()
    }

    pub fn daily_plan<G: Rng + ?Sized>(&self, rng: &mut G) -> DailyPlan<'_> {
        self.daily_plan_with_target(self.config.daily_target, rng)
    }

    pub fn daily_plan_with_target<G: Rng + ?Sized>(&self, target: usize, rng: &mut G) -> DailyPlan<'_> {
        generate_daily_plan(&self.records, self.clock.now(), target, &self.config.quotas, rng)
    }

    /// Store positions for a study session.
    ///
    /// Uses the daily plan; falls back to every word when the plan is empty,
    /// and seeds an example word into an empty book.
    pub fn start_session<G: Rng + ?Sized>(&mut self, rng: &mut G) -> Result<Vec<usize>> {
        let planned = self.daily_plan(rng).indices();
        if !planned.is_empty() {
            return Ok(planned);
        }

        if self.is_empty() {
            let seeded = self.write(|book, now| book.is_empty().then(|| book.push(seed_word(now))))?;
            if let Some(index) = seeded {
                log::info!("'{}' had no words, seeded an example", self.namespace);
                return Ok(vec![index]);
            }
        }
        Ok((0..self.len()).collect())
    }

    pub fn stats(&self) -> StudyStats {
        get_stats(&self.records, self.clock.now())
    }

    pub fn set_config(&mut self, config: StudyConfig) -> Result<()> {
        config.save(&mut self.repo, &self.namespace)?;
        self.config = config;
        Ok(())
    }

    /// Drop every word in the namespace
    pub fn clear(&mut self) -> Result<()> {
        let removed = self.records.len();
        self.records.clear();
        self.index.clear();

        if let Err(e) = self.repo.clear(&self.namespace) {
            self.unsaved = true;
            log::error!("Failed to clear '{}': {}", self.namespace, e);
            return Err(e);
        }
        self.unsaved = false;
        log::info!("Cleared {} words from '{}'", removed, self.namespace);
        Ok(())
    }
}

fn mark_studied(record: &mut WordRecord, now: DateTime<Utc>) {
    record.studied = true;
    record.studied_date = Some(now.date_naive());
    record.studied_timestamp = Some(now);
}

// ============= Python Bindings =============

#[cfg(feature = "python")]
use crate::db::SqliteRepository;
#[cfg(feature = "python")]
use crate::word::WordCard;

/// Open a namespace and run `f` on it. Each mutation inside `f` runs in
/// its own exclusive transaction.
#[cfg(feature = "python")]
pub(crate) fn with_book<T>(
    db_path: &str,
    namespace: &str,
    f: impl FnOnce(&mut WordBook<SqliteRepository>) -> Result<T>,
) -> PyResult<T> {
    let repo = SqliteRepository::open(db_path)?;
    let mut book = WordBook::open(repo, namespace, SystemClock)?;
    Ok(f(&mut book)?)
}

#[cfg(feature = "python")]
fn cards<'a>(entries: impl IntoIterator<Item = (usize, &'a WordRecord)>) -> Vec<WordCard> {
    entries
        .into_iter()
        .map(|(index, record)| WordCard::from_record(index, record))
        .collect()
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "clear_namespace")]
pub fn py_clear_namespace(db_path: &str, namespace: &str) -> PyResult<()> {
    with_book(db_path, namespace, |book| book.clear())
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "import_words", signature = (db_path, namespace, document, merge=false))]
pub fn py_import_words(db_path: &str, namespace: &str, document: &str, merge: bool) -> PyResult<usize> {
    let mode = if merge { ImportMode::Merge } else { ImportMode::Replace };
    with_book(db_path, namespace, |book| {
        let report = book.import_json(document, mode)?;
        Ok(report.added + report.updated)
    })
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "export_words")]
pub fn py_export_words(db_path: &str, namespace: &str) -> PyResult<String> {
    with_book(db_path, namespace, |book| book.export_json())
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "get_all_words")]
pub fn py_get_all_words(db_path: &str, namespace: &str) -> PyResult<Vec<WordCard>> {
    with_book(db_path, namespace, |book| Ok(cards(book.records().iter().enumerate())))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "add_word")]
pub fn py_add_word(db_path: &str, namespace: &str, word: &str) -> PyResult<Option<usize>> {
    with_book(db_path, namespace, |book| book.add_word(word))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "record_answer")]
pub fn py_record_answer(
    db_path: &str,
    namespace: &str,
    index: usize,
    is_correct: bool,
) -> PyResult<Option<WordCard>> {
    with_book(db_path, namespace, |book| {
        Ok(book
            .record_answer(index, is_correct)?
            .map(|record| WordCard::from_record(index, record)))
    })
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "record_typed_answer")]
pub fn py_record_typed_answer(
    db_path: &str,
    namespace: &str,
    index: usize,
    typed: &str,
) -> PyResult<Option<AnswerGrade>> {
    with_book(db_path, namespace, |book| book.record_typed_answer(index, typed))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "mark_word_for_review")]
pub fn py_mark_word_for_review(db_path: &str, namespace: &str, index: usize) -> PyResult<bool> {
    with_book(db_path, namespace, |book| book.mark_word_for_review(index))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "unmark_word_for_review")]
pub fn py_unmark_word_for_review(db_path: &str, namespace: &str, index: usize) -> PyResult<bool> {
    with_book(db_path, namespace, |book| book.unmark_word_for_review(index))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "mark_word_as_new")]
pub fn py_mark_word_as_new(db_path: &str, namespace: &str, index: usize) -> PyResult<bool> {
    with_book(db_path, namespace, |book| book.mark_word_as_new(index))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "unmark_word_as_new")]
pub fn py_unmark_word_as_new(db_path: &str, namespace: &str, index: usize) -> PyResult<bool> {
    with_book(db_path, namespace, |book| book.unmark_word_as_new(index))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "mark_word_as_studied")]
pub fn py_mark_word_as_studied(db_path: &str, namespace: &str, index: usize) -> PyResult<bool> {
    with_book(db_path, namespace, |book| book.mark_word_as_studied(index))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "get_words_for_review")]
pub fn py_get_words_for_review(db_path: &str, namespace: &str) -> PyResult<Vec<WordCard>> {
    with_book(db_path, namespace, |book| Ok(cards(book.words_for_review())))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "start_session")]
pub fn py_start_session(db_path: &str, namespace: &str) -> PyResult<Vec<WordCard>> {
    with_book(db_path, namespace, |book| {
        let order = book.start_session(&mut rand::thread_rng())?;
        Ok(order
            .into_iter()
            .filter_map(|index| book.get(index).map(|record| WordCard::from_record(index, record)))
            .collect())
    })
}
