//! Word records - the unit the study store schedules
//!
//! Documents come from many places (older app versions, spreadsheet
//! imports, hand-edited JSON), so every scheduling field deserializes
//! leniently: missing or malformed values fall back to the fresh-word
//! defaults instead of rejecting the whole document.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Difficulty bucket, governs which daily-plan pool a word lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    New,
    Normal,
    Difficult,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::New => "new",
            Bucket::Normal => "normal",
            Bucket::Difficult => "difficult",
        }
    }

    fn from_loose(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "normal" => Bucket::Normal,
            "difficult" => Bucket::Difficult,
            _ => Bucket::New,
        }
    }
}

/// One answered card in a word's review log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub timestamp: DateTime<Utc>,
    pub correct: bool,
    /// Stage the word was at when the answer was given
    pub stage: u8,
}

/// English text with its Chinese gloss (collocations, example sentences)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gloss {
    pub en: String,
    #[serde(default)]
    pub zh: String,
}

impl Gloss {
    pub fn new(en: impl Into<String>, zh: impl Into<String>) -> Self {
        Self { en: en.into(), zh: zh.into() }
    }
}

/// Card content filled in by the enhancement pipeline.
///
/// Scheduling never branches on these fields; only the strict-coverage
/// statistic reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordContent {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub phonetic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub brief: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub chinese: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub association: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::collocations")]
    pub collocations: Vec<Gloss>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::examples")]
    pub examples: Vec<Gloss>,
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl WordContent {
    /// Phonetic, part of speech, definition, collocations and a brief summary all present
    pub fn is_fully_enhanced(&self) -> bool {
        let has_definition = filled(&self.definition);
        // a definition doubles as the brief summary
        let has_brief = filled(&self.brief) || has_definition;
        filled(&self.phonetic)
            && filled(&self.part_of_speech)
            && has_definition
            && !self.collocations.is_empty()
            && has_brief
    }

    /// Take every field `other` fills in, keep the rest
    pub fn merge_from(&mut self, other: WordContent) {
        fn take(slot: &mut Option<String>, incoming: Option<String>) {
            if filled(&incoming) {
                *slot = incoming;
            }
        }

        take(&mut self.phonetic, other.phonetic);
        take(&mut self.part_of_speech, other.part_of_speech);
        take(&mut self.definition, other.definition);
        take(&mut self.brief, other.brief);
        take(&mut self.chinese, other.chinese);
        take(&mut self.mnemonic, other.mnemonic);
        take(&mut self.association, other.association);
        if !other.collocations.is_empty() {
            self.collocations = other.collocations;
        }
        if !other.examples.is_empty() {
            self.examples = other.examples;
        }
    }
}

fn default_proficiency() -> u8 {
    1
}

/// A vocabulary word together with its spaced-repetition state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    #[serde(default, deserialize_with = "lenient::word")]
    pub word: String,
    #[serde(default, deserialize_with = "lenient::bucket")]
    pub bucket: Bucket,
    #[serde(default, deserialize_with = "lenient::stage")]
    pub learning_stage: u8,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub correct_streak: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub errors: u32,
    #[serde(default = "default_proficiency", deserialize_with = "lenient::proficiency")]
    pub proficiency_level: u8,
    #[serde(default, deserialize_with = "lenient::history")]
    pub review_history: Vec<ReviewEntry>,

    // Legacy study flags
    #[serde(default, deserialize_with = "lenient::flag")]
    pub studied: bool,
    #[serde(default, deserialize_with = "lenient::date")]
    pub studied_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub studied_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub needs_review: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_new_word: bool,

    #[serde(flatten)]
    pub content: WordContent,
    /// Fields this crate does not model, kept so exports lose nothing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WordRecord {
    /// A freshly added word: bucket `new`, stage 0, all counters zero
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            bucket: Bucket::New,
            learning_stage: 0,
            next_review: None,
            last_reviewed: None,
            correct_streak: 0,
            errors: 0,
            proficiency_level: default_proficiency(),
            review_history: Vec::new(),
            studied: false,
            studied_date: None,
            studied_timestamp: None,
            needs_review: false,
            is_new_word: false,
            content: WordContent::default(),
            extra: Map::new(),
        }
    }

    pub fn with_content(word: impl Into<String>, content: WordContent) -> Self {
        Self { content, ..Self::new(word) }
    }

    /// Due when the scheduled time has passed; records that predate
    /// scheduling fall back to the manual review flag.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_review {
            Some(at) => at <= now,
            None => self.needs_review,
        }
    }

    /// Strict coverage. A step the enhancement pipeline logged as done under
    /// `aiStatus.generationSteps` counts even when its field is missing.
    pub fn is_fully_enhanced(&self) -> bool {
        let step = |name: &str| {
            self.extra
                .get("aiStatus")
                .and_then(|status| status.get("generationSteps"))
                .and_then(|steps| steps.get(name))
                .is_some_and(lenient::as_flag)
        };
        let content = &self.content;

        (step("phonetic") || filled(&content.phonetic))
            && (step("partOfSpeech") || filled(&content.part_of_speech))
            && (step("definition") || filled(&content.definition))
            && (step("collocations") || !content.collocations.is_empty())
            && (step("brief") || filled(&content.brief) || filled(&content.definition))
    }

    /// Move legacy content layouts into the standard fields
    pub(crate) fn lift_legacy_content(&mut self) {
        let ai = self.extra.get("aiEnhanced");

        if self.content.collocations.is_empty() {
            let source = ai
                .and_then(|ai| ai.get("collocations"))
                .filter(|v| v.is_array())
                .or_else(|| self.extra.get("collocation"));
            if let Some(source) = source {
                self.content.collocations = lenient::glosses(source, lenient::GlossStyle::Collocation);
            }
        }

        if self.content.examples.is_empty() {
            if let Some(source) = self.extra.get("example") {
                self.content.examples = lenient::glosses(source, lenient::GlossStyle::Example);
            }
        }

        if !filled(&self.content.definition) {
            if let Some(definition) = ai
                .and_then(|ai| ai.get("definition"))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
            {
                self.content.definition = Some(definition.to_string());
            }
        }
    }
}

/// Deserializers that never fail on a wrongly-typed value
mod lenient {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Bucket, Gloss, ReviewEntry};
    use crate::schedule::{MAX_PROFICIENCY, MAX_STAGE};

    fn value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn as_count(value: &Value) -> u32 {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub(super) fn as_flag(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            _ => false,
        }
    }

    pub(super) fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            // epoch milliseconds, as written by `Date.now()`
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }

    pub fn word<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(as_text(&value(d)?).map(|s| s.trim().to_string()).unwrap_or_default())
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(as_text(&value(d)?))
    }

    pub fn bucket<'de, D: Deserializer<'de>>(d: D) -> Result<Bucket, D::Error> {
        Ok(match value(d)? {
            Value::String(s) => Bucket::from_loose(&s),
            _ => Bucket::New,
        })
    }

    pub fn stage<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        Ok(as_count(&value(d)?).min(MAX_STAGE as u32) as u8)
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(as_count(&value(d)?))
    }

    pub fn proficiency<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        let level = as_count(&value(d)?).min(MAX_PROFICIENCY as u32) as u8;
        Ok(level.max(1))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(as_flag(&value(d)?))
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(as_timestamp(&value(d)?))
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(match value(d)? {
            Value::String(s) => {
                let s = s.trim();
                // tolerate full ISO timestamps where a date was expected
                NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()
            }
            _ => None,
        })
    }

    pub fn history<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ReviewEntry>, D::Error> {
        let Value::Array(items) = value(d)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter_map(|item| {
                let timestamp = as_timestamp(item.get("timestamp")?)?;
                Some(ReviewEntry {
                    timestamp,
                    correct: item.get("correct").is_some_and(as_flag),
                    stage: item
                        .get("stage")
                        .map(|s| as_count(s).min(MAX_STAGE as u32) as u8)
                        .unwrap_or(0),
                })
            })
            .collect())
    }

    #[derive(Debug, Clone, Copy)]
    pub enum GlossStyle {
        Collocation,
        Example,
    }

    impl GlossStyle {
        fn separators(self) -> &'static [&'static str] {
            match self {
                GlossStyle::Collocation => &["：", ":", "+"],
                GlossStyle::Example => &["——", "—", " - ", ":", "："],
            }
        }
    }

    fn gloss_from_line(line: &str, style: GlossStyle) -> Option<Gloss> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (en, zh) = style
            .separators()
            .iter()
            .find_map(|sep| line.split_once(sep))
            .unwrap_or((line, ""));
        Some(Gloss::new(en.trim(), zh.trim()))
    }

    fn pick(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    pub fn glosses(value: &Value, style: GlossStyle) -> Vec<Gloss> {
        match value {
            Value::String(s) => s
                .split(['\n', ';', '；', '，'])
                .filter_map(|line| gloss_from_line(line, style))
                .collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => gloss_from_line(s, style),
                    Value::Object(obj) => {
                        let en = pick(obj, &["en", "english", "phrase", "sentence"]);
                        let zh = pick(obj, &["zh", "chinese", "cn", "meaning", "translation"]);
                        (!en.is_empty() || !zh.is_empty()).then(|| Gloss::new(en, zh))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn collocations<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Gloss>, D::Error> {
        Ok(glosses(&value(d)?, GlossStyle::Collocation))
    }

    pub fn examples<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Gloss>, D::Error> {
        Ok(glosses(&value(d)?, GlossStyle::Example))
    }
}

// ============= Python Bindings =============

/// Flat view of a word record handed to the Python UI
#[cfg(feature = "python")]
#[pyclass]
#[derive(Debug, Clone)]
pub struct WordCard {
    #[pyo3(get)]
    pub index: usize,
    #[pyo3(get)]
    pub word: String,
    #[pyo3(get)]
    pub bucket: String,
    #[pyo3(get)]
    pub learning_stage: u8,
    #[pyo3(get)]
    pub next_review: Option<String>,
    #[pyo3(get)]
    pub last_reviewed: Option<String>,
    #[pyo3(get)]
    pub correct_streak: u32,
    #[pyo3(get)]
    pub errors: u32,
    #[pyo3(get)]
    pub proficiency_level: u8,
    #[pyo3(get)]
    pub studied: bool,
    #[pyo3(get)]
    pub needs_review: bool,
    #[pyo3(get)]
    pub is_new_word: bool,
    #[pyo3(get)]
    pub phonetic: Option<String>,
    #[pyo3(get)]
    pub part_of_speech: Option<String>,
    #[pyo3(get)]
    pub definition: Option<String>,
    #[pyo3(get)]
    pub chinese: Option<String>,
}

#[cfg(feature = "python")]
#[pymethods]
impl WordCard {
    fn __repr__(&self) -> String {
        format!(
            "WordCard(index={}, word='{}', bucket='{}', stage={})",
            self.index, self.word, self.bucket, self.learning_stage
        )
    }
}

#[cfg(feature = "python")]
impl WordCard {
    pub fn from_record(index: usize, record: &WordRecord) -> Self {
        Self {
            index,
            word: record.word.clone(),
            bucket: record.bucket.as_str().to_string(),
            learning_stage: record.learning_stage,
            next_review: record.next_review.map(|t| t.to_rfc3339()),
            last_reviewed: record.last_reviewed.map(|t| t.to_rfc3339()),
            correct_streak: record.correct_streak,
            errors: record.errors,
            proficiency_level: record.proficiency_level,
            studied: record.studied,
            needs_review: record.needs_review,
            is_new_word: record.is_new_word,
            phonetic: record.content.phonetic.clone(),
            part_of_speech: record.content.part_of_speech.clone(),
            definition: record.content.definition.clone(),
            chinese: record.content.chinese.clone(),
        }
    }
}
