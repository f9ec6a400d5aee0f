//! Daily study plan composition
//!
//! A plan blends four pools so no category starves: new words, words due
//! for review, familiar words ready for a refresher and difficult words.
//! Each pool gets a share of the daily target; whatever is left over is
//! filled with unstudied words. The final list is shuffled so encounter
//! order gives no hint about a word's difficulty.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::ops::RangeInclusive;

use crate::config::PlanQuotas;
use crate::word::{Bucket, WordRecord};

/// Stages at which a normal word counts as familiar
const FAMILIAR_STAGES: RangeInclusive<u8> = 4..=6;

/// Pool a plan entry was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    New,
    Review,
    Familiar,
    Difficult,
    /// Unstudied words topping the plan up to its target
    Remainder,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanEntry<'a> {
    /// Position of the word in its store
    pub index: usize,
    pub record: &'a WordRecord,
    pub pool: Pool,
}

/// One session's study list; borrows the records it lists
#[derive(Debug, Clone, Default)]
pub struct DailyPlan<'a> {
    entries: Vec<PlanEntry<'a>>,
}

impl<'a> DailyPlan<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlanEntry<'a>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry<'a>> {
        self.entries.iter()
    }

    /// Store positions in study order
    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.index).collect()
    }

    pub fn count(&self, pool: Pool) -> usize {
        self.entries.iter().filter(|e| e.pool == pool).count()
    }
}

fn quota(target: usize, percent: u32) -> usize {
    target.saturating_mul(percent as usize) / 100
}

fn is_familiar(record: &WordRecord, now: DateTime<Utc>) -> bool {
    record.bucket == Bucket::Normal
        && FAMILIAR_STAGES.contains(&record.learning_stage)
        && record.next_review.map_or(true, |at| at <= now)
}

/// Compose a plan of at most `target` entries.
///
/// Pools keep store order and are not de-duplicated against each other: a
/// difficult word that is also due can appear twice. The top-up only takes
/// words not selected yet.
pub fn generate_daily_plan<'a, R: Rng + ?Sized>(
    records: &'a [WordRecord],
    now: DateTime<Utc>,
    target: usize,
    quotas: &PlanQuotas,
    rng: &mut R,
) -> DailyPlan<'a> {
    let mut new = Vec::new();
    let mut review = Vec::new();
    let mut familiar = Vec::new();
    let mut difficult = Vec::new();

    for (index, record) in records.iter().enumerate() {
        if record.bucket == Bucket::New && !record.studied {
            new.push(index);
        }
        if record.is_due(now) {
            review.push(index);
        }
        if is_familiar(record, now) {
            familiar.push(index);
        }
        if record.bucket == Bucket::Difficult {
            difficult.push(index);
        }
    }

    let pools = [
        (Pool::New, new, quotas.new),
        (Pool::Review, review, quotas.review),
        (Pool::Familiar, familiar, quotas.familiar),
        (Pool::Difficult, difficult, quotas.difficult),
    ];

    let mut entries = Vec::new();
    for (pool, members, percent) in pools {
        let take = quota(target, percent).min(members.len());
        entries.extend(members[..take].iter().map(|&index| PlanEntry {
            index,
            record: &records[index],
            pool,
        }));
    }

    let remaining = target.saturating_sub(entries.len());
    if remaining > 0 {
        let selected: HashSet<usize> = entries.iter().map(|e| e.index).collect();
        let top_up: Vec<_> = records
            .iter()
            .enumerate()
            .filter(|(index, record)| !record.studied && !selected.contains(index))
            .take(remaining)
            .map(|(index, record)| PlanEntry {
                index,
                record,
                pool: Pool::Remainder,
            })
            .collect();
        entries.extend(top_up);
    }

    entries.shuffle(rng);

    let plan = DailyPlan { entries };
    log::debug!(
        "Daily plan: {} words ({} new, {} review, {} familiar, {} difficult, {} top-up) of target {}",
        plan.len(),
        plan.count(Pool::New),
        plan.count(Pool::Review),
        plan.count(Pool::Familiar),
        plan.count(Pool::Difficult),
        plan.count(Pool::Remainder),
        target
    );
    plan
}

// ============= Python Binding =============

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "generate_daily_plan")]
pub fn py_generate_daily_plan(
    db_path: &str,
    namespace: &str,
    target_count: Option<usize>,
) -> PyResult<Vec<crate::word::WordCard>> {
    crate::book::with_book(db_path, namespace, |book| {
        let target = target_count.unwrap_or(book.config().daily_target);
        let plan = book.daily_plan_with_target(target, &mut rand::thread_rng());
        Ok(plan
            .iter()
            .map(|e| crate::word::WordCard::from_record(e.index, e.record))
            .collect())
    })
}
