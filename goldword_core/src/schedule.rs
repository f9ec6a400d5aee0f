//! Spaced-repetition scheduling
//!
//! Words climb a fixed ladder of nine stages. Each stage maps to a review
//! interval; short intervals consolidate short-term memory, the long tail
//! tests retention. A correct answer climbs one rung, a wrong one drops one.
//!
//! | Stage | Interval |
//! |-------|----------|
//! | 0     | 30s      |
//! | 1     | 3m       |
//! | 2     | 10m      |
//! | 3     | 1h       |
//! | 4     | 1d       |
//! | 5     | 3d       |
//! | 6     | 7d       |
//! | 7     | 15d      |
//! | 8     | 30d      |

use chrono::{DateTime, Duration, Utc};

use crate::word::{Bucket, ReviewEntry, WordRecord};

/// Highest stage on the ladder
pub const MAX_STAGE: u8 = 8;

/// Review interval per stage, in seconds
pub const STAGE_INTERVALS: [i64; MAX_STAGE as usize + 1] =
    [30, 180, 600, 3_600, 86_400, 259_200, 604_800, 1_296_000, 2_592_000];

/// Consecutive correct answers needed to leave the new/difficult buckets
pub const GRADUATION_STREAK: u32 = 3;

/// Stage needed to leave the new/difficult buckets
pub const GRADUATION_STAGE: u8 = 4;

/// Wrong answers (without a correct one in between) that make a word difficult
pub const DIFFICULT_ERRORS: u32 = 2;

/// Wrong answers that knock one level off the proficiency score
const PROFICIENCY_PENALTY_ERRORS: u32 = 3;

pub const MAX_PROFICIENCY: u8 = 5;

/// Interval for a stage; stages past the ladder use the last rung
pub fn interval_for(stage: u8) -> Duration {
    Duration::seconds(STAGE_INTERVALS[stage.min(MAX_STAGE) as usize])
}

/// Climb one stage and reschedule.
///
/// Graduates a new or difficult word to `normal` once it holds a streak of
/// at least three and has reached stage 4.
pub fn advance(record: &mut WordRecord, now: DateTime<Utc>) {
    record.learning_stage = record.learning_stage.saturating_add(1).min(MAX_STAGE);
    record.next_review = Some(now + interval_for(record.learning_stage));

    if record.correct_streak >= GRADUATION_STREAK
        && record.learning_stage >= GRADUATION_STAGE
        && matches!(record.bucket, Bucket::New | Bucket::Difficult)
    {
        log::debug!("'{}' graduated to the normal bucket", record.word);
        record.bucket = Bucket::Normal;
    }
}

/// Drop one stage and reschedule. Leaves the bucket alone.
pub fn regress(record: &mut WordRecord, now: DateTime<Utc>) {
    record.learning_stage = record.learning_stage.saturating_sub(1).min(MAX_STAGE);
    record.next_review = Some(now + interval_for(record.learning_stage));
}

/// Display score 1-5, recomputed from scratch so it follows regressions
pub fn proficiency_level(correct_streak: u32, stage: u8, errors: u32) -> u8 {
    let level = match (correct_streak, stage) {
        (s, st) if s >= 10 && st >= 6 => 5,
        (s, st) if s >= 7 && st >= 5 => 4,
        (s, st) if s >= 5 && st >= 4 => 3,
        (s, st) if s >= 3 && st >= 2 => 2,
        _ => 1,
    };

    if errors >= PROFICIENCY_PENALTY_ERRORS {
        (level - 1).max(1)
    } else {
        level
    }
}

/// Apply one answer to a record: log it, update the streak and error
/// counters, move the stage, classify the bucket and rescore proficiency.
///
/// Persisting the change is the caller's job.
pub fn apply_answer(record: &mut WordRecord, is_correct: bool, now: DateTime<Utc>) {
    record.review_history.push(ReviewEntry {
        timestamp: now,
        correct: is_correct,
        stage: record.learning_stage,
    });
    record.last_reviewed = Some(now);

    if is_correct {
        record.correct_streak = record.correct_streak.saturating_add(1);
        record.errors = 0;
        advance(record, now);
    } else {
        record.errors = record.errors.saturating_add(1);
        record.correct_streak = 0;
        regress(record, now);
        if record.errors >= DIFFICULT_ERRORS {
            record.bucket = Bucket::Difficult;
        }
    }

    record.proficiency_level =
        proficiency_level(record.correct_streak, record.learning_stage, record.errors);

    log::debug!(
        "'{}' answered {}: stage {}, next review in {}",
        record.word,
        if is_correct { "correctly" } else { "incorrectly" },
        record.learning_stage,
        format_interval(record.learning_stage)
    );
}

/// Short label for a stage's interval ("30s", "3m", "1h", "15d")
pub fn format_interval(stage: u8) -> String {
    let seconds = interval_for(stage).num_seconds();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3_600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h", seconds / 3_600)
    } else {
        format!("{}d", seconds / 86_400)
    }
}
