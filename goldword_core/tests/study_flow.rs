use chrono::{DateTime, Duration, TimeZone, Utc};
use goldword_core::{
    Bucket, ImportMode, ManualClock, Pool, RecordRepository, SqliteRepository, StudyConfig,
    StudyStats, WordBook, MAX_STAGE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::path::Path;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 7, 30, 0).unwrap()
}

fn open_book(path: &Path, namespace: &str, clock: &ManualClock) -> WordBook<SqliteRepository, ManualClock> {
    let repo = SqliteRepository::open(path).unwrap();
    WordBook::open(repo, namespace, clock.clone()).unwrap()
}

#[test]
fn test_correct_answer_graduates_word() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(start());
    let mut book = open_book(&dir.path().join("words.db"), "alice", &clock);

    book.import_json(
        r#"[{"word": "remote", "learningStage": 3, "correctStreak": 2, "bucket": "new"}]"#,
        ImportMode::Replace,
    )
    .unwrap();

    let record = book.record_answer(0, true).unwrap().unwrap();
    assert_eq!(record.learning_stage, 4);
    assert_eq!(record.correct_streak, 3);
    assert_eq!(record.bucket, Bucket::Normal);
    assert_eq!(record.next_review, Some(start() + Duration::days(1)));
}

#[test]
fn test_second_error_makes_word_difficult() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(start());
    let mut book = open_book(&dir.path().join("words.db"), "alice", &clock);

    book.import_json(
        r#"[{"word": "abandon", "errors": 1, "correctStreak": 4, "learningStage": 6, "bucket": "normal"}]"#,
        ImportMode::Replace,
    )
    .unwrap();

    let record = book.record_answer_for("abandon", false).unwrap().unwrap();
    assert_eq!(record.errors, 2);
    assert_eq!(record.correct_streak, 0);
    assert_eq!(record.bucket, Bucket::Difficult);
    assert_eq!(record.learning_stage, 5);
}

#[test]
fn test_long_answer_sequence_keeps_stage_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(start());
    let mut book = open_book(&dir.path().join("words.db"), "alice", &clock);
    book.add_word("island").unwrap();

    let pattern = [true, true, false, true, true, true, true, true, true, true, true, true, false, false];
    for is_correct in pattern.iter().cycle().take(60) {
        clock.advance(Duration::hours(6));
        let record = book.record_answer(0, *is_correct).unwrap().unwrap();
        assert!(record.learning_stage <= MAX_STAGE);
        assert!((1..=5).contains(&record.proficiency_level));
    }
    assert_eq!(book.get(0).unwrap().review_history.len(), 60);
}

#[test]
fn test_daily_plan_quotas() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(start());
    let mut book = open_book(&dir.path().join("words.db"), "alice", &clock);

    let past = (start() - Duration::hours(1)).to_rfc3339();
    let future = (start() + Duration::days(3)).to_rfc3339();
    let mut words = Vec::new();
    for i in 0..5 {
        words.push(json!({"word": format!("new{i}")}));
    }
    for i in 0..100 {
        words.push(json!({"word": format!("due{i}"), "bucket": "normal", "learningStage": 1, "studied": true, "nextReview": past}));
    }
    for i in 0..3 {
        words.push(json!({"word": format!("familiar{i}"), "bucket": "normal", "learningStage": 5, "studied": true}));
    }
    for i in 0..2 {
        words.push(json!({"word": format!("hard{i}"), "bucket": "difficult", "learningStage": 2, "studied": true, "nextReview": future}));
    }
    for i in 0..30 {
        words.push(json!({"word": format!("spare{i}"), "bucket": "normal", "nextReview": future}));
    }
    book.import_json(&serde_json::to_string(&words).unwrap(), ImportMode::Replace)
        .unwrap();

    let plan = book.daily_plan(&mut StdRng::seed_from_u64(42));
    assert_eq!(plan.count(Pool::New), 5);
    assert_eq!(plan.count(Pool::Review), 20);
    assert_eq!(plan.count(Pool::Familiar), 3);
    assert_eq!(plan.count(Pool::Difficult), 2);
    assert_eq!(plan.count(Pool::Remainder), 20);
    assert_eq!(plan.len(), 50);

    let smaller = book.daily_plan_with_target(10, &mut StdRng::seed_from_u64(42));
    assert!(smaller.len() <= 10);
}

#[test]
fn test_export_import_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");
    let clock = ManualClock::new(start());
    let mut book = open_book(&path, "alice", &clock);

    for word in ["remote", "abandon", "island"] {
        book.add_word(word).unwrap();
    }
    book.record_answer(0, true).unwrap();
    book.record_answer(1, false).unwrap();
    book.record_answer(1, false).unwrap();
    clock.advance(Duration::minutes(90));
    book.record_answer(0, true).unwrap();

    let exported = book.export_json().unwrap();
    let mut copy = open_book(&path, "bob", &clock);
    copy.import_json(&exported, ImportMode::Replace).unwrap();

    assert_eq!(copy.len(), book.len());
    for (original, imported) in book.records().iter().zip(copy.records()) {
        assert_eq!(imported.word, original.word);
        assert_eq!(imported.bucket, original.bucket);
        assert_eq!(imported.learning_stage, original.learning_stage);
        assert_eq!(imported.next_review, original.next_review);
        assert_eq!(imported.errors, original.errors);
        assert_eq!(imported.correct_streak, original.correct_streak);
    }
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");
    let clock = ManualClock::new(start());

    {
        let mut book = open_book(&path, "alice", &clock);
        book.add_word("remote").unwrap();
        book.answer_known(0).unwrap();
        book.set_config(StudyConfig { daily_target: 20, ..Default::default() })
            .unwrap();
    }

    let book = open_book(&path, "alice", &clock);
    let record = book.find("remote").unwrap();
    assert!(record.studied);
    assert_eq!(record.learning_stage, 1);
    assert_eq!(book.config().daily_target, 20);

    let stats = book.stats();
    assert_eq!(stats.total_words, 1);
    assert_eq!(stats.studied_today, 1);
    assert_eq!(stats.studied_24_hours, 1);
    assert_eq!(stats.progress, 100);

    let namespaces = book.repository().list_namespaces().unwrap();
    assert_eq!(namespaces.len(), 1);
    assert_eq!(namespaces[0].word_count, 1);
}

#[test]
fn test_corrupt_document_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");

    let mut repo = SqliteRepository::open(&path).unwrap();
    repo.save("alice", "[{\"word\": \"remote\",").unwrap();

    let clock = ManualClock::new(start());
    let mut book = open_book(&path, "alice", &clock);
    assert!(book.is_empty());
    assert_eq!(book.stats(), StudyStats::default());

    // the namespace is usable again after the next write
    book.add_word("remote").unwrap();
    let reopened = open_book(&path, "alice", &clock);
    assert_eq!(reopened.len(), 1);
}

#[test]
fn test_empty_namespace_session_seeds_example() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");
    let clock = ManualClock::new(start());
    let mut book = open_book(&path, "guest", &clock);

    assert_eq!(book.stats(), StudyStats::default());
    let order = book.start_session(&mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(order, vec![0]);

    let reopened = open_book(&path, "guest", &clock);
    assert_eq!(reopened.get(0).map(|r| r.word.as_str()), Some("Remote"));
}

#[test]
fn test_clear_removes_only_one_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");
    let clock = ManualClock::new(start());

    let mut alice = open_book(&path, "alice", &clock);
    alice.add_word("remote").unwrap();
    let mut bob = open_book(&path, "bob", &clock);
    bob.add_word("island").unwrap();

    alice.clear().unwrap();

    assert!(open_book(&path, "alice", &clock).is_empty());
    assert_eq!(open_book(&path, "bob", &clock).len(), 1);
}

#[test]
fn test_two_books_on_one_namespace_keep_every_answer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.db");
    let clock = ManualClock::new(start());

    let mut setup = open_book(&path, "alice", &clock);
    setup.add_word("remote").unwrap();
    setup.add_word("island").unwrap();

    let mut phone = open_book(&path, "alice", &clock);
    let mut laptop = open_book(&path, "alice", &clock);

    phone.record_answer(0, true).unwrap();
    laptop.record_answer(1, true).unwrap();
    laptop.add_word("abandon").unwrap();
    phone.add_word("village").unwrap();

    let reopened = open_book(&path, "alice", &clock);
    assert_eq!(reopened.find("remote").unwrap().review_history.len(), 1);
    assert_eq!(reopened.find("island").unwrap().review_history.len(), 1);
    assert!(reopened.find("abandon").is_some());
    assert_eq!(reopened.position("village"), Some(3));

    // each book caught up with the other while writing
    assert_eq!(phone.len(), 4);
    assert_eq!(phone.find("island").unwrap().correct_streak, 1);
}
