mod common;

use chrono::NaiveDate;
use common::at;
use rollcall_core::{FixedClock, Ledger, LedgerError, MarkOutcome, ValidationError};
use std::fs;

fn ledger_in(dir: &tempfile::TempDir) -> Ledger<FixedClock> {
    Ledger::with_clock(
        dir.path().join("Attendance.csv"),
        FixedClock::new(at(2024, 1, 10, 9, 0, 0)),
    )
}

#[test]
fn fresh_ledger_views_as_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    ledger.initialize().unwrap();

    let view = ledger.view().unwrap();
    assert_eq!(
        view.header,
        Some(vec!["Name".to_string(), "Date".to_string(), "Time".to_string()])
    );
    assert!(view.records.is_empty());
    assert!(view.malformed.is_empty());
    assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "Name,Date,Time\n");
}

#[test]
fn missing_ledger_views_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    let view = ledger.view().unwrap();
    assert!(view.is_empty());
    assert!(!ledger.path().exists());
}

#[test]
fn initialize_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    ledger.initialize().unwrap();
    ledger.mark("Alice").unwrap();
    ledger.initialize().unwrap();

    assert_eq!(
        fs::read_to_string(ledger.path()).unwrap(),
        "Name,Date,Time\nAlice,2024-01-10,09:00:00\n"
    );
}

#[test]
fn initialize_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("records/2024/Attendance.csv"));
    ledger.initialize().unwrap();
    assert!(ledger.path().is_file());
}

#[test]
fn second_mark_same_day_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    ledger.initialize().unwrap();

    let first = ledger.mark("Alice").unwrap();
    assert!(first.is_marked());

    ledger.clock().set(at(2024, 1, 10, 17, 30, 0));
    let second = ledger.mark("Alice").unwrap();
    assert!(!second.is_marked());
    assert_eq!(
        second,
        MarkOutcome::AlreadyMarked {
            name: "Alice".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        }
    );

    let view = ledger.view().unwrap();
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].time_string(), "09:00:00");
    assert_eq!(
        fs::read_to_string(ledger.path()).unwrap(),
        "Name,Date,Time\nAlice,2024-01-10,09:00:00\n"
    );
}

#[test]
fn marks_on_different_days_are_both_kept() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    assert!(ledger.mark("Alice").unwrap().is_marked());
    ledger.clock().set(at(2024, 1, 11, 8, 45, 12));
    assert!(ledger.mark("Alice").unwrap().is_marked());

    let view = ledger.view().unwrap();
    let dates: Vec<_> = view.records.iter().map(|r| r.date_string()).collect();
    assert_eq!(dates, vec!["2024-01-10", "2024-01-11"]);
}

#[test]
fn different_people_same_day_are_both_kept() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    assert!(ledger.mark("Bob").unwrap().is_marked());
    assert!(ledger.mark("Cara").unwrap().is_marked());
    assert!(!ledger.mark("Bob").unwrap().is_marked());

    let names: Vec<_> = ledger
        .view()
        .unwrap()
        .records
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Bob", "Cara"]);
}

#[test]
fn mark_creates_missing_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    assert!(ledger.mark("Alice").unwrap().is_marked());
    let view = ledger.view().unwrap();
    assert!(view.header.is_some());
    assert_eq!(view.records.len(), 1);
}

#[test]
fn blank_name_is_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    ledger.initialize().unwrap();

    let err = ledger.mark("  ").unwrap_err();
    assert!(matches!(err, LedgerError::Invalid(ValidationError::EmptyName)));
    assert!(ledger.view().unwrap().records.is_empty());
}

#[test]
fn malformed_rows_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    fs::write(
        ledger.path(),
        "Name,Date,Time\nBob,2024-01-09,08:00:00\nBroken,2024-01-09\n\nCara,2024-01-09,08:05:00\n",
    )
    .unwrap();

    let view = ledger.view().unwrap();
    assert_eq!(view.records.len(), 2);
    assert_eq!(view.malformed.len(), 1);
    assert_eq!(view.malformed[0].line, 3);
    assert_eq!(view.malformed[0].fields, vec!["Broken", "2024-01-09"]);

    assert!(ledger.mark("Broken").unwrap().is_marked());
}

#[test]
fn quoted_rows_count_for_deduplication() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    fs::write(
        ledger.path(),
        "Name,Date,Time\n\"Alice\",\"2024-01-10\",\"08:00:00\"\n",
    )
    .unwrap();

    assert!(!ledger.mark("Alice").unwrap().is_marked());
}

#[test]
fn rows_with_a_trailing_comma_count_for_deduplication() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let before = "Name,Date,Time\nAlice,2024-01-10,08:00:00,\n";
    fs::write(ledger.path(), before).unwrap();

    assert!(!ledger.mark("Alice").unwrap().is_marked());
    assert_eq!(fs::read_to_string(ledger.path()).unwrap(), before);
    // Still reported as malformed when viewing.
    assert_eq!(ledger.view().unwrap().malformed.len(), 1);
}

#[test]
fn rows_with_an_unparsable_time_count_for_deduplication() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let before = "Name,Date,Time\nAlice,2024-01-10,8:00\n";
    fs::write(ledger.path(), before).unwrap();

    assert!(!ledger.mark("Alice").unwrap().is_marked());
    assert_eq!(fs::read_to_string(ledger.path()).unwrap(), before);
    assert!(ledger.mark("Bob").unwrap().is_marked());
}

#[test]
fn names_with_line_breaks_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    ledger.initialize().unwrap();

    for name in ["Ali\nce", "Ali\rce", "Ali\u{7}ce"] {
        let err = ledger.mark(name).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid(ValidationError::InvalidName(_))), "{name:?}");
    }
    assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "Name,Date,Time\n");
}

#[test]
fn names_with_commas_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    assert!(ledger.mark("Lee, Ann").unwrap().is_marked());
    assert!(!ledger.mark("Lee, Ann").unwrap().is_marked());

    let contents = fs::read_to_string(ledger.path()).unwrap();
    assert!(contents.ends_with("\"Lee, Ann\",2024-01-10,09:00:00\n"));
    assert_eq!(ledger.view().unwrap().records[0].name, "Lee, Ann");
}

#[test]
fn append_repairs_missing_trailing_newline() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    fs::write(ledger.path(), "Name,Date,Time\nBob,2024-01-09,08:00:00").unwrap();

    ledger.mark("Alice").unwrap();
    assert_eq!(
        fs::read_to_string(ledger.path()).unwrap(),
        "Name,Date,Time\nBob,2024-01-09,08:00:00\nAlice,2024-01-10,09:00:00\n"
    );
}

#[test]
fn outcome_messages() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    let marked = ledger.mark("Alice").unwrap();
    assert_eq!(marked.to_string(), "Marked attendance for Alice at 09:00:00");
    let again = ledger.mark("Alice").unwrap();
    assert_eq!(again.to_string(), "Alice is already marked for 2024-01-10");
    assert_eq!(again.name(), "Alice");
}
