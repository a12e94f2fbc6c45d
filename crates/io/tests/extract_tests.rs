//! Extraction from on-disk fixtures, then resolution through the engine.

use std::path::PathBuf;

use rollbook_io::{extract_all, CourseConfig};
use rollbook_roster::{run, Grade, InfoValue, RecordOrigin, RunOptions, RunWarning, StudentId};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn course() -> CourseConfig {
    let text = std::fs::read_to_string(fixtures().join("course.toml")).unwrap();
    CourseConfig::from_toml(&text).unwrap()
}

#[test]
fn roster_preamble_and_attendance_are_extracted() {
    let extraction = extract_all(&course(), &fixtures()).unwrap();

    // Two attendance rows then two roster rows, in configuration order.
    assert_eq!(extraction.records.len(), 4);
    assert_eq!(extraction.records[0].origin, RecordOrigin::new("attendance.csv", 1));
    assert_eq!(extraction.records[0].attributes["Clicker ID"], "C9C9C9C9");
    assert_eq!(extraction.records[0].grades["attendance 1"], Grade::points(1.0));

    // "#short" fails 8char: no attribute, but completion credit still recorded.
    assert!(extraction.records[1].attributes.is_empty());
    assert!(matches!(
        extraction.warnings[0],
        RunWarning::InvalidValue { ref value, ref column, .. } if value == "#short" && column == "Remote"
    ));

    let ada = &extraction.records[2];
    assert_eq!(ada.origin, RecordOrigin::new("roster.csv", 1));
    assert_eq!(ada.attributes["Student ID"], "A12345678");
    assert_eq!(ada.attributes["Roster Name"], "Lovelace, Ada");

    // Blank clicker cell is simply not observed.
    let grace = &extraction.records[3];
    assert!(!grace.attributes.contains_key("Clicker ID"));
    assert_eq!(extraction.warnings.len(), 1);
}

#[test]
fn attendance_before_roster_resolves_on_second_pass() {
    let config = course();
    let extraction = extract_all(&config, &fixtures()).unwrap();
    let result = run(&config.schema().unwrap(), extraction.records, &RunOptions::default()).unwrap();

    // Pass 1 links the clicker, pass 2 resolves the attendance row, pass 3
    // finds nothing left it can resolve.
    assert_eq!(result.summary.passes, 3);
    assert_eq!(result.roster.len(), 2);

    let ada = result.roster.get(&StudentId::from("A12345678")).unwrap();
    assert_eq!(ada.grades["attendance 1"].grade, Grade::points(1.0));
    assert_eq!(ada.grades["attendance 1"].origin, RecordOrigin::new("attendance.csv", 1));
    assert_eq!(ada.info["Roster Name"], InfoValue::One("Lovelace, Ada".into()));

    // The "#short" row has no identifying value at all.
    assert_eq!(result.unresolved.len(), 1);
    assert_eq!(result.unresolved[0].origin, RecordOrigin::new("attendance.csv", 2));
}

#[test]
fn missing_source_file_is_read_error() {
    let mut config = course();
    config.sources[0].file = "nowhere.csv".into();
    let err = extract_all(&config, &fixtures()).unwrap_err();
    assert!(err.to_string().contains("nowhere.csv"));
}
