//! Turn configured sources into cleaned [`SourceRecord`]s.

use std::path::Path;

use chrono::NaiveDateTime;
use rollbook_roster::{AttributeSchema, Grade, RecordOrigin, RunWarning, SourceRecord};
use tracing::{debug, warn};

use crate::clean::{check_and_clean, parse_filters, Filter};
use crate::config::{AssignmentConfig, CourseConfig, SourceConfig};
use crate::due::{late_note, parse_timestamp, parse_turn_in};
use crate::error::IoError;
use crate::rows::{read_rows, Row, Rows};

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<SourceRecord>,
    pub warnings: Vec<RunWarning>,
}

impl Extraction {
    fn extend(&mut self, other: Extraction) {
        self.records.extend(other.records);
        self.warnings.extend(other.warnings);
    }
}

/// Column -> attribute mapping with the attribute's filters resolved.
struct AttributeColumn<'a> {
    column: &'a str,
    attribute: &'a str,
    filters: Vec<Filter>,
}

struct AssignmentColumns<'a> {
    config: &'a AssignmentConfig,
    filters: Vec<Filter>,
    due: Option<NaiveDateTime>,
}

/// Read one source and clean every row into a record.
pub fn extract_source(
    source: &SourceConfig,
    config: &CourseConfig,
    schema: &AttributeSchema,
    base_dir: &Path,
) -> Result<Extraction, IoError> {
    let path = base_dir.join(&source.file);
    let rows = read_rows(&path, source.layout, source.sheet.as_deref())?;

    let mut attributes = Vec::with_capacity(source.attributes.len());
    for (column, attribute) in &source.attributes {
        if !schema.contains(attribute) {
            return Err(IoError::ConfigValidation(format!(
                "source '{}': attribute '{attribute}' is not in the schema",
                source.file
            )));
        }
        let filters = match config.attribute(attribute) {
            Some(a) => parse_filters(&a.filters)?,
            None => Vec::new(),
        };
        attributes.push(AttributeColumn { column, attribute, filters });
    }

    let mut assignments = Vec::with_capacity(source.assignments.len());
    for assignment in &source.assignments {
        let due = match assignment.due {
            Some(ref text) => Some(parse_timestamp(text).ok_or_else(|| IoError::BadDueDate {
                assignment: assignment.name.clone(),
                value: text.clone(),
            })?),
            None => None,
        };
        assignments.push(AssignmentColumns {
            config: assignment,
            filters: parse_filters(&assignment.filters)?,
            due,
        });
    }

    check_columns(&source.file, &rows, &attributes, &assignments)?;

    let mut extraction = Extraction::default();
    for row in &rows.rows {
        let record = extract_row(&source.file, row, &attributes, &assignments, &mut extraction.warnings);
        extraction.records.push(record);
    }

    debug!(
        source = %source.file,
        records = extraction.records.len(),
        warnings = extraction.warnings.len(),
        "source extracted"
    );
    Ok(extraction)
}

/// Every source in configuration order.
pub fn extract_all(config: &CourseConfig, base_dir: &Path) -> Result<Extraction, IoError> {
    let schema = config.schema()?;
    let mut all = Extraction::default();
    for source in &config.sources {
        all.extend(extract_source(source, config, &schema, base_dir)?);
    }
    Ok(all)
}

fn check_columns(
    source: &str,
    rows: &Rows,
    attributes: &[AttributeColumn<'_>],
    assignments: &[AssignmentColumns<'_>],
) -> Result<(), IoError> {
    let wanted = attributes.iter().map(|a| a.column).chain(assignments.iter().flat_map(|a| {
        a.config
            .score_column
            .as_deref()
            .into_iter()
            .chain(a.config.timestamp_column.as_deref().filter(|_| a.due.is_some()))
    }));

    for column in wanted {
        if !rows.headers.iter().any(|h| h == column) {
            return Err(IoError::MissingColumn {
                source_name: source.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn extract_row(
    source: &str,
    row: &Row,
    attributes: &[AttributeColumn<'_>],
    assignments: &[AssignmentColumns<'_>],
    warnings: &mut Vec<RunWarning>,
) -> SourceRecord {
    let origin = RecordOrigin::new(source, row.number);
    let mut record = SourceRecord::new(origin.clone());

    for mapping in attributes {
        let raw = row.get(mapping.column).unwrap_or_default();
        if raw.trim().is_empty() {
            continue;
        }
        match check_and_clean(raw, &mapping.filters) {
            Ok(value) if value.is_empty() => {}
            Ok(value) => {
                record.attributes.insert(mapping.attribute.to_string(), value);
            }
            Err(e) => push(
                warnings,
                RunWarning::InvalidValue {
                    origin: origin.clone(),
                    column: mapping.column.to_string(),
                    attribute: mapping.attribute.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                },
            ),
        }
    }

    for assignment in assignments {
        if let Some(grade) = grade_for(&origin, row, assignment, warnings) {
            record.grades.insert(assignment.config.name.clone(), grade);
        }
    }

    record
}

fn grade_for(
    origin: &RecordOrigin,
    row: &Row,
    assignment: &AssignmentColumns<'_>,
    warnings: &mut Vec<RunWarning>,
) -> Option<Grade> {
    let config = assignment.config;

    let grade = match config.score_column {
        None => Grade::points(config.max_points),
        Some(ref column) => {
            let raw = row.get(column).unwrap_or_default();
            match check_and_clean(raw, &assignment.filters) {
                Ok(text) if text.is_empty() => return None,
                Ok(text) => match text.parse::<f64>() {
                    Ok(n) if n.is_finite() => Grade::points(n),
                    _ => Grade::marker(text),
                },
                Err(e) => {
                    push(
                        warnings,
                        RunWarning::UnreadableScore {
                            origin: origin.clone(),
                            assignment: config.name.clone(),
                            value: raw.to_string(),
                            reason: e.to_string(),
                        },
                    );
                    return None;
                }
            }
        }
    };

    let (Some(due), Some(column)) = (assignment.due, config.timestamp_column.as_deref()) else {
        return Some(grade);
    };

    let raw = row.get(column).unwrap_or_default();
    match parse_turn_in(raw) {
        Some(received) if received > due => Some(Grade::points(0.0).annotated(late_note(received))),
        Some(_) => Some(grade),
        None => {
            push(
                warnings,
                RunWarning::UnreadableTimestamp {
                    origin: origin.clone(),
                    assignment: config.name.clone(),
                    value: raw.to_string(),
                },
            );
            Some(grade)
        }
    }
}

fn push(warnings: &mut Vec<RunWarning>, warning: RunWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_roster::Score;

    const COURSE: &str = r#"
name = "Test"

[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
filters = ["strip", "toUpper", "ucsdIDCheck"]

[[attributes]]
name = "Email"
identifies_student = true
filters = ["strip"]

[[sources]]
file = "quiz.csv"
[sources.attributes]
SID = "Student ID"
Mail = "Email"
[[sources.assignments]]
name = "quiz 1"
score_column = "Score"
max_points = 10
category = "quiz"
filters = ["strip", "stripDenominator"]
due = "2026-01-15 23:59:59"
timestamp_column = "Submitted"
[[sources.assignments]]
name = "showed up"
max_points = 1
"#;

    fn extract(csv: &str) -> Result<Extraction, IoError> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quiz.csv"), csv).unwrap();
        let config = CourseConfig::from_toml(COURSE).unwrap();
        extract_all(&config, dir.path())
    }

    #[test]
    fn scores_and_completion_credit() {
        let out = extract(
            "SID,Mail,Score,Submitted\n\
             a12345678,ada@x.edu,7.5 / 10,2026-01-15 10:00:00\n",
        )
        .unwrap();
        assert!(out.warnings.is_empty());
        let record = &out.records[0];
        assert_eq!(record.origin, RecordOrigin::new("quiz.csv", 1));
        assert_eq!(record.attributes["Student ID"], "A12345678");
        assert_eq!(record.attributes["Email"], "ada@x.edu");
        assert_eq!(record.grades["quiz 1"], Grade::points(7.5));
        assert_eq!(record.grades["showed up"], Grade::points(1.0));
    }

    #[test]
    fn late_submission_scores_zero() {
        let out = extract(
            "SID,Mail,Score,Submitted\n\
             A12345678,,9,1/16/2026 8:30:05\n",
        )
        .unwrap();
        let grade = &out.records[0].grades["quiz 1"];
        assert_eq!(grade.score, Score::Points(0.0));
        assert_eq!(grade.annotation.as_deref(), Some("late - received Jan 16, 08:30:05"));
        assert!(!out.records[0].attributes.contains_key("Email"));
    }

    #[test]
    fn marker_scores_are_kept_as_text() {
        let out = extract("SID,Mail,Score,Submitted\nA12345678,,EX,2026-01-01\n").unwrap();
        assert_eq!(out.records[0].grades["quiz 1"], Grade::marker("EX"));
    }

    #[test]
    fn bad_id_becomes_warning() {
        let out = extract("SID,Mail,Score,Submitted\nZ999,z@x.edu,4,2026-01-01\n").unwrap();
        assert_eq!(out.records.len(), 1);
        assert!(!out.records[0].attributes.contains_key("Student ID"));
        assert!(matches!(
            out.warnings[0],
            RunWarning::InvalidValue { ref attribute, ref value, .. }
                if attribute == "Student ID" && value == "Z999"
        ));
    }

    #[test]
    fn unreadable_timestamp_keeps_grade() {
        let out = extract("SID,Mail,Score,Submitted\nA12345678,,4,whenever\n").unwrap();
        assert_eq!(out.records[0].grades["quiz 1"], Grade::points(4.0));
        assert!(matches!(out.warnings[0], RunWarning::UnreadableTimestamp { .. }));
    }

    #[test]
    fn blank_score_is_not_a_grade() {
        let out = extract("SID,Mail,Score,Submitted\nA12345678,,,2026-01-01\n").unwrap();
        assert!(!out.records[0].grades.contains_key("quiz 1"));
        assert!(out.records[0].grades.contains_key("showed up"));
    }

    #[test]
    fn missing_column_is_fatal() {
        let err = extract("SID,Score,Submitted\nA12345678,4,2026-01-01\n").unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "Mail"));
    }
}
