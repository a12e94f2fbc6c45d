use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::merge::MergeConflict;
use crate::model::{GradeCell, RecordOrigin, StudentId};

/// A recoverable problem met while reading sources or during a run. Never
/// aborts extraction or the driver loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// The record's attributes disagreed with the roster; its grades were still merged.
    MergeRejected {
        origin: RecordOrigin,
        student: StudentId,
        conflict: MergeConflict,
    },
    /// A second observation arrived for an assignment that already had a grade.
    DuplicateGrade {
        student: StudentId,
        assignment: String,
        existing: GradeCell,
        incoming: GradeCell,
    },
    /// No identifying value of the record was ever linked to a student.
    Unidentified {
        origin: RecordOrigin,
        attributes: BTreeMap<String, String>,
    },
    /// An attribute cell failed its filters; the attribute was left off the record.
    InvalidValue {
        origin: RecordOrigin,
        column: String,
        attribute: String,
        value: String,
        reason: String,
    },
    /// A score cell failed its filters; the grade was left off the record.
    UnreadableScore {
        origin: RecordOrigin,
        assignment: String,
        value: String,
        reason: String,
    },
    /// A submission time could not be parsed; the grade was kept as scored.
    UnreadableTimestamp {
        origin: RecordOrigin,
        assignment: String,
        value: String,
    },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MergeRejected { origin, student, conflict } => {
                write!(f, "{origin}: {conflict} (student {student}); grades merged anyway")
            }
            Self::DuplicateGrade { student, assignment, existing, incoming } => write!(
                f,
                "duplicate grade for {student} on '{assignment}': {} from {} vs {} from {}",
                existing.grade, existing.origin, incoming.grade, incoming.origin,
            ),
            Self::Unidentified { origin, attributes } => {
                write!(f, "{origin}: could not identify student (")?;
                for (i, (name, value)) in attributes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str(")")
            }
            Self::InvalidValue { origin, column, attribute, reason, .. } => {
                write!(f, "{origin}: ignoring {attribute} from column '{column}': {reason}")
            }
            Self::UnreadableScore { origin, assignment, reason, .. } => {
                write!(f, "{origin}: no grade for '{assignment}': {reason}")
            }
            Self::UnreadableTimestamp { origin, assignment, value } => write!(
                f,
                "{origin}: cannot read submission time '{value}' for '{assignment}'; grade kept"
            ),
        }
    }
}
