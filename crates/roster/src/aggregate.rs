use std::cmp::Ordering;

use tracing::warn;

use crate::model::{Grade, GradeCell, Roster, Score, SourceRecord, StudentId};
use crate::warning::RunWarning;

/// Combine an existing observation with a new one for the same assignment.
///
/// - nothing recorded yet: take the incoming grade
/// - incoming `Marker`: always replaces what is there
/// - existing `Marker`, incoming `Points`: the numeric score replaces it
/// - both numeric: the higher score wins; on equal scores an annotated grade
///   beats an unannotated one, two annotations compare as text and the greater
///   wins, and a complete tie keeps the existing grade
///
/// The winning cell keeps its origin, so a kept grade still points at the row
/// that first reported it.
pub fn aggregate<'a>(existing: Option<&'a GradeCell>, incoming: &'a GradeCell) -> &'a GradeCell {
    match existing {
        Some(current) if !prefers_incoming(&current.grade, &incoming.grade) => current,
        _ => incoming,
    }
}

fn prefers_incoming(current: &Grade, incoming: &Grade) -> bool {
    match (&current.score, &incoming.score) {
        (_, Score::Marker(_)) => true,
        (Score::Marker(_), Score::Points(_)) => true,
        (Score::Points(old), Score::Points(new)) => match new.total_cmp(old) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => annotation_order(&current.annotation, &incoming.annotation) == Ordering::Greater,
        },
    }
}

/// Order of `incoming` relative to `current`; `None` ranks below any annotation.
fn annotation_order(current: &Option<String>, incoming: &Option<String>) -> Ordering {
    match (current, incoming) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(old), Some(new)) => new.cmp(old),
    }
}

/// Fold every grade in `record` into `student`'s entry, warning on each
/// assignment that already held a grade. Creates the entry if it is missing.
pub fn merge_grades(
    roster: &mut Roster,
    student: &StudentId,
    record: &SourceRecord,
    warnings: &mut Vec<RunWarning>,
) -> usize {
    let entry = roster.entries.entry(student.clone()).or_default();
    let mut duplicates = 0;

    for (assignment, grade) in &record.grades {
        let incoming = GradeCell { grade: grade.clone(), origin: record.origin.clone() };

        let merged = match entry.grades.get(assignment) {
            Some(existing) => {
                duplicates += 1;
                let warning = RunWarning::DuplicateGrade {
                    student: student.clone(),
                    assignment: assignment.clone(),
                    existing: existing.clone(),
                    incoming: incoming.clone(),
                };
                warn!("{warning}");
                warnings.push(warning);

                aggregate(Some(existing), &incoming).clone()
            }
            None => incoming,
        };
        entry.grades.insert(assignment.clone(), merged);
    }

    duplicates
}
