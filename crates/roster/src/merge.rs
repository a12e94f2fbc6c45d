use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{InfoValue, Roster, SourceRecord, StudentId};
use crate::schema::AttributeSchema;

/// Why an attribute merge was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeConflict {
    #[error("refusing to overwrite singleton value for {attribute} from {existing} to {incoming}")]
    SingletonOverwrite { attribute: String, existing: String, incoming: String },

    #[error("refusing to reassign ({attribute}: {value}) from {owner} to {claimant}")]
    IdentifierReassign { attribute: String, value: String, owner: StudentId, claimant: StudentId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Rejected(MergeConflict),
}

/// Merge a record's attributes into `student`'s entry.
///
/// All attributes are checked before anything is written, so a rejected record
/// leaves both the entry and the identity index exactly as they were. Grades
/// are not touched here.
pub fn merge(
    schema: &AttributeSchema,
    roster: &mut Roster,
    student: &StudentId,
    record: &SourceRecord,
) -> MergeOutcome {
    if let Err(conflict) = check_merge(schema, roster, student, record) {
        return MergeOutcome::Rejected(conflict);
    }
    apply_merge(schema, roster, student, record);
    MergeOutcome::Applied
}

fn check_merge(
    schema: &AttributeSchema,
    roster: &Roster,
    student: &StudentId,
    record: &SourceRecord,
) -> Result<(), MergeConflict> {
    let existing = roster.entries.get(student);

    for (attribute, value) in merged_attributes(schema, record) {
        let Some(flags) = schema.flags(attribute) else {
            continue;
        };

        if flags.one_per_student {
            if let Some(InfoValue::One(current)) = existing.and_then(|e| e.info.get(attribute)) {
                if current != value {
                    return Err(MergeConflict::SingletonOverwrite {
                        attribute: attribute.to_string(),
                        existing: current.clone(),
                        incoming: value.to_string(),
                    });
                }
            }
        }

        if flags.identifies_student {
            if let Some(owner) = roster.index.lookup(attribute, value) {
                if owner != student {
                    return Err(MergeConflict::IdentifierReassign {
                        attribute: attribute.to_string(),
                        value: value.to_string(),
                        owner: owner.clone(),
                        claimant: student.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn apply_merge(schema: &AttributeSchema, roster: &mut Roster, student: &StudentId, record: &SourceRecord) {
    let entry = roster.entries.entry(student.clone()).or_default();

    for (attribute, value) in merged_attributes(schema, record) {
        let Some(flags) = schema.flags(attribute) else {
            continue;
        };

        if flags.one_per_student {
            entry
                .info
                .entry(attribute.to_string())
                .or_insert_with(|| InfoValue::One(value.to_string()));
        } else {
            let slot = entry
                .info
                .entry(attribute.to_string())
                .or_insert_with(|| InfoValue::Many(BTreeSet::new()));
            if let InfoValue::Many(values) = slot {
                values.insert(value.to_string());
            }
        }

        if flags.identifies_student {
            roster.index.register(attribute, value, student);
        }
    }
}

/// The record's attributes minus the primary identifier, which is the entry key.
fn merged_attributes<'a>(
    schema: &'a AttributeSchema,
    record: &'a SourceRecord,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    record
        .attributes
        .iter()
        .filter(move |(attribute, _)| attribute.as_str() != schema.primary())
        .map(|(a, v)| (a.as_str(), v.as_str()))
}
