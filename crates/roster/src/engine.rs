use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::merge_grades;
use crate::error::RosterError;
use crate::merge::{merge, MergeOutcome};
use crate::model::{Roster, SourceRecord};
use crate::resolve::resolve;
use crate::schema::AttributeSchema;
use crate::warning::RunWarning;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ceiling on resolution passes. Hitting it while records are still being
    /// resolved is fatal. `None` lets the loop run to its natural fixed point.
    pub max_passes: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub roster: Roster,
    pub warnings: Vec<RunWarning>,
    /// Records that never resolved, in the order of the final pass.
    pub unresolved: Vec<SourceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub primary_identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records: usize,
    pub passes: usize,
    pub students: usize,
    /// Records attributed to a student, whether or not their attributes merged.
    pub resolved: usize,
    pub rejected_merges: usize,
    pub duplicate_grades: usize,
    pub unresolved: usize,
}

/// Resolve and merge every record, deferring unresolvable ones to later passes
/// until a pass makes no progress or nothing is left pending.
///
/// Records are processed in the order given. Which record resolves is
/// independent of that order; which writer wins a singleton conflict is not.
pub fn run(
    schema: &AttributeSchema,
    records: Vec<SourceRecord>,
    options: &RunOptions,
) -> Result<RunResult, RosterError> {
    check_attributes(schema, &records)?;

    let mut roster = Roster::default();
    let mut warnings = Vec::new();
    let mut summary = RunSummary { records: records.len(), ..RunSummary::default() };
    let mut pending = records;

    let unresolved = loop {
        if let Some(limit) = options.max_passes {
            if summary.passes >= limit {
                return Err(RosterError::NoConvergence { passes: limit, pending: pending.len() });
            }
        }
        summary.passes += 1;

        let mut progressed = false;
        let mut deferred = Vec::new();

        for record in pending {
            let Some(student) = resolve(schema, &record, &roster.index) else {
                deferred.push(record);
                continue;
            };
            progressed = true;
            summary.resolved += 1;

            if let MergeOutcome::Rejected(conflict) = merge(schema, &mut roster, &student, &record) {
                summary.rejected_merges += 1;
                let warning = RunWarning::MergeRejected {
                    origin: record.origin.clone(),
                    student: student.clone(),
                    conflict,
                };
                warn!("{warning}");
                warnings.push(warning);
            }

            summary.duplicate_grades += merge_grades(&mut roster, &student, &record, &mut warnings);
        }

        debug!(pass = summary.passes, deferred = deferred.len(), progressed, "resolution pass");

        if !progressed || deferred.is_empty() {
            break deferred;
        }
        pending = deferred;
    };

    for record in &unresolved {
        let warning = RunWarning::Unidentified {
            origin: record.origin.clone(),
            attributes: record.attributes.clone(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    summary.students = roster.len();
    summary.unresolved = unresolved.len();
    info!(
        students = summary.students,
        passes = summary.passes,
        unresolved = summary.unresolved,
        "roster resolved"
    );

    Ok(RunResult {
        meta: RunMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            primary_identifier: schema.primary().to_string(),
        },
        summary,
        roster,
        warnings,
        unresolved,
    })
}

fn check_attributes(schema: &AttributeSchema, records: &[SourceRecord]) -> Result<(), RosterError> {
    for record in records {
        if let Some(attribute) = record.attributes.keys().find(|name| !schema.contains(name)) {
            return Err(RosterError::UnknownAttribute {
                attribute: attribute.clone(),
                origin: record.origin.clone(),
            });
        }
    }
    Ok(())
}
