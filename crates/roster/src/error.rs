use thiserror::Error;

use crate::model::RecordOrigin;

/// Fatal engine errors. Anything recoverable is a [`crate::RunWarning`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// No attribute is flagged both `identifies_student` and `one_per_student`.
    #[error("no primary student identifier: exactly one attribute must identify the student and be one-per-student")]
    NoPrimaryIdentifier,

    /// More than one attribute qualifies as the primary identifier.
    #[error("more than one primary student identifier: {}", attributes.join(", "))]
    MultiplePrimaryIdentifiers { attributes: Vec<String> },

    /// The same attribute name was declared twice.
    #[error("attribute '{0}' is declared more than once")]
    DuplicateAttribute(String),

    /// A source record carries an attribute the schema does not declare.
    #[error("{origin}: attribute '{attribute}' is not declared in the schema")]
    UnknownAttribute { attribute: String, origin: RecordOrigin },

    /// The resolution loop was still making progress when the pass ceiling was hit.
    #[error("no convergence after {passes} pass(es); {pending} record(s) still pending")]
    NoConvergence { passes: usize, pending: usize },
}
