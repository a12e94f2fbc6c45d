//! `rollbook-roster`: cross-source student identity resolution and merge engine.
//!
//! Pure engine crate: receives cleaned source records, returns the merged roster
//! plus every warning raised along the way. No file IO and no CLI dependencies.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod resolve;
pub mod schema;
pub mod warning;

pub use engine::{run, RunOptions, RunResult, RunSummary};
pub use error::RosterError;
pub use merge::{merge, MergeConflict, MergeOutcome};
pub use model::{
    Grade, GradeCell, IdentityIndex, InfoValue, RecordOrigin, Roster, RosterEntry, Score,
    SourceRecord, StudentId,
};
pub use resolve::resolve;
pub use schema::{AttributeFlags, AttributeSchema};
pub use warning::RunWarning;
