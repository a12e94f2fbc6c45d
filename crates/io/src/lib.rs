//! `rollbook-io`: everything between files on disk and the roster engine.
//!
//! Loads the course TOML, reads CSV and spreadsheet sources, runs cleaning
//! filters and hands the engine ready-made [`rollbook_roster::SourceRecord`]s.

pub mod clean;
pub mod config;
pub mod due;
pub mod error;
pub mod extract;
pub mod rows;

pub use config::{AssignmentCatalog, AssignmentInfo, CourseConfig};
pub use error::{CleanError, IoError};
pub use extract::{extract_all, extract_source, Extraction};
pub use rows::{read_rows, Layout, Row, Rows};
