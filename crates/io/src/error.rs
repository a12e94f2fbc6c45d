use std::path::PathBuf;

use rollbook_roster::RosterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (unknown attribute, missing timestamp column, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// The attribute list does not form a valid schema.
    #[error("invalid attribute schema: {0}")]
    Schema(#[from] RosterError),

    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("assignment '{assignment}': cannot parse due date '{value}'")]
    BadDueDate { assignment: String, value: String },

    #[error("{}: unsupported file type", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("{}: a sheet name is required for spreadsheet files", .0.display())]
    SheetRequired(PathBuf),

    #[error("{}: sheet names only apply to spreadsheet files", .0.display())]
    SheetNotAllowed(PathBuf),

    #[error("{}: sheet '{sheet}' not found", path.display())]
    SheetNotFound { path: PathBuf, sheet: String },

    #[error("{}: roster header not found", .0.display())]
    RosterHeaderNotFound(PathBuf),

    #[error("source '{source_name}': missing column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("cannot read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
}

/// A value rejected by a cleaning filter. Always handled per record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanError {
    #[error("'{value}' fails {filter}")]
    IncorrectFormat { filter: String, value: String },
}
