//! CLI Exit Code Registry
//!
//! Every code `rollbook` can return is defined here. Scripts that build
//! grade reports in CI depend on them, so treat changes as breaking.
//!
//! | Code | Meaning                                                |
//! |------|--------------------------------------------------------|
//! | 0    | Success                                                |
//! | 1    | General error (unspecified)                            |
//! | 2    | Usage error (bad args, missing course file)            |
//! | 60   | Invalid course config (including identifier schema)    |
//! | 61   | A source could not be read or extracted                |
//! | 62   | Resolution hit `max_passes` while still progressing    |
//! | 63   | `--strict` run produced warnings                       |
//! | 64   | A report or output file could not be written           |

use rollbook_io::IoError;
use rollbook_roster::RosterError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable course file.
pub const EXIT_USAGE: u8 = 2;

/// Course config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 60;

/// A source file is missing, unreadable, or lacks a mapped column.
pub const EXIT_SOURCE: u8 = 61;

/// The fixed-point loop was cut off by `max_passes`.
pub const EXIT_NO_CONVERGENCE: u8 = 62;

/// `--strict` and at least one warning was raised. Outputs are still written.
pub const EXIT_STRICT_WARNINGS: u8 = 63;

/// Writing a report, CSV summary or JSON output failed.
pub const EXIT_WRITE: u8 = 64;

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::ConfigParse(_)
        | IoError::ConfigValidation(_)
        | IoError::Schema(_)
        | IoError::UnknownFilter(_)
        | IoError::BadDueDate { .. } => EXIT_INVALID_CONFIG,
        IoError::UnsupportedFileType(_)
        | IoError::SheetRequired(_)
        | IoError::SheetNotAllowed(_)
        | IoError::SheetNotFound { .. }
        | IoError::RosterHeaderNotFound(_)
        | IoError::MissingColumn { .. }
        | IoError::Read { .. } => EXIT_SOURCE,
    }
}

pub fn roster_exit_code(err: &RosterError) -> u8 {
    match err {
        RosterError::NoConvergence { .. } => EXIT_NO_CONVERGENCE,
        RosterError::NoPrimaryIdentifier
        | RosterError::MultiplePrimaryIdentifiers { .. }
        | RosterError::DuplicateAttribute(_)
        | RosterError::UnknownAttribute { .. } => EXIT_INVALID_CONFIG,
    }
}
