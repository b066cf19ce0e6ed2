//! Error types for the AutoGaitA step-cycle engine.
//!
//! Every module that produces an error imports its error type from here so
//! the hierarchy stays in one place.
//!
//! ## Hierarchy
//!
//! ```text
//! GaitError (top-level)
//! ├── ConfigError   (configuration, identifiers, annotation layout)
//! ├── DataError     (coordinate files, tracking quality, ranges)
//! ├── NoCycles      (nothing survived cycle cleaning)
//! └── Bug           (binning invariants)
//! ```

use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// GaitResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by pipeline-level functions.
pub type GaitResult<T> = Result<T, GaitError>;

// ---------------------------------------------------------------------------
// GaitError: top-level aggregator
// ---------------------------------------------------------------------------

/// Top-level error type of the per-subject and group pipelines.
///
/// Component functions return [`ConfigError`] or [`DataError`]; both coerce
/// into `GaitError` via [`From`]. Any `GaitError` aborts the current
/// subject/trial only.
#[derive(Debug, Error)]
pub enum GaitError {
    /// The configuration or the annotation layout is unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The tracked data is unusable.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// No step cycle survived cleaning.
    #[error("No step cycles left for {subject} after cleaning")]
    NoCycles {
        /// Subject (and trial) label.
        subject: String,
    },

    /// An internal invariant was violated.
    #[error("Internal error (please report): {0}")]
    Bug(String),

    /// A file or directory could not be accessed.
    #[error("I/O error at `{path}`: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// CSV (de)serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Excel writer error.
    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl GaitError {
    /// Construct a [`GaitError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GaitError::Io { path: path.into(), source }
    }

    /// Construct a [`GaitError::Bug`].
    pub fn bug<S: Into<String>>(msg: S) -> Self {
        GaitError::Bug(msg.into())
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while validating configuration or identifying inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A required column could not be found.
    #[error("Could not find a {what} column in `{path}`")]
    MissingColumn {
        /// Logical role of the column.
        what: String,
        /// File that was searched.
        path: PathBuf,
    },

    /// Every configured joint was rejected.
    #[error("None of the configured joints were found in the data")]
    NoJoints,

    /// Data and baseline identifiers clash.
    #[error("Data identifier `{data}` and baseline identifier `{baseline}` must be distinct")]
    ConflictingIdentifiers {
        /// Data identifier string.
        data: String,
        /// Baseline identifier string.
        baseline: String,
    },

    /// The annotation table lists a subject more than once.
    #[error("Subject `{subject}` appears {count} times in the annotation table")]
    DuplicateSubject {
        /// Subject identifier.
        subject: String,
        /// Number of row blocks found.
        count: usize,
    },

    /// A configuration file could not be read.
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    ParseError {
        /// Path being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }

    /// Construct a [`ConfigError::MissingColumn`].
    pub fn missing_column<S: Into<String>>(what: S, path: impl Into<PathBuf>) -> Self {
        ConfigError::MissingColumn { what: what.into(), path: path.into() }
    }
}

// ---------------------------------------------------------------------------
// DataError
// ---------------------------------------------------------------------------

/// Errors produced while loading or checking tracked data.
#[derive(Debug, Error)]
pub enum DataError {
    /// No file matched the identifiers.
    #[error("No file found in `{dir}` matching {pattern}")]
    NotFound {
        /// Directory searched.
        dir: PathBuf,
        /// Description of the identifiers.
        pattern: String,
    },

    /// More than one file matched the identifiers.
    #[error("Found {count} files in `{dir}` matching {pattern}; expected exactly one")]
    AmbiguousFiles {
        /// Directory searched.
        dir: PathBuf,
        /// Description of the identifiers.
        pattern: String,
        /// Number of matches.
        count: usize,
    },

    /// A cell could not be parsed as a number.
    #[error("Cannot parse `{value}` as a number in `{path}` (row {row}, column `{column}`)")]
    Malformed {
        /// File containing the value.
        path: PathBuf,
        /// 1-based row of the file.
        row: usize,
        /// Column header.
        column: String,
        /// Raw cell text.
        value: String,
    },

    /// The file layout does not match what the tracker writes.
    #[error("Invalid format in `{path}`: {message}")]
    InvalidFormat {
        /// File being read.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Tracking is too poor to decide the walking direction.
    #[error("Tracking of `{joint}` is too broken to determine the gait direction")]
    BrokenTracking {
        /// Direction joint.
        joint: String,
    },

    /// Annotated samples lie outside the tracked range.
    #[error("Annotation refers to sample {sample}, but the data has only {rows} rows")]
    OutOfRange {
        /// Offending sample index.
        sample: usize,
        /// Number of data rows.
        rows: usize,
    },

    /// Data and baseline recordings differ in length.
    #[error("Data has {data} rows but baseline has {baseline} rows")]
    LengthMismatch {
        /// Rows in the data file.
        data: usize,
        /// Rows in the baseline file.
        baseline: usize,
    },

    /// Subjects were normalised to different bin counts.
    #[error("Subject `{subject}` has {found} bins per step cycle, expected {expected}")]
    BinNumMismatch {
        /// Offending subject.
        subject: String,
        /// Bin count established by earlier subjects.
        expected: usize,
        /// Bin count of this subject.
        found: usize,
    },
}

impl DataError {
    /// Construct a [`DataError::InvalidFormat`].
    pub fn invalid_format<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        DataError::InvalidFormat { path: path.into(), message: message.into() }
    }
}
