//! Common error types for LTA

use thiserror::Error;

/// Common result type for LTA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LTA crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Result file could not be decoded
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// JSON codec map or export error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be decoded
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input data or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No codec/system label could be derived from a file name
    #[error("Extracted codec/system name is empty (file = {file}, trial = {trial})")]
    LabelExtraction { file: String, trial: String },

    /// Session tag names a test type this crate cannot tabulate
    #[error("Unsupported test type {0}")]
    UnsupportedTestType(String),

    /// A codec map was supplied but has no entry for an extracted label
    #[error("No codec mapping for extracted name {label}")]
    MissingCodecMapping { label: String },

    /// Differential scoring needs a reference entry in every trial
    #[error("Trial {trial} has no reference entry")]
    MissingReference { trial: String },

    /// Statistic could not be computed (bad alpha, degenerate distribution)
    #[error("Statistics error: {0}")]
    Statistics(String),
}
