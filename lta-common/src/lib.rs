//! # LTA Common Library
//!
//! Shared code for listening test analysis including:
//! - Typed result records (sessions, trials, test files)
//! - Result file parsing
//! - Codec/system label extraction and annotation
//! - Trial validity checks
//! - Per-subject tabulation and cross-subject aggregation
//! - Confidence interval statistics
//! - Configuration loading

pub mod aggregate;
pub mod annotate;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod stats;
pub mod tabulate;
pub mod validate;

pub use error::{Error, Result};
pub use model::{ScoringKind, SessionInfo, SubjectResult, TestFile, TestType, Trial};
