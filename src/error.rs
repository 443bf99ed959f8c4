//! Typed errors raised by the merge core.
//!
//! Mapping and resolution outcomes are never errors: an unmapped column or an
//! unresolved conflict is a normal state. The variants below cover caller
//! mistakes (bad indices, unknown names) and unusable inputs.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("source file '{0}' was supplied more than once")]
    DuplicateSource(String),
    #[error("no source file named '{0}'")]
    UnknownSource(String),
    #[error("file '{file}' has no column named '{column}'")]
    UnknownColumn { file: String, column: String },
    #[error("conflict index {index} is out of range ({len} conflict(s))")]
    ConflictIndexOutOfRange { index: usize, len: usize },
    #[error("conflict {0} is already resolved")]
    ConflictAlreadyResolved(usize),
    #[error("training file count must be at least 1")]
    InvalidTrainingCount,
    #[error("unsupported input format for {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("at least one input file must be provided")]
    EmptyInput,
}
