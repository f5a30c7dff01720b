//! Error types of the correlation engine
//!
//! Only internal invariant violations surface as errors. Incomplete traces
//! (missing stacks, missing shutdowns, unmatched heuristic links) are not
//! errors: the affected fields are simply left unset.

use crate::activity::ActivityId;
use crate::role::{OperationKind, Role};
use thiserror::Error;

/// Errors while loading or validating a signature table
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Failed to read signature table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse signature table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unsupported signature table version: {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid pattern {pattern:?} for {role} signature: {source}")]
    InvalidPattern {
        role: Role,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Signature for {role} matches an unknown type tag")]
    UnknownType { role: Role },

    #[error("Duplicate {role} signature for {kind}")]
    Duplicate { kind: OperationKind, role: Role },

    #[error("Signature for {role} lists no operation kinds")]
    NoKinds { role: Role },
}

/// A group could not be folded into an operation
///
/// This signals a classifier or traversal defect, never a data quality issue.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReduceError {
    #[error("Activity {id} in group {root} has no recognized {kind} role")]
    MalformedGroup {
        kind: OperationKind,
        root: ActivityId,
        id: ActivityId,
    },

    #[error("Activity {id} in group {root} is missing from the snapshot")]
    MissingActivity { root: ActivityId, id: ActivityId },
}

/// Errors raised by kind processors and the registry
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{kind} processing failed: {source}")]
    Reduce {
        kind: OperationKind,
        #[source]
        source: ReduceError,
    },

    #[error("Invalid analysis configuration: {0}")]
    Config(String),
}
