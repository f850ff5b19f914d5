//! Error types for the scheduling engine.
//!
//! Errors are classified by how the pipeline must react to them (§7):
//! - fatal errors abort the run before or during persistence;
//! - contact-scoped errors are logged and isolate a single contact;
//! - post-processing errors are programming errors by construction and
//!   are always fatal, since every post-processing input came from the
//!   engine itself.

use thiserror::Error;

/// Top-level error type returned by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    /// Maps to the process exit codes defined in spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Store(_) => 2,
            EngineError::Configuration(_) => 3,
            EngineError::Internal(_) => 4,
        }
    }
}

/// A per-contact derivation failure. Isolated: one bad contact must never
/// fail the run (§7). Logged as a warning by the caller and otherwise
/// dropped from the candidate set.
#[derive(Debug, Error, Clone)]
pub enum ContactError {
    #[error("contact {contact_id}: invalid data: {reason}")]
    InvalidData { contact_id: i64, reason: String },

    #[error("contact {contact_id}: invalid date: {reason}")]
    InvalidDate { contact_id: i64, reason: String },

    #[error("contact {contact_id}: parse error: {reason}")]
    ParseError { contact_id: i64, reason: String },
}

impl ContactError {
    pub fn contact_id(&self) -> i64 {
        match self {
            ContactError::InvalidData { contact_id, .. }
            | ContactError::InvalidDate { contact_id, .. }
            | ContactError::ParseError { contact_id, .. } => *contact_id,
        }
    }
}

/// Errors raised by the date kernel (C1). Contact-scoped callers convert
/// these into `ContactError::InvalidDate` / `ContactError::ParseError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("failed to parse date from '{0}'")]
    ParseError(String),
}
