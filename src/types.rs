//! Error taxonomy for habitd
//!
//! Every engine operation returns a discriminated result. Store-level faults
//! are classified into `Database` and never escape raw; the remaining kinds
//! are deterministic outcomes of the access-control and visibility rules.

use thiserror::Error;

/// Errors surfaced by the habit engine and its collaborators
#[derive(Debug, Error)]
pub enum HabitError {
    /// Operation requires a resolved identity and none was presented
    #[error("authentication required")]
    Unauthenticated,

    /// Identifier is not a well-formed ObjectId
    #[error("invalid habit id: {0}")]
    InvalidId(String),

    /// No habit with that id, or it vanished between check and act
    #[error("habit not found")]
    NotFound,

    /// Identity present but not permitted: non-owner mutation, or a
    /// private habit viewed by someone other than its owner
    #[error("access denied")]
    Forbidden,

    /// Client-supplied fields failed the input schema (missing, overlong,
    /// or unknown)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected store failure. Logged by the caller, surfaced to the
    /// end user as a generic failure without internal detail.
    #[error("database error: {0}")]
    Database(String),

    /// HTTP-surface failure (body read, JSON decode)
    #[error("http error: {0}")]
    Http(String),

    /// Token verification failure
    #[error("auth error: {0}")]
    Auth(String),

    /// Socket-level failure (bind, accept)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HabitError>;
