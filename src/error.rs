//! Error types for ZoneWatch
//!
//! Expected absences (no match, unknown status, undefined baseline) are
//! ordinary result variants elsewhere in the crate; these types cover the
//! failures that abort an invocation.

use thiserror::Error;

/// Result type alias for ZoneWatch operations
pub type Result<T> = std::result::Result<T, ZoneWatchError>;

/// Main error type for ZoneWatch operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZoneWatchError {
    /// Event store failure; the whole date must be retried
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Errors reported by the event store collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Read failed
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Write failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Store rejected the record as unstorable
    #[error("Rejected record for zone {zone_id}: {reason}")]
    Rejected { zone_id: u32, reason: String },
}
