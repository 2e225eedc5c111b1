//! Error types for the Pokemon query protocol
//!
//! This module contains the specific error types for the control channel,
//! record decoding and local resources, and the [`PokequeryError`] type that
//! unifies them. `InvalidCategory` and `NoData` are user-facing rejections;
//! everything else aborts the in-flight request and is reported to the caller.

use std::io;
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures on the control channel between client and server
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] io::Error),
    #[error("Connection closed by peer")]
    Closed,
    #[error("Frame too large: {size} bytes (max: {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },
    #[error("Frame encoding error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Unexpected frame: expected {expected}, got {actual}")]
    UnexpectedFrame {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Payload length mismatch: size header announced {expected} bytes, received {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
    #[error("Record count mismatch: count header announced {expected}, payload holds {actual}")]
    CountMismatch { expected: u64, actual: u64 },
    #[error("Server reported failure: {reason}")]
    Remote { reason: String },
}

/// Malformed record lines
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed line: missing field `{field}`")]
    MalformedLine { field: &'static str },
    #[error("Malformed line: {extra} unexpected trailing field(s)")]
    TrailingFields { extra: usize },
    #[error("Field `{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("Field `{field}` is not a non-negative number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Legendary flag must be `True` or `False`, got {value:?}")]
    InvalidFlag { value: String },
}

/// Failures opening or using local files and sockets
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid destination name {name:?}: {reason}")]
    InvalidDestination { name: String, reason: &'static str },
    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not accept incoming connection: {0}")]
    Accept(#[source] io::Error),
    #[error("Unable to establish connection to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the Pokemon query service
#[derive(Debug, thiserror::Error)]
pub enum PokequeryError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Category outside the closed vocabulary
    #[error("Invalid category: {name:?}")]
    InvalidCategory { name: String },

    /// Persist requested before any record was captured
    #[error("No records captured yet, nothing to persist")]
    NoData,

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// The session was shut down while the operation was waiting
    #[error("Operation cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {reason}")]
    WorkerFailed { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl PokequeryError {
    /// Create an invalid category error
    pub fn invalid_category<T: Into<String>>(name: T) -> Self {
        PokequeryError::InvalidCategory { name: name.into() }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        PokequeryError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a worker failure error with a reason
    pub fn worker_failed<T: Into<String>>(reason: T) -> Self {
        PokequeryError::WorkerFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid destination error
    pub fn invalid_destination<T: Into<String>>(name: T, reason: &'static str) -> Self {
        PokequeryError::Resource(ResourceError::InvalidDestination {
            name: name.into(),
            reason,
        })
    }

    /// Whether this is a user-facing rejection that never touched the channel
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PokequeryError::InvalidCategory { .. }
                | PokequeryError::NoData
                | PokequeryError::Resource(ResourceError::InvalidDestination { .. })
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, PokequeryError>;
pub type PokequeryResult<T> = Result<T>;
