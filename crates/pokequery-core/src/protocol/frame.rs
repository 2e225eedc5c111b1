//! Frame vocabulary
//!
//! Frames carry an explicit variant tag, so a category request can never be
//! mistaken for a control token.

use serde::{Deserialize, Serialize};

use crate::Category;

// ----------------------------------------------------------------------------
// Client Frames
// ----------------------------------------------------------------------------

/// Frames sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientFrame {
    /// Filter the dataset and return every record of this category
    CategoryRequest { category: Category },
    /// Suspend scanning until unpaused
    Pause,
    /// Resume scanning
    Unpause,
    /// Terminate the session
    Stop,
}

impl ClientFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::CategoryRequest { .. } => "category-request",
            ClientFrame::Pause => "pause",
            ClientFrame::Unpause => "unpause",
            ClientFrame::Stop => "stop",
        }
    }
}

// ----------------------------------------------------------------------------
// Server Frames
// ----------------------------------------------------------------------------

/// Frames sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerFrame {
    /// Byte length of the payload that follows
    SizeHeader { bytes: u64 },
    /// Matching record lines joined by the record separator
    Payload { records: String },
    /// Number of records in the preceding payload
    CountHeader { count: u64 },
    /// `applied` is false when no scan was running to pause
    PauseAck { applied: bool },
    /// `resumed` is false when nothing was paused
    UnpauseAck { resumed: bool },
    /// Sent in place of a response when the scan could not complete
    Failure { reason: String },
}

impl ServerFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::SizeHeader { .. } => "size-header",
            ServerFrame::Payload { .. } => "payload",
            ServerFrame::CountHeader { .. } => "count-header",
            ServerFrame::PauseAck { .. } => "pause-ack",
            ServerFrame::UnpauseAck { .. } => "unpause-ack",
            ServerFrame::Failure { .. } => "failure",
        }
    }
}
