//! Pokemon Query Core
//!
//! This crate provides the foundational types for the Pokemon query service:
//! the record model, the closed category vocabulary, the delimited line codec,
//! and the framed control protocol spoken between client and server.
//!
//! Nothing in here opens sockets or files; the runtime crate owns those.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod category;
pub mod codec;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod record;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use category::Category;
pub use codec::RecordCodec;
pub use config::{ClientConfig, CodecConfig, ServerConfig};
pub use errors::{
    ChannelError, DecodeError, PokequeryError, PokequeryResult, ResourceError, Result,
};
pub use protocol::{ClientFrame, ControlChannel, FrameReader, FrameWriter, QueryResponse, ServerFrame};
pub use record::{BaseStats, Record};
