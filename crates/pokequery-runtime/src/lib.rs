//! Pokemon Query Runtime
//!
//! This crate contains the moving parts of the query service:
//! - `QueryServer` / `ScanEngine`: the server control loop and its scan worker
//! - `SharedSession`: client state shared by the two coordinators
//! - `ClientQueryCoordinator` and `ClientPersistCoordinator`
//! - `QueryClient`: the facade the command line front end drives
//!
//! `pokequery-core` provides the record model, codec and wire protocol these
//! components speak.

pub mod client;
pub mod persist;
pub mod query;
pub mod scan;
pub mod server;
pub mod session;
pub mod sink;

pub use client::{ClientEvents, QueryClient, ShutdownMode};
pub use persist::{validate_destination, ClientPersistCoordinator, PersistEvent, PersistReport};
pub use query::{ClientQueryCoordinator, QueryEvent};
pub use scan::{ScanRequest, ScanSummary, ScanWorker};
pub use server::{QueryServer, ScanEngine, ScanState, ServerSummary};
pub use session::{
    DestinationRegistry, PauseGuard, RecordStore, SessionReport, SessionResources, SessionStats,
    SharedSession,
};
pub use sink::{FileSink, MemorySink, RecordSink};

// Re-export core types for convenience
pub use pokequery_core::{
    Category, ClientConfig, CodecConfig, PokequeryError, PokequeryResult, Record, RecordCodec,
    ServerConfig,
};
