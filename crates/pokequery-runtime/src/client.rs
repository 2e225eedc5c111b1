//! Query client facade
//!
//! [`QueryClient`] wires one control channel into a [`SharedSession`] and the
//! two coordinators, and owns the orderly shutdown sequence.

use std::sync::Arc;

use pokequery_core::{
    Category, ClientConfig, ControlChannel, RecordCodec, ResourceError, Result,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::persist::{ClientPersistCoordinator, PersistEvent, PersistReport};
use crate::query::{ClientQueryCoordinator, QueryEvent};
use crate::session::{SessionReport, SessionStats, SharedSession};
use crate::sink::{FileSink, RecordSink};

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

/// Receivers for background outcomes
#[derive(Debug)]
pub struct ClientEvents {
    pub queries: mpsc::UnboundedReceiver<QueryEvent>,
    pub persists: mpsc::UnboundedReceiver<PersistEvent>,
}

/// What to do with queries still queued at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Let every queued query complete
    Drain,
    /// Abandon the in-flight query and everything queued behind it
    Cancel,
}

// ----------------------------------------------------------------------------
// Query Client
// ----------------------------------------------------------------------------

/// One client session against a query server
pub struct QueryClient<S> {
    session: Arc<SharedSession<S>>,
    queries: ClientQueryCoordinator<S>,
    persists: ClientPersistCoordinator<S>,
}

impl QueryClient<TcpStream> {
    /// Connect to the configured server, persisting to files
    pub async fn connect(config: &ClientConfig) -> Result<(Self, ClientEvents)> {
        config.validate()?;
        let stream = TcpStream::connect(&config.server_addr)
            .await
            .map_err(|source| ResourceError::Connect {
                addr: config.server_addr.clone(),
                source,
            })?;
        info!("Connected to query server at {}", config.server_addr);
        Ok(Self::from_stream(stream, config, Arc::new(FileSink::new())))
    }
}

impl<S> QueryClient<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Build a session over an already established stream
    pub fn from_stream(
        stream: S,
        config: &ClientConfig,
        sink: Arc<dyn RecordSink>,
    ) -> (Self, ClientEvents) {
        let channel = ControlChannel::new(stream, config.max_frame_size);
        let session = Arc::new(SharedSession::new(
            channel,
            RecordCodec::new(&config.codec),
        ));

        let (query_tx, query_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let client = Self {
            queries: ClientQueryCoordinator::new(Arc::clone(&session), query_tx),
            persists: ClientPersistCoordinator::new(Arc::clone(&session), sink, persist_tx),
            session,
        };
        let events = ClientEvents {
            queries: query_rx,
            persists: persist_rx,
        };
        (client, events)
    }

    pub fn session(&self) -> &Arc<SharedSession<S>> {
        &self.session
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Queue a category query; see [`ClientQueryCoordinator::submit_category`]
    pub async fn submit_category(&mut self, name: &str) -> Result<Category> {
        self.queries.submit_category(name).await
    }

    /// Start a background persist; see [`ClientPersistCoordinator::spawn_persist`]
    pub async fn persist_to(&mut self, destination: &str) -> Result<()> {
        self.persists.spawn_persist(destination).await
    }

    /// Persist and wait for the result
    pub async fn persist_now(&self, destination: &str) -> Result<PersistReport> {
        self.persists.persist_to(destination).await
    }

    /// Wait until every queued query has been answered
    pub async fn wait_queries(&mut self) -> Result<()> {
        self.queries.wait_idle().await
    }

    /// End the session
    ///
    /// Waits for any running persist, then drains or cancels queries, sends
    /// `Stop` and returns the final report.
    pub async fn shutdown(mut self, mode: ShutdownMode) -> Result<SessionReport> {
        if let Err(e) = self.persists.wait_idle().await {
            warn!("Persist worker failed during shutdown: {}", e);
        }
        if mode == ShutdownMode::Cancel {
            self.queries.cancel();
        }
        if let Err(e) = self.queries.wait_idle().await {
            warn!("Query worker failed during shutdown: {}", e);
        }

        {
            let mut resources = self.session.lock_resources().await;
            resources.channel.stop().await?;
        }
        info!("Stop sent, session closed");

        Ok(self.session.report().await)
    }
}
