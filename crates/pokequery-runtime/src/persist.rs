//! Client persist coordinator
//!
//! A persist snapshots the whole record store to a named destination. For its
//! whole run it raises the session pause flag, holds the exclusion mutex and
//! keeps the server paused, so no query interleaves with the write.

use std::sync::Arc;

use pokequery_core::{PokequeryError, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::SharedSession;
use crate::sink::RecordSink;

// ----------------------------------------------------------------------------
// Reports and Events
// ----------------------------------------------------------------------------

/// Summary of one completed persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub destination: String,
    pub records_written: usize,
    /// False when the destination had already been written this session
    pub newly_registered: bool,
    /// Whether the server had a scan in progress to pause
    pub server_paused: bool,
}

/// Outcome of one background persist
#[derive(Debug)]
pub enum PersistEvent {
    Completed(PersistReport),
    Failed {
        destination: String,
        error: PokequeryError,
    },
}

// ----------------------------------------------------------------------------
// Destination Validation
// ----------------------------------------------------------------------------

/// Reject destination names that cannot name a regular file
pub fn validate_destination(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PokequeryError::invalid_destination(name, "name is empty"));
    }
    if name == "." || name == ".." {
        return Err(PokequeryError::invalid_destination(
            name,
            "name refers to a directory",
        ));
    }
    if name.starts_with(char::is_whitespace) {
        return Err(PokequeryError::invalid_destination(
            name,
            "name starts with whitespace",
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Persist Coordinator
// ----------------------------------------------------------------------------

/// Snapshots the record store to destinations, one persist at a time
pub struct ClientPersistCoordinator<S> {
    session: Arc<SharedSession<S>>,
    sink: Arc<dyn RecordSink>,
    worker: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<PersistEvent>,
}

impl<S> ClientPersistCoordinator<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(
        session: Arc<SharedSession<S>>,
        sink: Arc<dyn RecordSink>,
        events: mpsc::UnboundedSender<PersistEvent>,
    ) -> Self {
        Self {
            session,
            sink,
            worker: None,
            events,
        }
    }

    /// Persist the current store to `destination` and wait for completion
    pub async fn persist_to(&self, destination: &str) -> Result<PersistReport> {
        check_request(&self.session, destination)?;
        run_persist(&self.session, self.sink.as_ref(), destination).await
    }

    /// Validate, then persist in the background
    ///
    /// Rejections (`NoData`, invalid names) are returned immediately without
    /// touching the channel. A persist still running is awaited first.
    pub async fn spawn_persist(&mut self, destination: &str) -> Result<()> {
        check_request(&self.session, destination)?;
        self.wait_idle().await?;

        let session = Arc::clone(&self.session);
        let sink = Arc::clone(&self.sink);
        let events = self.events.clone();
        let destination = destination.to_string();
        self.worker = Some(tokio::spawn(async move {
            let event = match run_persist(&session, sink.as_ref(), &destination).await {
                Ok(report) => PersistEvent::Completed(report),
                Err(error) => {
                    warn!("Persist to {} failed: {}", destination, error);
                    PersistEvent::Failed { destination, error }
                }
            };
            let _ = events.send(event);
        }));
        Ok(())
    }

    /// Wait for the background persist, if any, to finish
    pub async fn wait_idle(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(handle) => handle
                .await
                .map_err(|e| PokequeryError::worker_failed(e.to_string())),
            None => Ok(()),
        }
    }
}

fn check_request<S>(session: &SharedSession<S>, destination: &str) -> Result<()> {
    validate_destination(destination)?;
    if session.stats().records_captured == 0 {
        return Err(PokequeryError::NoData);
    }
    Ok(())
}

async fn run_persist<S>(
    session: &SharedSession<S>,
    sink: &dyn RecordSink,
    destination: &str,
) -> Result<PersistReport>
where
    S: AsyncRead + AsyncWrite,
{
    info!("Persisting records to {}", destination);
    let _pause = session.hold_pause();
    let mut resources = session.lock_resources().await;

    let server_paused = resources.channel.pause().await?;
    debug!("Server pause acknowledged (applied: {})", server_paused);

    let codec = session.codec();
    let lines: Vec<String> = resources.store.iter().map(|r| codec.encode(r)).collect();
    let written = sink.append_lines(destination, &lines).await;

    // Resume the server even when the write failed
    let resumed = resources.channel.unpause().await;
    written?;
    let resumed = resumed?;
    debug!("Server unpause acknowledged (resumed: {})", resumed);

    let newly_registered = resources.destinations.insert(destination);
    session.record_destination(newly_registered);
    drop(resources);

    info!("Wrote {} record(s) to {}", lines.len(), destination);
    Ok(PersistReport {
        destination: destination.to_string(),
        records_written: lines.len(),
        newly_registered,
        server_paused,
    })
}
