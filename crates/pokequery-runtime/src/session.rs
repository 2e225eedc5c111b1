//! Shared client session
//!
//! [`SharedSession`] is the context object both client coordinators work
//! against. It owns:
//! - the exclusion mutex around the control channel, the record store and the
//!   destination registry
//! - the pause flag a persist raises to hold back query workers
//! - the cancellation flag raised on shutdown
//! - session counters
//!
//! The pause flag is a depth counter behind a `watch` channel so waiters are
//! woken on change instead of polling.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use pokequery_core::{ControlChannel, PokequeryError, Record, RecordCodec, Result};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::debug;

// ----------------------------------------------------------------------------
// Record Store
// ----------------------------------------------------------------------------

/// Append-only sequence of captured records in arrival order
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch; the store never shrinks
    pub fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Destination Registry
// ----------------------------------------------------------------------------

/// Destinations written in this session, in first-written order
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    names: Vec<String>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destination; returns false when it was already known
    pub fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Session Resources
// ----------------------------------------------------------------------------

/// Everything guarded by the exclusion mutex
pub struct SessionResources<S> {
    pub channel: ControlChannel<S>,
    pub store: RecordStore,
    pub destinations: DestinationRegistry,
}

// ----------------------------------------------------------------------------
// Counters and Reports
// ----------------------------------------------------------------------------

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub successful_queries: u64,
    pub records_captured: u64,
    pub destinations_written: u64,
}

/// Final summary printed when the client exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub successful_queries: u64,
    pub records_captured: u64,
    /// Distinct destinations in first-written order
    pub destinations: Vec<String>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of queries: {}", self.successful_queries)?;
        writeln!(f, "Total records captured: {}", self.records_captured)?;
        if self.destinations.is_empty() {
            write!(f, "No files were written")
        } else {
            write!(f, "Files written:")?;
            for name in &self.destinations {
                write!(f, "\n  {name}")?;
            }
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    query_active: bool,
    stats: SessionStats,
}

// ----------------------------------------------------------------------------
// Shared Session
// ----------------------------------------------------------------------------

/// Process-wide client context shared by the query and persist coordinators
pub struct SharedSession<S> {
    resources: Mutex<SessionResources<S>>,
    state: StdMutex<SessionState>,
    pause: watch::Sender<usize>,
    cancel: watch::Sender<bool>,
    codec: RecordCodec,
}

impl<S> SharedSession<S> {
    pub fn new(channel: ControlChannel<S>, codec: RecordCodec) -> Self {
        Self {
            resources: Mutex::new(SessionResources {
                channel,
                store: RecordStore::new(),
                destinations: DestinationRegistry::new(),
            }),
            state: StdMutex::new(SessionState::default()),
            pause: watch::Sender::new(0),
            cancel: watch::Sender::new(false),
            codec,
        }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    // ------------------------------------------------------------------------
    // Pause flag
    // ------------------------------------------------------------------------

    /// Raise the pause flag until the returned guard is dropped
    ///
    /// Query workers that have not yet taken the exclusion mutex wait for the
    /// flag to clear. Guards nest.
    pub fn hold_pause(&self) -> PauseGuard<'_> {
        self.pause.send_modify(|depth| *depth += 1);
        debug!("Session pause raised");
        PauseGuard { pause: &self.pause }
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow() > 0
    }

    /// Wait for the pause flag to clear
    pub(crate) async fn wait_unpaused(&self) -> Result<()> {
        let mut pause = self.pause.subscribe();
        self.until_cancelled(async move {
            let _ = pause.wait_for(|depth| *depth == 0).await;
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    /// Ask every waiting or in-flight query to give up
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
        debug!("Session cancellation raised");
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the session is cancelled
    pub(crate) async fn cancelled(&self) {
        let mut cancel = self.cancel.subscribe();
        let _ = cancel.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `future` unless the session is cancelled first
    pub(crate) async fn until_cancelled<F: Future>(&self, future: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(PokequeryError::Cancelled),
            output = future => Ok(output),
        }
    }

    // ------------------------------------------------------------------------
    // Exclusion mutex
    // ------------------------------------------------------------------------

    pub(crate) async fn lock_resources(&self) -> MutexGuard<'_, SessionResources<S>> {
        self.resources.lock().await
    }

    pub(crate) async fn lock_resources_or_cancel(
        &self,
    ) -> Result<MutexGuard<'_, SessionResources<S>>> {
        self.until_cancelled(self.resources.lock()).await
    }

    // ------------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------------

    fn state(&self) -> StdMutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_query_active(&self) -> bool {
        self.state().query_active
    }

    pub(crate) fn set_query_active(&self, active: bool) {
        self.state().query_active = active;
    }

    pub(crate) fn record_query(&self, records: u64) {
        let mut state = self.state();
        state.stats.successful_queries += 1;
        state.stats.records_captured += records;
    }

    pub(crate) fn record_destination(&self, newly_registered: bool) {
        if newly_registered {
            self.state().stats.destinations_written += 1;
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.state().stats
    }

    /// Counters plus the registered destination names
    pub async fn report(&self) -> SessionReport {
        let destinations = self.lock_resources().await.destinations.names().to_vec();
        let stats = self.stats();
        SessionReport {
            successful_queries: stats.successful_queries,
            records_captured: stats.records_captured,
            destinations,
        }
    }
}

// ----------------------------------------------------------------------------
// Pause Guard
// ----------------------------------------------------------------------------

/// Keeps the session pause flag raised while alive
#[must_use = "the pause is released as soon as the guard is dropped"]
pub struct PauseGuard<'a> {
    pause: &'a watch::Sender<usize>,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.pause.send_modify(|depth| *depth = depth.saturating_sub(1));
        debug!("Session pause released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn session() -> SharedSession<tokio::io::DuplexStream> {
        let (stream, _peer) = tokio::io::duplex(64);
        SharedSession::new(ControlChannel::new(stream, 1024), RecordCodec::default())
    }

    #[test]
    fn test_destination_registry_ignores_duplicates() {
        let mut registry = DestinationRegistry::new();
        assert!(registry.insert("a.csv"));
        assert!(registry.insert("b.csv"));
        assert!(!registry.insert("a.csv"));
        assert_eq!(registry.names(), ["a.csv", "b.csv"]);
    }

    #[test]
    fn test_pause_guards_nest() {
        let session = session();
        assert!(!session.is_paused());
        let outer = session.hold_pause();
        let inner = session.hold_pause();
        drop(outer);
        assert!(session.is_paused());
        drop(inner);
        assert!(!session.is_paused());
    }

    #[tokio::test]
    async fn test_waiter_wakes_when_pause_released() {
        let session = Arc::new(session());
        let guard = session.hold_pause();

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_unpaused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pause_wait() {
        let session = Arc::new(session());
        let _guard = session.hold_pause();

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_unpaused().await })
        };
        session.cancel();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(PokequeryError::Cancelled)
        ));
    }

    #[test]
    fn test_report_display_lists_destinations() {
        let report = SessionReport {
            successful_queries: 2,
            records_captured: 5,
            destinations: vec!["fire.csv".to_string()],
        };
        let text = report.to_string();
        assert!(text.contains("Total number of queries: 2"));
        assert!(text.contains("fire.csv"));
    }
}
