//! Client query coordinator
//!
//! Accepted categories wait in a pending queue. A single query worker drains
//! the queue front to back, performing one full round trip per category while
//! holding the exclusion mutex, and appends the decoded records to the store.
//! A new worker is spawned only when the previous one has marked itself idle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pokequery_core::{Category, PokequeryError, Record, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::{SessionResources, SharedSession};

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Outcome of one background query
#[derive(Debug)]
pub enum QueryEvent {
    Completed { category: Category, records: usize },
    Failed {
        category: Category,
        error: PokequeryError,
    },
}

// ----------------------------------------------------------------------------
// Pending Queue
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingQueue {
    categories: VecDeque<Category>,
    worker_active: bool,
}

type SharedQueue = Arc<Mutex<PendingQueue>>;

fn lock_queue(queue: &SharedQueue) -> MutexGuard<'_, PendingQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

// ----------------------------------------------------------------------------
// Query Coordinator
// ----------------------------------------------------------------------------

/// Queues category requests and drives them through the control channel
pub struct ClientQueryCoordinator<S> {
    session: Arc<SharedSession<S>>,
    pending: SharedQueue,
    worker: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<QueryEvent>,
}

impl<S> ClientQueryCoordinator<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(session: Arc<SharedSession<S>>, events: mpsc::UnboundedSender<QueryEvent>) -> Self {
        Self {
            session,
            pending: Arc::new(Mutex::new(PendingQueue::default())),
            worker: None,
            events,
        }
    }

    /// Validate and enqueue a category, starting a worker if none is running
    ///
    /// Unknown names are rejected with `InvalidCategory` before anything is
    /// queued or sent.
    pub async fn submit_category(&mut self, name: &str) -> Result<Category> {
        let category: Category = name.parse()?;

        let start_worker = {
            let mut pending = lock_queue(&self.pending);
            pending.categories.push_back(category);
            !std::mem::replace(&mut pending.worker_active, true)
        };

        if start_worker {
            // The previous worker already marked itself idle; this only reaps it
            if let Some(previous) = self.worker.take() {
                if let Err(e) = previous.await {
                    warn!("Previous query worker ended abnormally: {}", e);
                }
            }
            let worker = QueryWorker {
                session: Arc::clone(&self.session),
                pending: Arc::clone(&self.pending),
                events: self.events.clone(),
            };
            self.worker = Some(tokio::spawn(worker.run()));
            debug!("Query worker started");
        }

        info!("Queued query for {}", category);
        Ok(category)
    }

    /// Number of categories not yet answered
    pub fn pending(&self) -> usize {
        lock_queue(&self.pending).categories.len()
    }

    /// Wait until every queued category has been processed
    pub async fn wait_idle(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(handle) => handle
                .await
                .map_err(|e| PokequeryError::worker_failed(e.to_string())),
            None => Ok(()),
        }
    }

    /// Cancel the in-flight query and drop everything still queued
    pub fn cancel(&self) {
        self.session.cancel();
    }
}

// ----------------------------------------------------------------------------
// Query Worker
// ----------------------------------------------------------------------------

struct QueryWorker<S> {
    session: Arc<SharedSession<S>>,
    pending: SharedQueue,
    events: mpsc::UnboundedSender<QueryEvent>,
}

impl<S> QueryWorker<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn run(self) {
        loop {
            let category = {
                let mut pending = lock_queue(&self.pending);
                match pending.categories.front().copied() {
                    Some(category) => category,
                    None => {
                        pending.worker_active = false;
                        debug!("Query worker idle");
                        return;
                    }
                }
            };

            let result = self.round_trip(category).await;

            {
                let mut pending = lock_queue(&self.pending);
                pending.categories.pop_front();
                if matches!(result, Err(PokequeryError::Cancelled)) {
                    pending.categories.clear();
                }
            }

            let event = match result {
                Ok(records) => {
                    info!("Query for {} captured {} record(s)", category, records);
                    QueryEvent::Completed { category, records }
                }
                Err(error) => {
                    warn!("Query for {} failed: {}", category, error);
                    QueryEvent::Failed { category, error }
                }
            };
            let _ = self.events.send(event);
        }
    }

    /// One category round trip under the exclusion mutex
    async fn round_trip(&self, category: Category) -> Result<usize> {
        let mut resources = loop {
            self.session.wait_unpaused().await?;
            let resources = self.session.lock_resources_or_cancel().await?;
            if !self.session.is_paused() {
                break resources;
            }
            // A persist raised the flag while this worker waited for the lock
            debug!("Persist pending, yielding session lock");
            drop(resources);
        };

        self.session.set_query_active(true);
        let fetched = self.fetch(&mut resources, category).await;
        self.session.set_query_active(false);

        let records = fetched?;
        let count = records.len();
        resources.store.append(records);
        self.session.record_query(count as u64);
        Ok(count)
    }

    async fn fetch(
        &self,
        resources: &mut SessionResources<S>,
        category: Category,
    ) -> Result<Vec<Record>> {
        debug!("Requesting {} records", category);
        let response = self
            .session
            .until_cancelled(resources.channel.request_category(category))
            .await??;
        response.into_records(self.session.codec())
    }
}
