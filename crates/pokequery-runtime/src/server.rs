//! Query server
//!
//! [`QueryServer`] binds the listener and serves exactly one client.
//! [`ScanEngine`] is the per-connection control loop: it reacts to client
//! frames, starts at most one [`ScanWorker`] at a time and applies pause and
//! unpause to the running worker.
//!
//! Frames are read by a dedicated reader task and forwarded over a channel,
//! so the control loop can wait on frames and worker completion together.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use pokequery_core::{
    Category, ChannelError, ClientFrame, FrameReader, FrameWriter, PokequeryError,
    PokequeryResult, RecordCodec, ResourceError, ServerConfig, ServerFrame,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::scan::{ScanRequest, ScanSummary, ScanWorker, SharedWriter};

// ----------------------------------------------------------------------------
// Server Scan State
// ----------------------------------------------------------------------------

/// Categories received this session and the position of the next scan
#[derive(Debug, Default)]
pub struct ScanState {
    pending: Vec<Category>,
    cursor: usize,
}

impl ScanState {
    pub fn enqueue(&mut self, category: Category) {
        self.pending.push(category);
    }

    /// Take the next category to scan
    pub fn next(&mut self) -> Option<Category> {
        let category = self.pending.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(category)
    }

    /// Every category received, scanned or not
    pub fn received(&self) -> &[Category] {
        &self.pending
    }

    pub fn waiting(&self) -> usize {
        self.pending.len() - self.cursor
    }
}

/// Counters for one served session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerSummary {
    pub requests_received: u64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub frames_skipped: u64,
}

// ----------------------------------------------------------------------------
// Query Server
// ----------------------------------------------------------------------------

/// TCP front end serving one client per server lifetime
pub struct QueryServer {
    listener: TcpListener,
    config: ServerConfig,
}

impl QueryServer {
    pub async fn bind(config: ServerConfig) -> PokequeryResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| ResourceError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        info!("Listening on {}", config.listen_addr);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> PokequeryResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ResourceError::Accept(e).into())
    }

    /// Accept one client and serve it until it stops or disconnects
    pub async fn serve_one(self, dataset: PathBuf) -> PokequeryResult<ServerSummary> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(ResourceError::Accept)?;
        info!("Client connected from {}", peer);
        ScanEngine::new(stream, dataset, &self.config).run().await
    }
}

// ----------------------------------------------------------------------------
// Scan Engine
// ----------------------------------------------------------------------------

/// Control loop for one client connection
pub struct ScanEngine<S> {
    reader: Option<FrameReader<ReadHalf<S>>>,
    writer: SharedWriter<tokio::io::WriteHalf<S>>,
    dataset: PathBuf,
    codec: RecordCodec,
    state: ScanState,
    pause: watch::Sender<bool>,
    worker: Option<JoinHandle<PokequeryResult<ScanSummary>>>,
    summary: ServerSummary,
}

impl<S> ScanEngine<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S, dataset: PathBuf, config: &ServerConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: Some(FrameReader::new(read_half, config.max_frame_size)),
            writer: Arc::new(Mutex::new(FrameWriter::new(
                write_half,
                config.max_frame_size,
            ))),
            dataset,
            codec: RecordCodec::new(&config.codec),
            state: ScanState::default(),
            pause: watch::Sender::new(false),
            worker: None,
            summary: ServerSummary::default(),
        }
    }

    /// Serve until `Stop`, end of stream, or a failed write
    pub async fn run(mut self) -> PokequeryResult<ServerSummary> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| PokequeryError::worker_failed("scan engine already ran"))?;
        let (frame_tx, mut frames) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_frames(reader, frame_tx));

        let outcome = self.control_loop(&mut frames).await;

        // A paused worker could never finish
        self.pause.send_replace(false);
        if let Some(handle) = self.worker.take() {
            debug!("Waiting for scan worker to finish");
            let joined = handle.await;
            self.record_outcome(joined);
        }
        reader_task.abort();
        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!("Closing connection: {}", e);
        }

        info!(
            "Shutting down: {} request(s), {} scan(s) completed, {} failed",
            self.summary.requests_received, self.summary.scans_completed, self.summary.scans_failed
        );
        outcome.map(|()| self.summary)
    }

    async fn control_loop(
        &mut self,
        frames: &mut mpsc::UnboundedReceiver<ReaderEvent>,
    ) -> PokequeryResult<()> {
        loop {
            tokio::select! {
                event = frames.recv() => match event {
                    Some(ReaderEvent::Frame(frame)) => {
                        if !self.handle_frame(frame).await? {
                            return Ok(());
                        }
                    }
                    Some(ReaderEvent::Skipped) => self.summary.frames_skipped += 1,
                    None => {
                        info!("Client disconnected");
                        return Ok(());
                    }
                },
                joined = join_worker(&mut self.worker) => {
                    self.worker = None;
                    self.record_outcome(joined);
                    self.start_next_scan();
                }
            }
        }
    }

    /// Returns false once the session should end
    async fn handle_frame(&mut self, frame: ClientFrame) -> PokequeryResult<bool> {
        debug!("Received {} frame", frame.kind());
        match frame {
            ClientFrame::CategoryRequest { category } => {
                self.summary.requests_received += 1;
                self.state.enqueue(category);
                self.start_next_scan();
            }
            ClientFrame::Pause => {
                let applied = self.worker_active();
                if applied {
                    self.pause.send_replace(true);
                    info!("Scan paused");
                } else {
                    info!("Pause requested with no scan running");
                }
                self.reply(ServerFrame::PauseAck { applied }).await?;
            }
            ClientFrame::Unpause => {
                let resumed = self.pause.send_replace(false);
                if resumed {
                    info!("Scan resumed");
                }
                self.reply(ServerFrame::UnpauseAck { resumed }).await?;
            }
            ClientFrame::Stop => {
                info!("Stop received");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn reply(&self, frame: ServerFrame) -> Result<(), ChannelError> {
        self.writer.lock().await.write_frame(&frame).await
    }

    fn worker_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a worker for the next category unless one is running
    fn start_next_scan(&mut self) {
        if self.worker.is_some() {
            debug!("Scan in progress, {} request(s) waiting", self.state.waiting());
            return;
        }
        let Some(category) = self.state.next() else {
            return;
        };
        let worker = ScanWorker::new(
            ScanRequest {
                dataset: self.dataset.clone(),
                category,
            },
            self.codec,
            self.pause.subscribe(),
            Arc::clone(&self.writer),
        );
        self.worker = Some(tokio::spawn(worker.run()));
    }

    fn record_outcome(&mut self, joined: Result<PokequeryResult<ScanSummary>, JoinError>) {
        match joined {
            Ok(Ok(summary)) => {
                self.summary.scans_completed += 1;
                debug!(
                    "Scan for {} done: {} of {} line(s) matched",
                    summary.category, summary.matched, summary.lines_scanned
                );
            }
            Ok(Err(e)) => {
                self.summary.scans_failed += 1;
                warn!("Scan failed: {}", e);
            }
            Err(e) => {
                self.summary.scans_failed += 1;
                error!("Scan worker panicked: {}", e);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Frame Reader Task
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum ReaderEvent {
    Frame(ClientFrame),
    Skipped,
}

/// Forward frames until end of stream or an unrecoverable read error
async fn read_frames<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    frames: mpsc::UnboundedSender<ReaderEvent>,
) {
    loop {
        let event = match reader.read_frame::<ClientFrame>().await {
            Ok(Some(frame)) => ReaderEvent::Frame(frame),
            Ok(None) => break,
            Err(ChannelError::Codec(e)) => {
                warn!("Skipping undecodable frame: {}", e);
                ReaderEvent::Skipped
            }
            Err(e) => {
                warn!("Connection read failed: {}", e);
                break;
            }
        };
        if frames.send(event).is_err() {
            break;
        }
    }
}

/// Resolves when the worker finishes; never resolves without a worker
async fn join_worker<T>(
    worker: &mut Option<JoinHandle<T>>,
) -> Result<T, JoinError> {
    match worker {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
