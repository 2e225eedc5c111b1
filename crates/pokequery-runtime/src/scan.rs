//! Server scan worker
//!
//! One worker performs one full pass over the dataset for one category,
//! honoring the server pause flag between lines, then sends the three-part
//! response while holding the shared writer so no other frame interleaves.

use std::path::PathBuf;
use std::sync::Arc;

use pokequery_core::{
    Category, FrameWriter, PokequeryResult, RecordCodec, ResourceError, ServerFrame,
};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Writer shared between the control loop and the scan worker
pub type SharedWriter<W> = Arc<Mutex<FrameWriter<W>>>;

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

/// What one scan worker should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub dataset: PathBuf,
    pub category: Category,
}

/// Result of one completed scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub category: Category,
    /// Data lines examined, header excluded
    pub lines_scanned: usize,
    pub matched: usize,
    pub payload_bytes: usize,
}

// ----------------------------------------------------------------------------
// Scan Worker
// ----------------------------------------------------------------------------

pub struct ScanWorker<W> {
    request: ScanRequest,
    codec: RecordCodec,
    pause: watch::Receiver<bool>,
    writer: SharedWriter<W>,
}

impl<W: AsyncWrite + Unpin> ScanWorker<W> {
    pub fn new(
        request: ScanRequest,
        codec: RecordCodec,
        pause: watch::Receiver<bool>,
        writer: SharedWriter<W>,
    ) -> Self {
        Self {
            request,
            codec,
            pause,
            writer,
        }
    }

    /// Scan, then reply with the three-part response or a failure frame
    pub async fn run(mut self) -> PokequeryResult<ScanSummary> {
        let category = self.request.category;
        info!("Scanning {} for {}", self.request.dataset.display(), category);

        let (matches, lines_scanned) = match self.scan().await {
            Ok(scanned) => scanned,
            Err(e) => {
                warn!("Scan for {} failed: {}", category, e);
                let failure = ServerFrame::Failure {
                    reason: e.to_string(),
                };
                self.writer.lock().await.write_frame(&failure).await?;
                return Err(e);
            }
        };

        let payload = self.codec.join_payload(&matches);
        let summary = ScanSummary {
            category,
            lines_scanned,
            matched: matches.len(),
            payload_bytes: payload.len(),
        };

        let mut writer = self.writer.lock().await;
        writer
            .write_frame(&ServerFrame::SizeHeader {
                bytes: payload.len() as u64,
            })
            .await?;
        writer
            .write_frame(&ServerFrame::Payload { records: payload })
            .await?;
        writer
            .write_frame(&ServerFrame::CountHeader {
                count: summary.matched as u64,
            })
            .await?;
        drop(writer);

        info!(
            "Sent {} {} record(s) ({} bytes)",
            summary.matched, category, summary.payload_bytes
        );
        Ok(summary)
    }

    /// Collect matching lines in file order
    async fn scan(&mut self) -> PokequeryResult<(Vec<String>, usize)> {
        let path = &self.request.dataset;
        let file = File::open(path).await.map_err(|source| ResourceError::Open {
            path: path.clone(),
            source,
        })?;
        let read_err = |source| ResourceError::Read {
            path: path.clone(),
            source,
        };

        let mut lines = BufReader::new(file).lines();
        // Header
        lines.next_line().await.map_err(read_err)?;

        let mut matches = Vec::new();
        let mut scanned = 0;
        while let Some(line) = lines.next_line().await.map_err(read_err)? {
            if *self.pause.borrow() {
                debug!("Scan paused");
                let _ = self.pause.wait_for(|paused| !*paused).await;
                debug!("Scan resumed");
            }
            scanned += 1;

            if line.trim().is_empty() {
                continue;
            }
            match self.codec.category_field(&line) {
                Some(field) if self.request.category.matches(field) => matches.push(line),
                Some(_) => {}
                None => debug!("Skipping short line {}", scanned),
            }
        }
        Ok((matches, scanned))
    }
}
