//! Persist destinations
//!
//! The persist coordinator hands encoded record lines to a [`RecordSink`].
//! [`FileSink`] appends them to files on disk; [`MemorySink`] keeps them in
//! memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pokequery_core::{PokequeryResult, ResourceError};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

// ----------------------------------------------------------------------------
// Record Sink Trait
// ----------------------------------------------------------------------------

/// Named destination that accepts record lines
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append `lines` to `destination`, one per line, creating it if needed
    async fn append_lines(&self, destination: &str, lines: &[String]) -> PokequeryResult<()>;
}

// ----------------------------------------------------------------------------
// File Sink
// ----------------------------------------------------------------------------

/// Appends to files, relative to an optional base directory
#[derive(Debug, Clone, Default)]
pub struct FileSink {
    base_dir: Option<PathBuf>,
}

impl FileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Path a destination name resolves to
    pub fn resolve(&self, destination: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(destination),
            None => Path::new(destination).to_path_buf(),
        }
    }
}

#[async_trait]
impl RecordSink for FileSink {
    async fn append_lines(&self, destination: &str, lines: &[String]) -> PokequeryResult<()> {
        let path = self.resolve(destination);
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|source| ResourceError::Open {
                path: path.clone(),
                source,
            })?;

        let write_err = |source| ResourceError::Write {
            path: path.clone(),
            source,
        };
        let mut writer = BufWriter::new(file);
        for line in lines {
            writer.write_all(line.as_bytes()).await.map_err(write_err)?;
            writer.write_all(b"\n").await.map_err(write_err)?;
        }
        writer.flush().await.map_err(write_err)?;

        debug!("Appended {} line(s) to {}", lines.len(), path.display());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Memory Sink
// ----------------------------------------------------------------------------

/// Keeps appended lines per destination in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    destinations: Mutex<HashMap<String, Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line appended to `destination` so far
    pub fn contents(&self, destination: &str) -> Vec<String> {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append_lines(&self, destination: &str, lines: &[String]) -> PokequeryResult<()> {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(destination.to_string())
            .or_default()
            .extend_from_slice(lines);
        Ok(())
    }
}
