//! Configuration Management
//!
//! Settings shared by the server engine and the client session: endpoint
//! addresses, frame limits and codec separators. Every struct has sensible
//! defaults, builder-style setters and a `validate` check that runs before
//! anything binds or connects.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{PokequeryError, Result};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Well-known service port
pub const DEFAULT_PORT: u16 = 6000;

/// Largest frame body accepted on the control channel (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ----------------------------------------------------------------------------
// Codec Configuration
// ----------------------------------------------------------------------------

/// Separators used by the record line codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Separates fields within one record line
    pub field_separator: char,
    /// Separates record lines within one query payload
    pub record_separator: char,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            field_separator: ',',
            record_separator: '|',
        }
    }
}

impl CodecConfig {
    pub fn with_field_separator(mut self, separator: char) -> Self {
        self.field_separator = separator;
        self
    }

    pub fn with_record_separator(mut self, separator: char) -> Self {
        self.record_separator = separator;
        self
    }

    /// Validate separator choice
    pub fn validate(&self) -> Result<()> {
        for separator in [self.field_separator, self.record_separator] {
            if separator == '\n' || separator == '\r' {
                return Err(PokequeryError::config_error(
                    "Separators cannot be line terminators",
                ));
            }
        }
        if self.field_separator == self.record_separator {
            return Err(PokequeryError::config_error(
                "Field and record separators must differ",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Server Configuration
// ----------------------------------------------------------------------------

/// Configuration for the query server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub listen_addr: String,
    /// Dataset to scan; prompted for interactively when absent
    pub dataset_path: Option<PathBuf>,
    /// Maximum accepted frame body in bytes
    pub max_frame_size: usize,
    pub codec: CodecConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            dataset_path: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            codec: CodecConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_listen_addr<T: Into<String>>(mut self, addr: T) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_dataset<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(PokequeryError::config_error("Listen address cannot be empty"));
        }
        if self.max_frame_size == 0 {
            return Err(PokequeryError::config_error("Max frame size cannot be zero"));
        }
        self.codec.validate()
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Configuration for the query client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address of the query server
    pub server_addr: String,
    /// Maximum accepted frame body in bytes
    pub max_frame_size: usize,
    pub codec: CodecConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            codec: CodecConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_server_addr<T: Into<String>>(mut self, addr: T) -> Self {
        self.server_addr = addr.into();
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(PokequeryError::config_error("Server address cannot be empty"));
        }
        if self.max_frame_size == 0 {
            return Err(PokequeryError::config_error("Max frame size cannot be zero"));
        }
        self.codec.validate()
    }
}
