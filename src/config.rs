//! # Configuration Management
//!
//! Centralized configuration for the framing server.
//!
//! This module provides structured configuration for the server core:
//! admission limits, frame-size caps, and the handshake deadline.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - `max_frame_size` bounds the allocation a single length prefix can
//!   demand (decompression-bomb-style claims are rejected before allocation)
//! - `max_connections` bounds concurrent connection tasks
//! - the default handshake deadline prevents a silent peer from parking a
//!   connection task in the verification read forever

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Max allowed frame payload size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default cap on simultaneously live connections
pub const MAX_CONNECTIONS: usize = 1000;

/// Default deadline for the address-verification round-trip
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum number of simultaneously live connections; connections
    /// accepted past this limit are dropped before admission.
    pub max_connections: usize,

    /// Maximum frame payload size in bytes, enforced on both the decode
    /// and encode paths.
    pub max_frame_size: usize,

    /// Deadline for the handshake round-trip. `None` lets a silent peer
    /// block its connection task indefinitely, matching the historical
    /// behavior of the protocol.
    #[serde(with = "opt_duration_serde")]
    pub handshake_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            max_frame_size: MAX_FRAME_SIZE,
            handshake_timeout: Some(HANDSHAKE_TIMEOUT),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.max_frame_size == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_size > u32::MAX as usize {
            errors.push(format!(
                "Max frame size not representable in a length prefix: {} (maximum: {})",
                self.max_frame_size,
                u32::MAX
            ));
        }

        if let Some(timeout) = self.handshake_timeout {
            if timeout.as_millis() < 100 {
                errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
            } else if timeout.as_secs() > 300 {
                errors.push("Handshake timeout too long (maximum: 300s)".to_string());
            }
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Option<Duration> serialization as milliseconds;
/// absent or zero means "no deadline".
mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.map_or(0, |d| d.as_millis() as u64);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        if millis == 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(millis)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_empty());
    }

    #[test]
    fn zero_max_connections_rejected() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn unrepresentable_frame_size_rejected() {
        let config = ServerConfig {
            max_frame_size: u32::MAX as usize + 1,
            ..ServerConfig::default()
        };
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let config = ServerConfig::from_toml(
            "max_connections = 8\nmax_frame_size = 4096\nhandshake_timeout = 2500\n",
        )
        .expect("should parse");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.handshake_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let config =
            ServerConfig::from_toml("handshake_timeout = 0\n").expect("should parse");
        assert_eq!(config.handshake_timeout, None);
        assert!(config.validate().is_empty());
    }
}
