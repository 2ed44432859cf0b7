// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inventory Core Error Types
//!
//! One error enum shared by the ingestion pipeline, the reader lifecycle and the
//! operator command surface. None of these conditions is fatal to the process:
//! callers log them and turn them into operator notices.

use thiserror::Error;

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Inventory error types
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A raw tag report that cannot be turned into a `TagRecord`
    #[error("Malformed tag record: {message}")]
    MalformedRecord { message: String },

    /// A call into an established reader session failed
    #[error("Reader call '{operation}' failed: {message}")]
    DriverCall { operation: String, message: String },

    /// Opening a reader session failed
    #[error("Failed to connect to reader at {address}: {message}")]
    Connect { address: String, message: String },

    /// An operation that needs a live reader session was invoked without one
    #[error("Reader not connected")]
    NotConnected,

    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("Notification sink error: {message}")]
    Sink { message: String },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl InventoryError {
    /// Create a malformed record error
    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    /// Create a driver call failure for the named operation
    pub fn driver_call(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DriverCall {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a connection failure error
    pub fn connect(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Create a configuration error with a specific key
    pub fn configuration_with_key(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Whether the error comes from the reader device rather than from local state
    pub fn is_driver_failure(&self) -> bool {
        matches!(self, Self::DriverCall { .. } | Self::Connect { .. })
    }
}
