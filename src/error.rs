// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Error types for the base station
//!
//! This module defines all error types used throughout the library.
//! Most of them never escape the driver loop: the link reader turns
//! [`LinkError`]s into [`Outcome`](crate::protocol::Outcome)s and the driver
//! reports [`StorageError`]s and keeps going.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for base station operations
pub type Result<T> = std::result::Result<T, BaseStationError>;

/// Main error type for base station operations
#[derive(Error, Debug)]
pub enum BaseStationError {
    /// Link error
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Errors raised by a line source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Endpoint could not be opened
    #[error("Could not connect to {endpoint}: {reason}")]
    ConnectFailure { endpoint: String, reason: String },

    /// No endpoint matched the configured hint
    #[error("No endpoint available (hint: {hint})")]
    NoEndpoint { hint: String },

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Link dropped mid-session
    #[error("Transport fault: {reason}")]
    Transport { reason: String },

    /// Received bytes are not valid text
    #[error("Decode fault: {reason}")]
    Decode { reason: String },
}

impl LinkError {
    /// Whether this fault means the connection is gone
    pub fn drops_link(&self) -> bool {
        matches!(self, LinkError::Transport { .. } | LinkError::NotConnected)
    }
}

/// Errors while persisting records or journal lines
#[derive(Error, Debug)]
pub enum StorageError {
    /// Directory could not be created
    #[error("Cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File could not be opened
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be written
    #[error("Cannot write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Journal line could not be appended or the journal rolled
    #[error("Cannot append to {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Data could not be forced to the device
    #[error("Cannot sync {}: {source}", path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Path of the file or directory that failed
    pub fn path(&self) -> &std::path::Path {
        match self {
            StorageError::CreateDir { path, .. }
            | StorageError::Open { path, .. }
            | StorageError::Write { path, .. }
            | StorageError::Append { path, .. }
            | StorageError::Sync { path, .. } => path,
        }
    }
}

/// Errors while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for this layout
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Errors describing a telemetry schema that cannot be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// No channels configured
    #[error("Schema has no channels")]
    Empty,

    /// Plot channel index does not exist
    #[error("Plot channel {index} out of range (schema has {len} channels)")]
    PlotChannelOutOfRange { index: usize, len: usize },

    /// Good band bounds are reversed
    #[error("Good band is inverted: low {low} > high {high}")]
    InvertedBand { low: f64, high: f64 },

    /// Compiled pattern was rejected
    #[error("Invalid pattern: {0}")]
    Pattern(String),
}
