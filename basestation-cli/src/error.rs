// BaseStation CLI - Serial base station command-line tool
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Error type for the command-line tool

use std::path::PathBuf;

use basestation::{BaseStationError, ConfigError, LinkError, StorageError};
use basestation_sim::SimError;
use thiserror::Error;

/// Anything that stops a subcommand
#[derive(Error, Debug)]
pub enum CliError {
    /// Pipeline failure
    #[error(transparent)]
    BaseStation(#[from] BaseStationError),

    /// Bad configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output could not be prepared
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Device unusable
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Simulator misconfigured
    #[error("Simulator error: {0}")]
    Sim(#[from] SimError),

    /// Signal handler could not be installed
    #[error("Cannot install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Port enumeration failed
    #[error("Cannot list serial ports: {0}")]
    Serial(#[from] serialport::Error),

    /// Feedback record could not be written
    #[error("Cannot write {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory could not be created
    #[error("Cannot create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for subcommands
pub type Result<T> = std::result::Result<T, CliError>;
