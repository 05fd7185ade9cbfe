// BaseStation CLI - Serial base station command-line tool
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Feedback sweep
//!
//! Writes a sequence of integer set-points to the device and records what
//! it answers, one `Sent,Received` row per value. Lines that are not an
//! integer (status chatter, telemetry) are skipped while waiting.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use basestation::LineSource;
use tracing::{info, warn};

use crate::error::{CliError, Result};

/// Result of one set-point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// Value written
    pub sent: i64,
    /// Integer answer, if one arrived in time
    pub received: Option<i64>,
}

/// Sweep settings
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Values written in order
    pub values: Vec<i64>,
    /// How long to wait for each answer
    pub response_timeout: Duration,
    /// Pause between polls while waiting
    pub poll_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            values: (0..=100).step_by(10).collect(),
            response_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// File for a sweep started at `started` under `root`
pub fn sweep_path<Tz>(root: &Path, started: &chrono::DateTime<Tz>) -> PathBuf
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    root.join(format!("{}.csv", started.format("%m-%d-%Y_T%H-%M-%S")))
}

/// Run a sweep over a connected source and record it to `path`
pub fn sweep<S: LineSource>(source: &mut S, config: &SweepConfig, path: &Path) -> Result<Vec<Exchange>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CliError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let csv_err = |source: csv::Error| CliError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(["Sent", "Received"]).map_err(csv_err)?;

    let mut exchanges = Vec::with_capacity(config.values.len());
    for &sent in &config.values {
        source.write_line(&sent.to_string())?;
        let received = await_integer(source, config)?;
        match received {
            Some(value) => info!("sent {}, received {}", sent, value),
            None => warn!("sent {}, no answer within {:?}", sent, config.response_timeout),
        }

        let received_text = received.map(|v| v.to_string()).unwrap_or_default();
        writer
            .write_record([sent.to_string(), received_text])
            .map_err(csv_err)?;
        writer.flush().map_err(|e| csv_err(e.into()))?;
        exchanges.push(Exchange { sent, received });
    }

    Ok(exchanges)
}

fn await_integer<S: LineSource>(source: &mut S, config: &SweepConfig) -> Result<Option<i64>> {
    let deadline = Instant::now() + config.response_timeout;
    loop {
        if source.has_line_waiting()? {
            let line = match source.read_line() {
                Ok(line) => line,
                Err(e) if e.drops_link() => return Err(e.into()),
                Err(_) => continue,
            };
            if let Ok(value) = line.trim().parse::<i64>() {
                return Ok(Some(value));
            }
            continue;
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(config.poll_interval);
    }
}
