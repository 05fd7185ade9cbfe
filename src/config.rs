// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Configuration types for the base station
//!
//! Every section has working defaults, so an empty TOML document is a valid
//! configuration. Durations are written as whole seconds (or milliseconds
//! where the name says so).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::DiagnosticTable;
use crate::error::{ConfigError, SchemaError};
use crate::protocol::Severity;
use crate::journal::{DEFAULT_BACKUPS, DEFAULT_MAX_BYTES};
use crate::recorder::DEFAULT_FILE_PATTERN;
use crate::report::ReportConfig;
use crate::schema::{SchemaConfig, TelemetrySchema};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseStationConfig {
    /// Serial link settings
    pub link: LinkConfig,
    /// Telemetry line layout
    pub schema: SchemaConfig,
    /// Diagnostic line classification
    pub diagnostics: DiagnosticTable,
    /// Output locations
    pub output: OutputConfig,
    /// Periodic work
    pub schedule: ScheduleConfig,
    /// Reporting thresholds
    pub report: ReportConfig,
}

impl BaseStationConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check that the values can be used together
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile_schema()?;

        let intervals = [
            ("link.timeout_secs", self.link.timeout_secs),
            ("schedule.plot_interval_secs", self.schedule.plot_interval_secs),
            ("schedule.rotate_interval_secs", self.schedule.rotate_interval_secs),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.link.baud_rate == 0 {
            return Err(invalid("link.baud_rate", "must be greater than zero"));
        }
        if !self.output.file_pattern.contains("{sensor}") {
            return Err(invalid(
                "output.file_pattern",
                "must contain {sensor} so streams do not collide",
            ));
        }
        if !self.output.file_pattern.contains("{index}") {
            return Err(invalid(
                "output.file_pattern",
                "must contain {index} so rotation opens new files",
            ));
        }
        for rule in self.diagnostics.rules() {
            if !is_diagnostic_severity(rule.severity) {
                return Err(invalid(
                    "diagnostics.rules",
                    format!("rule '{}' must be debug, error or critical", rule.prefix),
                ));
            }
        }
        if !is_diagnostic_severity(self.diagnostics.fallback()) {
            return Err(invalid("diagnostics.fallback", "must be debug, error or critical"));
        }
        if self.output.journal_name.is_empty() {
            return Err(invalid("output.journal_name", "must not be empty"));
        }
        Ok(())
    }

    /// Compile the telemetry schema
    pub fn compile_schema(&self) -> Result<TelemetrySchema, ConfigError> {
        TelemetrySchema::new(self.schema.clone()).map_err(|e| schema_invalid(&e))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Receiver chatter is only ever reported at these levels
fn is_diagnostic_severity(severity: Severity) -> bool {
    matches!(severity, Severity::Debug | Severity::Error | Severity::Critical)
}

fn schema_invalid(err: &SchemaError) -> ConfigError {
    let field = match err {
        SchemaError::Empty | SchemaError::Pattern(_) => "schema.channels",
        SchemaError::PlotChannelOutOfRange { .. } => "schema.plot_channel",
        SchemaError::InvertedBand { .. } => "schema.good_band",
    };
    invalid(field, err.to_string())
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Endpoint name (e.g. `/dev/ttyACM0` or `COM3`); auto-detect when unset
    pub port: Option<String>,
    /// Substring looked for in endpoint descriptions when auto-detecting
    pub detect: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout of the port, in milliseconds
    pub read_timeout_ms: u64,
    /// Inactivity timeout before the link is dropped, in seconds
    pub timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            detect: "USB".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 100,
            timeout_secs: 360,
        }
    }
}

impl LinkConfig {
    /// Create a configuration for a fixed port
    pub fn with_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Default::default()
        }
    }

    /// Inactivity timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Per-read port timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding one folder per run
    pub root: PathBuf,
    /// `chrono` format of the run folder name
    pub run_folder_format: String,
    /// Record file name pattern with `{index}` and `{sensor}` placeholders
    pub file_pattern: String,
    /// Diagnostic journal file name inside the run folder
    pub journal_name: String,
    /// Journal size before rolling over, in bytes
    pub journal_max_bytes: u64,
    /// Rolled journal files kept
    pub journal_backups: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./logs"),
            run_folder_format: "%m-%d-%Y_T%H-%M-%S".to_string(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            journal_name: "errors.log".to_string(),
            journal_max_bytes: DEFAULT_MAX_BYTES,
            journal_backups: DEFAULT_BACKUPS,
        }
    }
}

impl OutputConfig {
    /// Create a configuration writing under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Folder for a run started at `started`
    pub fn run_folder<Tz>(&self, started: &chrono::DateTime<Tz>) -> PathBuf
    where
        Tz: chrono::TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        self.root
            .join(started.format(&self.run_folder_format).to_string())
    }
}

/// Periodic work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Aggregation (plot) interval, in seconds
    pub plot_interval_secs: u64,
    /// Record file rotation interval, in seconds
    pub rotate_interval_secs: u64,
    /// Time given to the rendering surface per iteration, in milliseconds
    pub refresh_budget_ms: u64,
    /// Visible range of the plot window, in seconds
    pub plot_window_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            plot_interval_secs: 60,
            rotate_interval_secs: 86_400,
            refresh_budget_ms: 300,
            plot_window_secs: 86_400,
        }
    }
}

impl ScheduleConfig {
    /// Aggregation interval
    pub fn plot_interval(&self) -> Duration {
        Duration::from_secs(self.plot_interval_secs)
    }

    /// Rotation interval
    pub fn rotate_interval(&self) -> Duration {
        Duration::from_secs(self.rotate_interval_secs)
    }

    /// Rendering budget per iteration
    pub fn refresh_budget(&self) -> Duration {
        Duration::from_millis(self.refresh_budget_ms)
    }

    /// Visible plot range
    pub fn plot_window(&self) -> Duration {
        Duration::from_secs(self.plot_window_secs)
    }
}
