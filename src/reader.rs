// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Link reader
//!
//! The [`LinkReader`] owns one [`LineSource`] and turns every call to
//! [`LinkReader::read`] into exactly one [`Outcome`]. It drives the
//! connection through two states:
//!
//! ```text
//! DISCONNECTED --connect ok--> CONNECTED --timeout / transport fault--> DISCONNECTED
//! ```
//!
//! There is no background retry: a disconnected reader simply attempts a
//! connect on its next call. The inactivity timeout is measured from the
//! last *activity* (a successful connect or a poll that found a line), not
//! from the last parsed reading, so a quiet but healthy link stays up.

use std::time::{Duration, Instant};

use crate::channel::LineSource;
use crate::classifier::{DiagnosticReason, DiagnosticTable};
use crate::error::LinkError;
use crate::protocol::Outcome;
use crate::schema::TelemetrySchema;

/// Default inactivity timeout
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(360);

/// Connection state, always derived from the line source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No open connection
    Disconnected,
    /// Connection open
    Connected,
}

/// Reads and classifies lines from a line source
#[derive(Debug)]
pub struct LinkReader<S: LineSource> {
    source: S,
    schema: TelemetrySchema,
    diagnostics: DiagnosticTable,
    timeout: Duration,
    last_activity: Instant,
}

impl<S: LineSource> LinkReader<S> {
    /// Create a reader with the default diagnostic table
    pub fn new(source: S, schema: TelemetrySchema, timeout: Duration) -> Self {
        Self::with_diagnostics(source, schema, DiagnosticTable::default(), timeout)
    }

    /// Create a reader with a custom diagnostic table
    pub fn with_diagnostics(
        source: S,
        schema: TelemetrySchema,
        diagnostics: DiagnosticTable,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            schema,
            diagnostics,
            timeout,
            last_activity: Instant::now(),
        }
    }

    /// Perform one read attempt
    pub fn read(&mut self) -> Outcome {
        self.read_at(Instant::now())
    }

    /// Perform one read attempt as if the current time were `now`
    pub fn read_at(&mut self, now: Instant) -> Outcome {
        if !self.source.is_connected() {
            return match self.source.connect() {
                Ok(()) => {
                    self.last_activity = now;
                    log::debug!("link connected");
                    Outcome::Info("BaseStation connected.".to_string())
                }
                Err(e) => {
                    log::trace!("connect attempt failed: {}", e);
                    Outcome::Debug("BaseStation not connecting.".to_string())
                }
            };
        }

        match self.poll(now) {
            Ok(outcome) => outcome,
            Err(e) if e.drops_link() => {
                log::debug!("link fault: {}", e);
                self.source.disconnect();
                Outcome::Error("BaseStation connection lost.".to_string())
            }
            Err(e) => {
                log::debug!("undecodable line: {}", e);
                Outcome::Error("Data could not be decoded properly.".to_string())
            }
        }
    }

    fn poll(&mut self, now: Instant) -> Result<Outcome, LinkError> {
        if !self.source.has_line_waiting()? {
            if now.saturating_duration_since(self.last_activity) >= self.timeout {
                self.last_activity = now;
                self.source.disconnect();
                return Ok(Outcome::Error(
                    "BaseStation timed out. Disconnecting.".to_string(),
                ));
            }
            return Ok(Outcome::Debug(
                "No data was waiting on serial buffer.".to_string(),
            ));
        }

        self.last_activity = now;
        let line = self.source.read_line()?;
        Ok(self.classify(&line))
    }

    /// Classify one line without touching the link
    pub fn classify(&self, line: &str) -> Outcome {
        if let Some(reading) = self.schema.parse(line) {
            return Outcome::Success(reading);
        }
        let diagnosis = self.diagnostics.classify(line);
        let message = match diagnosis.reason {
            DiagnosticReason::Blank => "Received empty line.".to_string(),
            _ => format!("Received '{}'.", line),
        };
        Outcome::diagnostic(diagnosis.severity, message)
    }

    /// Current connection state
    pub fn state(&self) -> LinkState {
        if self.source.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    /// Whether the link is connected
    pub fn is_connected(&self) -> bool {
        self.source.is_connected()
    }

    /// Time of the last connect or successful poll
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Inactivity timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Schema used to parse telemetry lines
    pub fn schema(&self) -> &TelemetrySchema {
        &self.schema
    }

    /// Diagnostic table used for non-telemetry lines
    pub fn diagnostics(&self) -> &DiagnosticTable {
        &self.diagnostics
    }

    /// Underlying line source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the underlying line source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Release the link
    pub fn close(&mut self) {
        self.source.disconnect();
    }
}
