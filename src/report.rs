// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Severity-leveled reporting sink
//!
//! Every outcome that is not stored as data ends up here. The
//! [`Reporter`] has two independent thresholds: messages at or above the
//! print threshold go to the `log` facade (and from there to whatever
//! subscriber the binary installed), messages at or above the persist
//! threshold are appended to the rotating [`Journal`].

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::journal::Journal;
use crate::protocol::Severity;

/// `log` target of critical messages, so subscribers can route them apart
pub const CRITICAL_TARGET: &str = "basestation::critical";

/// `log` target for a message of `severity`
pub fn log_target(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => CRITICAL_TARGET,
        _ => module_path!(),
    }
}

/// Destination for diagnostic messages
pub trait ReportSink {
    /// Report one message
    fn report(&mut self, message: &str, severity: Severity);

    /// Convenience wrapper for [`Severity::Debug`]
    fn debug(&mut self, message: &str) {
        self.report(message, Severity::Debug);
    }

    /// Convenience wrapper for [`Severity::Info`]
    fn info(&mut self, message: &str) {
        self.report(message, Severity::Info);
    }

    /// Convenience wrapper for [`Severity::Warning`]
    fn warn(&mut self, message: &str) {
        self.report(message, Severity::Warning);
    }

    /// Convenience wrapper for [`Severity::Error`]
    fn error(&mut self, message: &str) {
        self.report(message, Severity::Error);
    }

    /// Convenience wrapper for [`Severity::Critical`]
    fn critical(&mut self, message: &str) {
        self.report(message, Severity::Critical);
    }
}

/// Thresholds for a [`Reporter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Messages at or above this are printed
    pub print_threshold: Severity,
    /// Messages at or above this are persisted
    pub persist_threshold: Severity,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            print_threshold: Severity::Info,
            persist_threshold: Severity::Error,
        }
    }
}

/// Reporting sink backed by `log` and an optional journal
#[derive(Debug)]
pub struct Reporter {
    config: ReportConfig,
    journal: Option<Journal>,
    journal_faults: u64,
}

impl Reporter {
    /// Reporter that only prints
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            journal: None,
            journal_faults: 0,
        }
    }

    /// Reporter that prints and persists to `journal`
    pub fn with_journal(config: ReportConfig, journal: Journal) -> Self {
        Self {
            config,
            journal: Some(journal),
            journal_faults: 0,
        }
    }

    /// Thresholds in use
    pub fn config(&self) -> ReportConfig {
        self.config
    }

    /// Journal, if any
    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Number of journal lines that could not be written
    pub fn journal_faults(&self) -> u64 {
        self.journal_faults
    }
}

impl ReportSink for Reporter {
    fn report(&mut self, message: &str, severity: Severity) {
        if severity >= self.config.print_threshold {
            let target = log_target(severity);
            if severity == Severity::Critical {
                log::log!(target: target, severity.log_level(), "CRITICAL: {}", message);
            } else {
                log::log!(target: target, severity.log_level(), "{}", message);
            }
        }

        if severity < self.config.persist_threshold {
            return;
        }
        if let Some(journal) = self.journal.as_mut() {
            let line = format!(
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                severity,
                message
            );
            if let Err(e) = journal.append(&line) {
                // Only the first failure is surfaced; the rest are counted
                if self.journal_faults == 0 {
                    log::error!("journal unavailable: {}", e);
                }
                self.journal_faults += 1;
            }
        }
    }
}

/// Sink that keeps every message in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    entries: Vec<(Severity, String)>,
}

impl MemoryReporter {
    /// Create an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in order
    pub fn entries(&self) -> &[(Severity, String)] {
        &self.entries
    }

    /// Messages reported at exactly `severity`
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    /// Number of messages at exactly `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|(s, _)| *s == severity).count()
    }

    /// Whether any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|(_, m)| m.contains(needle))
    }

    /// Forget all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ReportSink for MemoryReporter {
    fn report(&mut self, message: &str, severity: Severity) {
        self.entries.push((severity, message.to_string()));
    }
}

impl<R: ReportSink + ?Sized> ReportSink for &mut R {
    fn report(&mut self, message: &str, severity: Severity) {
        (**self).report(message, severity);
    }
}

impl<R: ReportSink + ?Sized> ReportSink for Box<R> {
    fn report(&mut self, message: &str, severity: Severity) {
        (**self).report(message, severity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_thresholds() {
        let config = ReportConfig::default();
        assert_eq!(config.print_threshold, Severity::Info);
        assert_eq!(config.persist_threshold, Severity::Error);
    }

    #[test]
    fn test_persist_threshold() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path().join("errors.log"), 0, 0).unwrap();
        let mut reporter = Reporter::with_journal(ReportConfig::default(), journal);

        reporter.debug("idle");
        reporter.info("connected");
        reporter.warn("out of band");
        reporter.error("timed out");
        reporter.critical("Received 'garbage'.");

        let text = fs::read_to_string(dir.path().join("errors.log")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - ERROR - timed out"));
        assert!(lines[1].ends_with(" - CRITICAL - Received 'garbage'."));
        assert_eq!(reporter.journal_faults(), 0);
    }

    #[test]
    fn test_critical_messages_use_own_target() {
        assert_eq!(log_target(Severity::Critical), CRITICAL_TARGET);
        assert!(CRITICAL_TARGET.starts_with("basestation::"));
        for severity in [Severity::Debug, Severity::Info, Severity::Warning, Severity::Error] {
            assert_eq!(log_target(severity), "basestation::report");
        }
    }

    #[test]
    fn test_persist_everything() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path().join("all.log"), 0, 0).unwrap();
        let config = ReportConfig {
            print_threshold: Severity::Critical,
            persist_threshold: Severity::Debug,
        };
        let mut reporter = Reporter::with_journal(config, journal);
        for severity in Severity::ALL {
            reporter.report("x", severity);
        }
        let text = fs::read_to_string(dir.path().join("all.log")).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_memory_reporter() {
        let mut reporter = MemoryReporter::new();
        reporter.info("a");
        reporter.error("b");
        reporter.error("c");
        assert_eq!(reporter.count(Severity::Error), 2);
        assert_eq!(reporter.messages(Severity::Info), vec!["a"]);
        assert!(reporter.contains("c"));
    }

    #[test]
    fn test_sink_through_reference() {
        let mut inner = MemoryReporter::new();
        {
            let mut sink: &mut MemoryReporter = &mut inner;
            <&mut MemoryReporter as ReportSink>::critical(&mut sink, "boom");
        }
        assert_eq!(inner.count(Severity::Critical), 1);
    }
}
