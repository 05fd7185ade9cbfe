// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Pipeline counters
//!
//! This module keeps simple counts of what the driver loop has seen and
//! done, rendered as a human-readable report at shutdown.

use std::collections::BTreeMap;

use crate::protocol::{Outcome, Severity};

/// Counters collected by the driver loop
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    /// Read attempts performed
    pub iterations: u64,
    /// Outcomes by reporting severity (SUCCESS counts as INFO)
    pub outcomes: BTreeMap<Severity, u64>,
    /// Readings parsed
    pub readings: u64,
    /// Readings whose plotted value fell outside the good band
    pub out_of_band: u64,
    /// Records durably written
    pub records_written: u64,
    /// Storage faults (record, rotation or close)
    pub storage_faults: u64,
    /// Aggregation ticks performed
    pub ticks: u64,
    /// Points handed to the rendering surface
    pub points_emitted: u64,
    /// Rotations performed
    pub rotations: u64,
    /// Transitions into the connected state
    pub connects: u64,
    /// Transitions out of the connected state
    pub disconnects: u64,
}

impl PipelineMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        self.iterations += 1;
        *self.outcomes.entry(outcome.severity()).or_insert(0) += 1;
        if outcome.is_success() {
            self.readings += 1;
        }
    }

    /// Record a change in link state
    pub fn record_link(&mut self, was_connected: bool, is_connected: bool) {
        match (was_connected, is_connected) {
            (false, true) => self.connects += 1,
            (true, false) => self.disconnects += 1,
            _ => {}
        }
    }

    /// Outcomes counted at `severity`
    pub fn outcomes_at(&self, severity: Severity) -> u64 {
        self.outcomes.get(&severity).copied().unwrap_or(0)
    }

    /// Fraction of read attempts that produced a reading (0.0 - 1.0)
    pub fn reading_ratio(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.readings as f64 / self.iterations as f64
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== BaseStation Pipeline Metrics ===\n\n");

        report.push_str(&format!("Read attempts: {}\n", self.iterations));
        report.push_str(&format!(
            "Readings: {} ({:.1}% of attempts)\n",
            self.readings,
            self.reading_ratio() * 100.0
        ));
        report.push_str(&format!("Out of band: {}\n", self.out_of_band));
        report.push_str(&format!("Records written: {}\n", self.records_written));
        report.push_str(&format!("Storage faults: {}\n", self.storage_faults));
        report.push_str(&format!(
            "Ticks: {} ({} points)\n",
            self.ticks, self.points_emitted
        ));
        report.push_str(&format!("Rotations: {}\n", self.rotations));
        report.push_str(&format!(
            "Connects: {}, disconnects: {}\n\n",
            self.connects, self.disconnects
        ));

        report.push_str("Outcomes by severity:\n");
        for severity in Severity::ALL {
            let count = self.outcomes_at(severity);
            if count > 0 {
                report.push_str(&format!("  {}: {}\n", severity, count));
            }
        }

        report
    }
}
