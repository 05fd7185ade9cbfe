// BaseStation Sim - Simulated sensor array
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Fault injection for exercising the link reader and driver loop.
//!
//! Faults are keyed by the 1-based number of the line the array is about
//! to emit. A plan can hold one-off faults and a repeating cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One injected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Fault {
    /// Firmware status line emitted before the reading.
    Diagnostic(String),
    /// Bytes that are not valid UTF-8, emitted before the reading.
    BadBytes,
    /// No line for this many polls; the reading is skipped.
    Quiet(u64),
    /// The link drops; the reading is lost.
    Drop,
    /// The plotted channel of this reading is pushed above the good band.
    OutOfBand,
}

impl Fault {
    /// Whether this fault suppresses the scheduled reading.
    pub fn skips_reading(&self) -> bool {
        matches!(self, Fault::Quiet(_) | Fault::Drop)
    }
}

/// Status phrases the receiver firmware is known to print.
pub const FIRMWARE_PHRASES: [&str; 5] = [
    "Timeout connecting to device",
    "Couldn't connect to device",
    "Couldn't discover attributes of device",
    "Couldn't read data from device",
    "Restarting BaseStation",
];

/// Schedule of faults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultPlan {
    scheduled: BTreeMap<u64, Vec<Fault>>,
    cycle_every: u64,
    cycle: Vec<Fault>,
    /// Connect attempts that fail before the first success.
    pub connect_failures: usize,
}

impl FaultPlan {
    /// Plan with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `fault` at line `line` (1-based).
    pub fn with(mut self, line: u64, fault: Fault) -> Self {
        self.scheduled.entry(line).or_default().push(fault);
        self
    }

    /// Fail the first `n` connect attempts.
    pub fn with_connect_failures(mut self, n: usize) -> Self {
        self.connect_failures = n;
        self
    }

    /// Inject the next fault of `faults` every `every` lines, forever.
    pub fn with_cycle(mut self, every: u64, faults: Vec<Fault>) -> Self {
        self.cycle_every = every;
        self.cycle = faults;
        self
    }

    /// Every firmware phrase, an unknown line, undecodable bytes, a quiet
    /// spell, an excursion and a link drop, one every `every` lines.
    pub fn standard(every: u64) -> Self {
        let mut faults: Vec<Fault> = FIRMWARE_PHRASES
            .iter()
            .map(|p| Fault::Diagnostic(p.to_string()))
            .collect();
        faults.push(Fault::Diagnostic("ERR 0x3f unexpected frame".to_string()));
        faults.push(Fault::BadBytes);
        faults.push(Fault::Quiet(5));
        faults.push(Fault::OutOfBand);
        faults.push(Fault::Drop);
        Self::new().with_cycle(every, faults)
    }

    /// Faults to inject at line `line`.
    pub fn faults_at(&self, line: u64) -> Vec<Fault> {
        let mut faults = self.scheduled.get(&line).cloned().unwrap_or_default();
        if self.cycle_every > 0 && !self.cycle.is_empty() && line > 0 && line % self.cycle_every == 0 {
            let slot = ((line / self.cycle_every - 1) % self.cycle.len() as u64) as usize;
            faults.push(self.cycle[slot].clone());
        }
        faults
    }

    /// Whether nothing will ever be injected.
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty() && self.cycle.is_empty() && self.connect_failures == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled() {
        let plan = FaultPlan::new().with(3, Fault::Drop).with(3, Fault::BadBytes);
        assert!(plan.faults_at(2).is_empty());
        assert_eq!(plan.faults_at(3), vec![Fault::Drop, Fault::BadBytes]);
    }

    #[test]
    fn test_cycle_wraps() {
        let plan = FaultPlan::new().with_cycle(10, vec![Fault::BadBytes, Fault::Drop]);
        assert!(plan.faults_at(0).is_empty());
        assert!(plan.faults_at(5).is_empty());
        assert_eq!(plan.faults_at(10), vec![Fault::BadBytes]);
        assert_eq!(plan.faults_at(20), vec![Fault::Drop]);
        assert_eq!(plan.faults_at(30), vec![Fault::BadBytes]);
    }

    #[test]
    fn test_standard_covers_every_phrase() {
        let plan = FaultPlan::standard(1);
        let faults: Vec<Fault> = (1..=10).flat_map(|i| plan.faults_at(i)).collect();
        for phrase in FIRMWARE_PHRASES {
            assert!(faults.contains(&Fault::Diagnostic(phrase.to_string())));
        }
        assert!(faults.contains(&Fault::Drop));
        assert!(faults.contains(&Fault::BadBytes));
    }

    #[test]
    fn test_skips_reading() {
        assert!(Fault::Drop.skips_reading());
        assert!(Fault::Quiet(3).skips_reading());
        assert!(!Fault::OutOfBand.skips_reading());
        assert!(FaultPlan::new().is_empty());
        assert!(!FaultPlan::new().with_connect_failures(1).is_empty());
    }
}
