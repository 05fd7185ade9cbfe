// BaseStation Sim - Simulated sensor array
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Simulated sensor array behind the line source contract.

use std::collections::VecDeque;
use std::time::Instant;

use basestation::channel::{Endpoint, LineSource};
use basestation::error::LinkError;

use crate::faults::{Fault, FaultPlan};
use crate::generator::{ArrayConfig, LineGenerator};
use crate::SimError;

/// Name the simulated endpoint is enumerated under.
pub const SIM_ENDPOINT: &str = "sim://array";

#[derive(Debug, Clone)]
enum Pending {
    Line(String),
    Bytes(Vec<u8>),
}

/// Counts of what the array has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayStats {
    /// Line slots consumed (readings and skipped slots).
    pub slots: u64,
    /// Reading lines emitted.
    pub readings: u64,
    /// Injected faults.
    pub faults: u64,
    /// Link drops.
    pub drops: u64,
    /// Successful connects.
    pub connects: u64,
}

/// A sensor array that produces telemetry lines on demand.
///
/// A new line slot opens every time `has_line_waiting` finds the buffer
/// empty (and, with a line interval configured, enough time has passed).
/// Faults scheduled for that slot are applied before its reading.
#[derive(Debug)]
pub struct SimulatedArray {
    generator: LineGenerator,
    plan: FaultPlan,
    pending: VecDeque<Pending>,
    connected: bool,
    connect_failures_left: usize,
    quiet_polls: u64,
    last_slot: Option<Instant>,
    echo: bool,
    written: Vec<String>,
    stats: ArrayStats,
}

impl SimulatedArray {
    /// Create an array with no faults.
    pub fn new(config: ArrayConfig) -> Result<Self, SimError> {
        Self::with_faults(config, FaultPlan::new())
    }

    /// Create an array following `plan`.
    pub fn with_faults(config: ArrayConfig, plan: FaultPlan) -> Result<Self, SimError> {
        Ok(Self {
            generator: LineGenerator::new(config)?,
            connect_failures_left: plan.connect_failures,
            plan,
            pending: VecDeque::new(),
            connected: false,
            quiet_polls: 0,
            last_slot: None,
            echo: true,
            written: Vec::new(),
            stats: ArrayStats::default(),
        })
    }

    /// Whether integer lines written to the array are echoed back.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Lines written to the array.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Activity counters.
    pub fn stats(&self) -> ArrayStats {
        self.stats
    }

    /// Line generator.
    pub fn generator(&self) -> &LineGenerator {
        &self.generator
    }

    fn slot_open(&mut self) -> bool {
        let Some(interval) = self.generator.config().line_interval else {
            return true;
        };
        let now = Instant::now();
        match self.last_slot {
            Some(last) if now.duration_since(last) < interval => false,
            _ => {
                self.last_slot = Some(now);
                true
            }
        }
    }

    fn open_slot(&mut self) -> Result<(), LinkError> {
        self.stats.slots += 1;
        let faults = self.plan.faults_at(self.stats.slots);
        self.stats.faults += faults.len() as u64;

        let mut skip = false;
        let mut out_of_band = false;
        for fault in faults {
            skip |= fault.skips_reading();
            match fault {
                Fault::Diagnostic(text) => self.pending.push_back(Pending::Line(text)),
                Fault::BadBytes => self.pending.push_back(Pending::Bytes(vec![0xff, 0xfe, b'1', b'2'])),
                Fault::Quiet(polls) => self.quiet_polls += polls,
                Fault::OutOfBand => out_of_band = true,
                Fault::Drop => {
                    self.connected = false;
                    self.pending.clear();
                    self.stats.drops += 1;
                    return Err(LinkError::Transport {
                        reason: "simulated link drop".to_string(),
                    });
                }
            }
        }

        if !skip {
            let line = self.generator.next_line(out_of_band);
            self.pending.push_back(Pending::Line(line));
            self.stats.readings += 1;
        }
        Ok(())
    }
}

impl LineSource for SimulatedArray {
    fn connect(&mut self) -> Result<(), LinkError> {
        if self.connect_failures_left > 0 {
            self.connect_failures_left -= 1;
            return Err(LinkError::ConnectFailure {
                endpoint: SIM_ENDPOINT.to_string(),
                reason: "simulated connect failure".to_string(),
            });
        }
        self.connected = true;
        self.stats.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.pending.clear();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn has_line_waiting(&mut self) -> Result<bool, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if !self.pending.is_empty() {
            return Ok(true);
        }
        if self.quiet_polls > 0 {
            self.quiet_polls -= 1;
            return Ok(false);
        }
        if !self.slot_open() {
            return Ok(false);
        }
        self.open_slot()?;
        Ok(!self.pending.is_empty())
    }

    fn read_line(&mut self) -> Result<String, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        match self.pending.pop_front() {
            Some(Pending::Line(line)) => Ok(line),
            Some(Pending::Bytes(bytes)) => String::from_utf8(bytes).map_err(|e| LinkError::Decode {
                reason: e.to_string(),
            }),
            None => Err(LinkError::Transport {
                reason: "read with no data waiting".to_string(),
            }),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.written.push(line.to_string());
        if self.echo {
            if let Ok(value) = line.trim().parse::<i64>() {
                self.pending.push_back(Pending::Line(value.to_string()));
            }
        }
        Ok(())
    }

    fn enumerate_endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::new(SIM_ENDPOINT, "Simulated sensor array (USB)")]
    }
}
