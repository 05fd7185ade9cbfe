// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Diagnostic line classification
//!
//! Lines that do not match the telemetry schema are status chatter from the
//! receiver firmware. They are sorted into severities by an ordered table
//! of literal prefixes; the first rule that matches wins and anything no
//! rule recognizes is critical.

use serde::{Deserialize, Serialize};

use crate::protocol::Severity;

/// One prefix rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRule {
    /// Literal prefix the line must start with
    pub prefix: String,
    /// Severity assigned on match
    pub severity: Severity,
}

impl DiagnosticRule {
    /// Create a new rule
    pub fn new(prefix: impl Into<String>, severity: Severity) -> Self {
        Self {
            prefix: prefix.into(),
            severity,
        }
    }

    /// Whether this rule matches `line`
    pub fn matches(&self, line: &str) -> bool {
        line.starts_with(&self.prefix)
    }
}

/// Why a line received its severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticReason {
    /// Matched the rule at this index
    Rule(usize),
    /// Line was empty after trimming
    Blank,
    /// No rule matched
    Unrecognized,
}

/// Classification of one diagnostic line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    /// Assigned severity
    pub severity: Severity,
    /// Reason for the severity
    pub reason: DiagnosticReason,
}

/// Ordered prefix table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticTable {
    rules: Vec<DiagnosticRule>,
    #[serde(default = "default_fallback")]
    fallback: Severity,
}

fn default_fallback() -> Severity {
    Severity::Critical
}

impl Default for DiagnosticTable {
    fn default() -> Self {
        Self {
            rules: vec![
                DiagnosticRule::new("Timeout connecting to device", Severity::Debug),
                DiagnosticRule::new("Couldn't connect to device", Severity::Debug),
                DiagnosticRule::new("Couldn't discover attributes of device", Severity::Debug),
                DiagnosticRule::new("Couldn't read data from device", Severity::Debug),
                DiagnosticRule::new("Restarting BaseStation", Severity::Error),
            ],
            fallback: default_fallback(),
        }
    }
}

impl DiagnosticTable {
    /// Table with no rules; everything falls through to the fallback
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            fallback: default_fallback(),
        }
    }

    /// Append a rule (checked after the existing ones)
    pub fn with_rule(mut self, prefix: impl Into<String>, severity: Severity) -> Self {
        self.rules.push(DiagnosticRule::new(prefix, severity));
        self
    }

    /// Set the severity for unrecognized lines
    pub fn with_fallback(mut self, severity: Severity) -> Self {
        self.fallback = severity;
        self
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[DiagnosticRule] {
        &self.rules
    }

    /// Severity for unrecognized lines
    pub fn fallback(&self) -> Severity {
        self.fallback
    }

    /// Classify a diagnostic line
    pub fn classify(&self, line: &str) -> Diagnosis {
        if line.trim().is_empty() {
            return Diagnosis {
                severity: Severity::Debug,
                reason: DiagnosticReason::Blank,
            };
        }

        self.rules
            .iter()
            .position(|rule| rule.matches(line))
            .map(|index| Diagnosis {
                severity: self.rules[index].severity,
                reason: DiagnosticReason::Rule(index),
            })
            .unwrap_or(Diagnosis {
                severity: self.fallback,
                reason: DiagnosticReason::Unrecognized,
            })
    }
}
