// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Core data types flowing through the pipeline
//!
//! A read attempt on the link produces exactly one [`Outcome`]: either a
//! parsed [`Reading`] or a diagnostic message tagged with a severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one sensor in the array (always positive)
pub type SensorId = u32;

/// Reporting severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    /// Debugging chatter
    Debug = 1,
    /// Informational message
    #[default]
    Info = 2,
    /// Suspicious but usable data
    Warning = 3,
    /// Recoverable fault
    Error = 4,
    /// Unknown input or unexpected failure
    Critical = 5,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Convert from the numeric level (1-5)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Severity::Debug),
            2 => Some(Severity::Info),
            3 => Some(Severity::Warning),
            4 => Some(Severity::Error),
            5 => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Matching `log` level
    pub fn log_level(&self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Critical => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One parsed channel value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelValue {
    /// Whole-number channel (range codes and the like)
    Integer(i64),
    /// Fixed-precision decimal channel
    Decimal(f64),
}

impl ChannelValue {
    /// Numeric value as a float
    pub fn as_f64(&self) -> f64 {
        match *self {
            ChannelValue::Integer(v) => v as f64,
            ChannelValue::Decimal(v) => v,
        }
    }

    /// Render with the given decimal precision (ignored for integers)
    pub fn format(&self, precision: usize) -> String {
        match *self {
            ChannelValue::Integer(v) => v.to_string(),
            ChannelValue::Decimal(v) => format!("{:.*}", precision, v),
        }
    }
}

impl From<ChannelValue> for f64 {
    fn from(value: ChannelValue) -> Self {
        value.as_f64()
    }
}

/// One successfully parsed telemetry record
///
/// Built only by the link reader; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    sensor_id: SensorId,
    values: Vec<ChannelValue>,
    summary: String,
}

impl Reading {
    /// Create a new reading
    pub fn new(sensor_id: SensorId, values: Vec<ChannelValue>, summary: impl Into<String>) -> Self {
        Self {
            sensor_id,
            values,
            summary: summary.into(),
        }
    }

    /// Sensor that produced the reading
    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    /// Channel values in schema order
    pub fn values(&self) -> &[ChannelValue] {
        &self.values
    }

    /// Channel value at `index`
    pub fn value(&self, index: usize) -> Option<ChannelValue> {
        self.values.get(index).copied()
    }

    /// Channel values as floats
    pub fn as_f64s(&self) -> Vec<f64> {
        self.values.iter().map(ChannelValue::as_f64).collect()
    }

    /// Human-readable summary
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// Result of one read attempt on the link
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A telemetry line was parsed
    Success(Reading),
    /// Informational event (e.g. connected)
    Info(String),
    /// Debugging chatter (idle poll, device discovery messages)
    Debug(String),
    /// Recoverable fault
    Error(String),
    /// Unrecognized input
    Critical(String),
}

impl Outcome {
    /// Reporting severity; a success counts as informational
    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Success(_) | Outcome::Info(_) => Severity::Info,
            Outcome::Debug(_) => Severity::Debug,
            Outcome::Error(_) => Severity::Error,
            Outcome::Critical(_) => Severity::Critical,
        }
    }

    /// Diagnostic outcome for a severity
    ///
    /// `Warning` has no outcome of its own and maps to `Error`.
    pub fn diagnostic(severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        match severity {
            Severity::Debug => Outcome::Debug(message),
            Severity::Info => Outcome::Info(message),
            Severity::Warning | Severity::Error => Outcome::Error(message),
            Severity::Critical => Outcome::Critical(message),
        }
    }

    /// Message text (the summary for a success)
    pub fn message(&self) -> &str {
        match self {
            Outcome::Success(reading) => reading.summary(),
            Outcome::Info(m) | Outcome::Debug(m) | Outcome::Error(m) | Outcome::Critical(m) => m,
        }
    }

    /// Whether this outcome carries a reading
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The reading, if any
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            Outcome::Success(reading) => Some(reading),
            _ => None,
        }
    }

    /// Short tag used in counters and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "SUCCESS",
            Outcome::Info(_) => "INFO",
            Outcome::Debug(_) => "DEBUG",
            Outcome::Error(_) => "ERROR",
            Outcome::Critical(_) => "CRITICAL",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_from_u8() {
        for severity in Severity::ALL {
            assert_eq!(Severity::from_u8(severity as u8), Some(severity));
        }
        assert_eq!(Severity::from_u8(0), None);
        assert_eq!(Severity::from_u8(6), None);
    }

    #[test]
    fn test_success_is_informational() {
        let reading = Reading::new(1, vec![ChannelValue::Decimal(1.0)], "sensor: 1");
        let outcome = Outcome::Success(reading);
        assert_eq!(outcome.severity(), Severity::Info);
        assert!(outcome.severity() < Outcome::Error(String::new()).severity());
        assert!(outcome.severity() > Outcome::Debug(String::new()).severity());
    }

    #[test]
    fn test_channel_value_format() {
        assert_eq!(ChannelValue::Decimal(1.5).format(5), "1.50000");
        assert_eq!(ChannelValue::Integer(3).format(5), "3");
        assert_eq!(ChannelValue::Decimal(0.123456).format(2), "0.12");
    }

    #[test]
    fn test_outcome_diagnostic() {
        assert!(matches!(
            Outcome::diagnostic(Severity::Warning, "x"),
            Outcome::Error(_)
        ));
        assert_eq!(
            Outcome::diagnostic(Severity::Critical, "boom").message(),
            "boom"
        );
    }

    #[test]
    fn test_outcome_display() {
        let outcome = Outcome::Error("timed out".to_string());
        assert_eq!(outcome.to_string(), "[ERROR] timed out");
    }
}
