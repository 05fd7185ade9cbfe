// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Structured telemetry line schema
//!
//! A telemetry line is `sensor_id` followed by a fixed number of channel
//! values, separated by whitespace or commas:
//!
//! ```text
//! 12 1.50000 3 0.75000 3.30000
//! 12,1.50000,3,0.75000,3.30000
//! ```
//!
//! The arity and the type of each channel come from configuration, so the
//! same reader handles both the two-channel and the four-channel firmware.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::protocol::{ChannelValue, Reading, SensorId};

/// Delimiter between fields: a comma (optionally padded) or whitespace
const FIELD_SEPARATOR: &str = r"(?:\s*,\s*|\s+)";
const INTEGER_PATTERN: &str = r"(\d+)";
const DECIMAL_PATTERN: &str = r"(-?\d+(?:\.\d+)?)";

/// Numeric kind of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Unsigned whole number
    Integer,
    /// Decimal number rendered at a fixed precision
    Decimal,
}

/// Description of one channel in a telemetry line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Name used in reading summaries
    pub name: String,
    /// Column header in record files
    pub header: String,
    /// Numeric kind
    pub kind: ChannelKind,
    /// Decimal places when formatting (decimal channels only)
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_precision() -> usize {
    5
}

impl ChannelSpec {
    /// Decimal channel with the default precision
    pub fn decimal(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
            kind: ChannelKind::Decimal,
            precision: default_precision(),
        }
    }

    /// Integer channel
    pub fn integer(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
            kind: ChannelKind::Integer,
            precision: 0,
        }
    }

    /// Set the formatting precision
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn pattern(&self) -> &'static str {
        match self.kind {
            ChannelKind::Integer => INTEGER_PATTERN,
            ChannelKind::Decimal => DECIMAL_PATTERN,
        }
    }

    fn parse(&self, text: &str) -> Option<ChannelValue> {
        match self.kind {
            ChannelKind::Integer => text.parse().ok().map(ChannelValue::Integer),
            ChannelKind::Decimal => text.parse().ok().map(ChannelValue::Decimal),
        }
    }

    /// Format a value of this channel
    pub fn format(&self, value: ChannelValue) -> String {
        value.format(self.precision)
    }
}

/// Inclusive range of acceptable values for the plotted channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodBand {
    /// Lowest good value
    pub low: f64,
    /// Highest good value
    pub high: f64,
}

impl GoodBand {
    /// Create a new band
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Whether `value` lies inside the band
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

impl Default for GoodBand {
    fn default() -> Self {
        Self::new(0.15, 3.15)
    }
}

/// Channel layout of a telemetry line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Channels in wire order
    pub channels: Vec<ChannelSpec>,
    /// Index of the channel that is plotted and range-checked
    pub plot_channel: usize,
    /// Acceptable range for the plotted channel
    pub good_band: GoodBand,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self::smart_anchor()
    }
}

impl SchemaConfig {
    /// Four-channel layout: bridge voltage, range code, log amp, battery
    pub fn smart_anchor() -> Self {
        Self {
            channels: vec![
                ChannelSpec::decimal("wheatstone voltage", "Wheatstone Voltage (V)"),
                ChannelSpec::integer("range", "Range"),
                ChannelSpec::decimal("log amp voltage", "Log Amp Voltage"),
                ChannelSpec::decimal("battery voltage", "Battery Voltage"),
            ],
            plot_channel: 0,
            good_band: GoodBand::default(),
        }
    }

    /// Two-channel layout used by early firmware: voltage and range code
    pub fn voltage_range() -> Self {
        Self {
            channels: vec![
                ChannelSpec::decimal("voltage", "Voltage (V)"),
                ChannelSpec::integer("range", "Range"),
            ],
            plot_channel: 0,
            good_band: GoodBand::default(),
        }
    }
}

/// Compiled telemetry schema
#[derive(Debug, Clone)]
pub struct TelemetrySchema {
    config: SchemaConfig,
    pattern: Regex,
}

impl TelemetrySchema {
    /// Validate the configuration and compile its line pattern
    pub fn new(config: SchemaConfig) -> Result<Self, SchemaError> {
        if config.channels.is_empty() {
            return Err(SchemaError::Empty);
        }
        if config.plot_channel >= config.channels.len() {
            return Err(SchemaError::PlotChannelOutOfRange {
                index: config.plot_channel,
                len: config.channels.len(),
            });
        }
        if config.good_band.low > config.good_band.high {
            return Err(SchemaError::InvertedBand {
                low: config.good_band.low,
                high: config.good_band.high,
            });
        }

        let mut source = String::from(r"^\s*");
        source.push_str(INTEGER_PATTERN);
        for channel in &config.channels {
            source.push_str(FIELD_SEPARATOR);
            source.push_str(channel.pattern());
        }
        source.push_str(r"\s*$");

        let pattern = Regex::new(&source).map_err(|e| SchemaError::Pattern(e.to_string()))?;
        Ok(Self { config, pattern })
    }

    /// Underlying configuration
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Channel specs in wire order
    pub fn channels(&self) -> &[ChannelSpec] {
        &self.config.channels
    }

    /// Number of channels after the sensor id
    pub fn arity(&self) -> usize {
        self.config.channels.len()
    }

    /// Index of the plotted channel
    pub fn plot_channel(&self) -> usize {
        self.config.plot_channel
    }

    /// Good band for the plotted channel
    pub fn good_band(&self) -> GoodBand {
        self.config.good_band
    }

    /// Parse a telemetry line into a reading
    ///
    /// Returns `None` when the line does not have the telemetry shape. A
    /// sensor id of zero or one that overflows is treated as not matching.
    pub fn parse(&self, line: &str) -> Option<Reading> {
        let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        let captures = self.pattern.captures(line)?;

        let sensor_id: SensorId = captures.get(1)?.as_str().parse().ok()?;
        if sensor_id == 0 {
            return None;
        }

        let mut values = Vec::with_capacity(self.arity());
        for (i, channel) in self.config.channels.iter().enumerate() {
            let text = captures.get(i + 2)?.as_str();
            values.push(channel.parse(text)?);
        }

        let summary = self.summarize(sensor_id, &values);
        Some(Reading::new(sensor_id, values, summary))
    }

    /// Summary string: `sensor: 12, wheatstone voltage: 1.50000, range: 3`
    pub fn summarize(&self, sensor_id: SensorId, values: &[ChannelValue]) -> String {
        let mut summary = format!("sensor: {}", sensor_id);
        for (channel, value) in self.config.channels.iter().zip(values) {
            summary.push_str(&format!(", {}: {}", channel.name, channel.format(*value)));
        }
        summary
    }

    /// Render a reading back into wire form (space delimited)
    pub fn format_line(&self, reading: &Reading) -> String {
        let mut line = reading.sensor_id().to_string();
        for (channel, value) in self.config.channels.iter().zip(reading.values()) {
            line.push(' ');
            line.push_str(&channel.format(*value));
        }
        line
    }

    /// Formatted channel values for a record row
    pub fn format_values(&self, reading: &Reading) -> Vec<String> {
        self.config
            .channels
            .iter()
            .zip(reading.values())
            .map(|(channel, value)| channel.format(*value))
            .collect()
    }

    /// Value of the plotted channel
    pub fn plotted_value(&self, reading: &Reading) -> Option<f64> {
        reading.value(self.config.plot_channel).map(|v| v.as_f64())
    }
}
