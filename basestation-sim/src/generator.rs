// BaseStation Sim - Simulated sensor array
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Telemetry line generation.
//!
//! Each simulated sensor holds a fixed baseline per channel; every reading
//! adds Normal noise to the decimal channels and renders the values in the
//! configured schema's wire format.

use std::time::Duration;

use basestation::protocol::{ChannelValue, SensorId};
use basestation::schema::{ChannelKind, SchemaConfig};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Field delimiter in generated lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    /// Single space.
    #[default]
    Space,
    /// Comma followed by a space.
    Comma,
}

impl Separator {
    fn as_str(&self) -> &'static str {
        match self {
            Separator::Space => " ",
            Separator::Comma => ", ",
        }
    }
}

/// Simulated array configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Number of sensors.
    pub sensor_count: usize,
    /// Id of the first sensor; the rest follow consecutively.
    pub first_id: SensorId,
    /// Standard deviation of the noise on decimal channels.
    pub noise_std: f64,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Field delimiter.
    pub separator: Separator,
    /// Minimum wall-clock time between lines (None = one line per poll).
    pub line_interval: Option<Duration>,
    /// Layout of the generated lines.
    pub schema: SchemaConfig,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            sensor_count: 4,
            first_id: 1,
            noise_std: 0.02,
            seed: None,
            separator: Separator::Space,
            line_interval: None,
            schema: SchemaConfig::default(),
        }
    }
}

impl ArrayConfig {
    /// Create a new array config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of sensors.
    pub fn with_sensors(mut self, n: usize) -> Self {
        self.sensor_count = n;
        self
    }

    /// Set the first sensor id.
    pub fn with_first_id(mut self, id: SensorId) -> Self {
        self.first_id = id;
        self
    }

    /// Set noise standard deviation.
    pub fn with_noise(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set field delimiter.
    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    /// Emit at most one line per `interval` of wall-clock time.
    pub fn with_line_interval(mut self, interval: Duration) -> Self {
        self.line_interval = Some(interval);
        self
    }

    /// Set line layout.
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.sensor_count == 0 {
            return Err(SimError::NoSensors);
        }
        if self.first_id == 0 {
            return Err(SimError::ZeroSensorId);
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(SimError::InvalidNoise(self.noise_std));
        }
        if self.schema.channels.is_empty() || self.schema.plot_channel >= self.schema.channels.len() {
            return Err(SimError::Schema);
        }
        Ok(())
    }
}

/// Per-sensor baselines.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorProfile {
    /// Sensor id.
    pub id: SensorId,
    /// Baseline value of each channel, in schema order.
    pub baselines: Vec<f64>,
}

/// Generates telemetry lines for every sensor in turn.
#[derive(Debug, Clone)]
pub struct LineGenerator {
    config: ArrayConfig,
    profiles: Vec<SensorProfile>,
    rng: StdRng,
    noise: Normal<f64>,
    cursor: usize,
}

impl LineGenerator {
    /// Create a generator from a validated configuration.
    pub fn new(config: ArrayConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise =
            Normal::new(0.0, config.noise_std).map_err(|_| SimError::InvalidNoise(config.noise_std))?;

        let band = config.schema.good_band;
        let n = config.sensor_count;
        let profiles = (0..n)
            .map(|i| {
                let baselines = config
                    .schema
                    .channels
                    .iter()
                    .enumerate()
                    .map(|(c, channel)| match channel.kind {
                        ChannelKind::Integer => rng.gen_range(1..=5) as f64,
                        ChannelKind::Decimal if c == config.schema.plot_channel => {
                            // Spread sensors evenly across the good band
                            band.low + (band.high - band.low) * (i + 1) as f64 / (n + 1) as f64
                        }
                        ChannelKind::Decimal => rng.gen_range(0.5..3.3),
                    })
                    .collect();
                SensorProfile {
                    id: config.first_id + i as SensorId,
                    baselines,
                }
            })
            .collect();

        Ok(Self {
            config,
            profiles,
            rng,
            noise,
            cursor: 0,
        })
    }

    /// Sensor profiles.
    pub fn profiles(&self) -> &[SensorProfile] {
        &self.profiles
    }

    /// Configuration in use.
    pub fn config(&self) -> &ArrayConfig {
        &self.config
    }

    /// Next reading line; the plotted channel is pushed out of band if asked.
    pub fn next_line(&mut self, out_of_band: bool) -> String {
        let profile = &self.profiles[self.cursor];
        self.cursor = (self.cursor + 1) % self.profiles.len();

        let schema = &self.config.schema;
        let mut fields = vec![profile.id.to_string()];
        for (c, (channel, baseline)) in schema.channels.iter().zip(&profile.baselines).enumerate() {
            let value = match channel.kind {
                ChannelKind::Integer => ChannelValue::Integer(*baseline as i64),
                ChannelKind::Decimal if out_of_band && c == schema.plot_channel => {
                    ChannelValue::Decimal(schema.good_band.high + 0.5)
                }
                ChannelKind::Decimal => {
                    let noisy = baseline + self.noise.sample(&mut self.rng);
                    ChannelValue::Decimal(noisy.max(0.0))
                }
            };
            fields.push(channel.format(value));
        }
        fields.join(self.config.separator.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basestation::schema::TelemetrySchema;

    #[test]
    fn test_lines_parse() {
        let config = ArrayConfig::new().with_sensors(3).with_seed(42);
        let schema = TelemetrySchema::new(config.schema.clone()).unwrap();
        let mut generator = LineGenerator::new(config).unwrap();

        let ids: Vec<_> = (0..6)
            .map(|_| {
                let line = generator.next_line(false);
                schema.parse(&line).unwrap().sensor_id()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_reproducible() {
        let config = ArrayConfig::new().with_seed(7);
        let mut a = LineGenerator::new(config.clone()).unwrap();
        let mut b = LineGenerator::new(config).unwrap();
        for _ in 0..10 {
            assert_eq!(a.next_line(false), b.next_line(false));
        }
    }

    #[test]
    fn test_baselines_inside_band() {
        let generator = LineGenerator::new(ArrayConfig::new().with_sensors(5).with_seed(1)).unwrap();
        let band = generator.config().schema.good_band;
        for profile in generator.profiles() {
            assert!(band.contains(profile.baselines[0]));
        }
    }

    #[test]
    fn test_out_of_band_and_comma() {
        let config = ArrayConfig::new()
            .with_sensors(1)
            .with_seed(3)
            .with_separator(Separator::Comma);
        let schema = TelemetrySchema::new(config.schema.clone()).unwrap();
        let mut generator = LineGenerator::new(config).unwrap();

        let line = generator.next_line(true);
        assert!(line.contains(", "));
        let reading = schema.parse(&line).unwrap();
        assert!(!schema.good_band().contains(schema.plotted_value(&reading).unwrap()));
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            ArrayConfig::new().with_sensors(0).validate(),
            Err(SimError::NoSensors)
        ));
        assert!(matches!(
            ArrayConfig::new().with_first_id(0).validate(),
            Err(SimError::ZeroSensorId)
        ));
        assert!(matches!(
            ArrayConfig::new().with_noise(-1.0).validate(),
            Err(SimError::InvalidNoise(_))
        ));
    }
}
