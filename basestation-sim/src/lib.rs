// BaseStation Sim - Simulated sensor array
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! # BaseStation Sim
//!
//! A simulated sensor array for the BaseStation ecosystem.
//!
//! [`SimulatedArray`] implements the [`LineSource`](basestation::LineSource)
//! contract, so it can stand in for the serial device anywhere the real
//! pipeline runs:
//!
//! - **Realistic readings**: per-sensor baselines with Normal noise, rendered
//!   in the configured schema's wire format
//! - **Fault injection**: firmware status lines, undecodable bytes, quiet
//!   spells, good-band excursions, link drops and failing connects
//! - **Reproducible**: seeded with `StdRng`
//!
//! ## Quick Start
//!
//! ```rust
//! use basestation::LineSource;
//! use basestation_sim::{ArrayConfig, FaultPlan, SimulatedArray};
//!
//! let config = ArrayConfig::new().with_sensors(3).with_seed(42);
//! let mut array = SimulatedArray::with_faults(config, FaultPlan::standard(50)).unwrap();
//!
//! array.connect().unwrap();
//! assert!(array.has_line_waiting().unwrap());
//! let line = array.read_line().unwrap();
//! assert!(line.starts_with("1 "));
//! ```

pub mod array;
pub mod faults;
pub mod generator;

use thiserror::Error;

// Re-exports for convenience
pub use array::{ArrayStats, SimulatedArray, SIM_ENDPOINT};
pub use faults::{Fault, FaultPlan, FIRMWARE_PHRASES};
pub use generator::{ArrayConfig, LineGenerator, Separator, SensorProfile};

/// Errors in a simulator configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// No sensors configured.
    #[error("array needs at least one sensor")]
    NoSensors,

    /// Sensor ids must be positive.
    #[error("first sensor id must be positive")]
    ZeroSensorId,

    /// Noise deviation is negative or not finite.
    #[error("invalid noise standard deviation: {0}")]
    InvalidNoise(f64),

    /// Schema has no channels or its plot channel does not exist.
    #[error("schema cannot be simulated")]
    Schema,
}
