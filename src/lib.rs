// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! # BaseStation - Sensor array telemetry ingestion
//!
//! Reads line-oriented telemetry from a sensor array over a serial link,
//! records every reading to per-sensor rotating files and feeds a
//! downsampled view to a pluggable rendering surface.
//!
//! ## Key Features
//!
//! - **Resilient link**: connect, reconnect and inactivity timeout handled
//!   by a small state machine that never blocks
//! - **Typed outcomes**: every read attempt yields exactly one [`Outcome`]
//! - **Durable records**: one CSV stream per sensor, synced on every write,
//!   rotated together on a wall-clock interval
//! - **Bounded plotting**: readings are averaged per sensor per tick
//!
//! ## Quick Start
//!
//! ```rust
//! use basestation::{LinkReader, MemoryLineSource, Outcome, SchemaConfig, TelemetrySchema};
//! use std::time::Duration;
//!
//! let mut source = MemoryLineSource::connected();
//! source.push_line("12 1.50000 3 0.75000 3.30000");
//!
//! let schema = TelemetrySchema::new(SchemaConfig::default()).unwrap();
//! let mut reader = LinkReader::new(source, schema, Duration::from_secs(10));
//!
//! match reader.read() {
//!     Outcome::Success(reading) => assert_eq!(reading.sensor_id(), 12),
//!     other => panic!("unexpected {}", other),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Severities, readings and outcomes
//! - [`schema`]: Telemetry line layout and parsing
//! - [`classifier`]: Diagnostic line classification
//! - [`channel`]: Line source abstraction
//! - [`reader`]: Link state machine
//! - [`recorder`]: Rotating per-sensor record streams
//! - [`journal`]: Rotating diagnostic journal
//! - [`aggregator`]: Downsampling between plot ticks
//! - [`render`]: Rendering surface abstraction
//! - [`report`]: Severity-leveled reporting sink
//! - [`metrics`]: Pipeline counters
//! - [`config`]: Configuration
//! - [`driver`]: The driver loop

// Modules
pub mod aggregator;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod error;
pub mod journal;
pub mod metrics;
pub mod protocol;
pub mod reader;
pub mod recorder;
pub mod render;
pub mod report;
pub mod schema;

// Re-exports for convenient access
pub use aggregator::{series_label, Downsampler, PlotPoint};
pub use channel::{select_endpoint, Endpoint, Feed, LineSource, MemoryLineSource};
pub use classifier::{Diagnosis, DiagnosticReason, DiagnosticRule, DiagnosticTable};
pub use config::{BaseStationConfig, LinkConfig, OutputConfig, ScheduleConfig};
pub use driver::{record_header, Driver, IntervalTimer, TIMESTAMP_FORMAT};
pub use error::{BaseStationError, ConfigError, LinkError, Result, SchemaError, StorageError};
pub use journal::Journal;
pub use metrics::PipelineMetrics;
pub use protocol::{ChannelValue, Outcome, Reading, SensorId, Severity};
pub use reader::{LinkReader, LinkState, DEFAULT_LINK_TIMEOUT};
pub use recorder::{RecordLayout, Recorder, StreamFailures};
pub use render::{MemorySurface, NullSurface, RenderSurface, SeriesWindow, WindowSurface};
pub use report::{log_target, MemoryReporter, ReportConfig, ReportSink, Reporter, CRITICAL_TARGET};
pub use schema::{ChannelKind, ChannelSpec, GoodBand, SchemaConfig, TelemetrySchema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_read() {
        let mut source = MemoryLineSource::new();
        source.push_line("3, 1.00000, 2, 0.50000, 3.00000");
        let schema = TelemetrySchema::new(SchemaConfig::default()).unwrap();
        let mut reader = LinkReader::new(source, schema, DEFAULT_LINK_TIMEOUT);

        assert_eq!(reader.read().severity(), Severity::Info);
        let outcome = reader.read();
        let reading = outcome.reading().unwrap();
        assert_eq!(reading.sensor_id(), 3);
        assert_eq!(reading.values().len(), 4);
    }
}
