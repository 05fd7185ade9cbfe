// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Driver loop
//!
//! The [`Driver`] owns every pipeline component and runs them from a single
//! thread. One iteration is one read attempt followed by the periodic
//! aggregation and rotation checks and a bounded rendering slot:
//!
//! ```text
//! LinkReader::read ─┬─ SUCCESS ──> Recorder::record + Downsampler::add + report
//!                   └─ other ────> report
//! plot timer due   ──> Downsampler::tick ──> RenderSurface::plot
//! rotate timer due ──> Recorder::rotate
//! RenderSurface::refresh(budget)
//! ```
//!
//! Shutdown is cooperative: the flag returned by
//! [`Driver::shutdown_handle`] is checked before each iteration, so an
//! iteration in progress always completes before cleanup.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::aggregator::Downsampler;
use crate::channel::LineSource;
use crate::config::{BaseStationConfig, ScheduleConfig};
use crate::error::{Result, StorageError};
use crate::metrics::PipelineMetrics;
use crate::protocol::{Outcome, Reading};
use crate::reader::LinkReader;
use crate::recorder::{RecordLayout, Recorder, StreamFailures};
use crate::render::RenderSurface;
use crate::report::ReportSink;
use crate::schema::TelemetrySchema;

/// Wall-clock format of the first record column
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %I:%M:%S %p";

/// Header of the wall-clock column
pub const TIMESTAMP_HEADER: &str = "Time (mm-dd-yyyy H:M:S)";

/// Header of the elapsed tenths-of-a-second column
pub const DELTA_HEADER: &str = "Time (.1s Delta)";

/// Record header for `schema`: the two time columns, then each channel
pub fn record_header(schema: &TelemetrySchema) -> Vec<String> {
    let mut header = vec![TIMESTAMP_HEADER.to_string(), DELTA_HEADER.to_string()];
    header.extend(schema.channels().iter().map(|c| c.header.clone()));
    header
}

/// Fires once per period, measured from the last time it fired
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    period: Duration,
    last: Instant,
}

impl IntervalTimer {
    /// Create a timer whose first period starts at `start`
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            last: start,
        }
    }

    /// Whether a full period has elapsed; restarts the period if so
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.period {
            self.last = now;
            true
        } else {
            false
        }
    }

    /// Restart the period at `now`
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Timer period
    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Single-threaded ingestion pipeline
pub struct Driver<S: LineSource, P: RenderSurface, R: ReportSink> {
    reader: LinkReader<S>,
    recorder: Recorder,
    downsampler: Downsampler,
    surface: P,
    reporter: R,
    metrics: PipelineMetrics,
    started: Instant,
    plot_timer: IntervalTimer,
    rotate_timer: IntervalTimer,
    refresh_budget: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<S: LineSource, P: RenderSurface, R: ReportSink> Driver<S, P, R> {
    /// Assemble a driver from its components
    pub fn new(
        reader: LinkReader<S>,
        recorder: Recorder,
        surface: P,
        reporter: R,
        schedule: &ScheduleConfig,
    ) -> Self {
        let started = Instant::now();
        Self {
            reader,
            recorder,
            downsampler: Downsampler::new(),
            surface,
            reporter,
            metrics: PipelineMetrics::new(),
            started,
            plot_timer: IntervalTimer::new(schedule.plot_interval(), started),
            rotate_timer: IntervalTimer::new(schedule.rotate_interval(), started),
            refresh_budget: schedule.refresh_budget(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build every component from configuration, writing records to `run_folder`
    pub fn from_config(
        config: &BaseStationConfig,
        source: S,
        run_folder: impl Into<PathBuf>,
        surface: P,
        reporter: R,
    ) -> Result<Self> {
        config.validate()?;
        let schema = config.compile_schema()?;
        let header = record_header(&schema);
        let reader = LinkReader::with_diagnostics(
            source,
            schema,
            config.diagnostics.clone(),
            config.link.timeout(),
        );
        let layout = RecordLayout::new(run_folder).with_pattern(config.output.file_pattern.clone());
        let recorder = Recorder::new(layout, header);
        Ok(Self::new(reader, recorder, surface, reporter, &config.schedule))
    }

    /// Treat `start` as the moment the run began
    ///
    /// Elapsed-time columns and both timers are measured from it.
    pub fn started_at(mut self, start: Instant) -> Self {
        self.started = start;
        self.plot_timer.reset(start);
        self.rotate_timer.reset(start);
        self
    }

    /// Flag that stops [`Driver::run`] after the current iteration
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Ask the loop to stop after the current iteration
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown was requested
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run until shutdown is requested, then clean up
    ///
    /// Only a failure while closing the record streams is returned.
    pub fn run(&mut self) -> Result<()> {
        self.reporter.info("BaseStation ingestion started.");
        while !self.shutdown_requested() {
            self.step();
        }
        self.reporter.critical("Shutdown requested. Closing record files.");
        self.finish()
    }

    /// One iteration at the current time
    pub fn step(&mut self) -> Outcome {
        self.step_at(Instant::now(), Local::now())
    }

    /// One iteration with explicit monotonic and wall-clock times
    pub fn step_at(&mut self, now: Instant, wall: DateTime<Local>) -> Outcome {
        let was_connected = self.reader.is_connected();
        let outcome = self.reader.read_at(now);
        self.metrics.record_outcome(&outcome);
        self.metrics.record_link(was_connected, self.reader.is_connected());

        match &outcome {
            Outcome::Success(reading) => self.ingest(reading, now, wall),
            other => self.reporter.report(other.message(), other.severity()),
        }

        if self.plot_timer.due(now) {
            self.tick(wall);
        }
        if self.rotate_timer.due(now) {
            self.rotate();
        }

        self.surface.refresh(self.refresh_budget);
        outcome
    }

    fn ingest(&mut self, reading: &Reading, now: Instant, wall: DateTime<Local>) {
        let schema = self.reader.schema();
        let timestamp = wall.format(TIMESTAMP_FORMAT).to_string();
        let tenths = now.saturating_duration_since(self.started).as_millis() / 100;

        let mut row = Vec::with_capacity(schema.arity() + 2);
        row.push(timestamp.clone());
        row.push(tenths.to_string());
        row.extend(schema.format_values(reading));

        let plotted = schema.plotted_value(reading);
        let band = schema.good_band();

        let sensor = reading.sensor_id();
        match self.recorder.record(sensor, &row) {
            Ok(()) => self.metrics.records_written += 1,
            Err(e) => {
                self.metrics.storage_faults += 1;
                self.reporter
                    .critical(&format!("Could not record reading for sensor {}: {}", sensor, e));
            }
        }

        let message = format!("{} | {}", timestamp, reading.summary());
        match plotted {
            Some(value) if !band.contains(value) => {
                self.metrics.out_of_band += 1;
                self.downsampler.add(sensor, value);
                self.reporter.warn(&format!(
                    "{} | outside good band [{}, {}]",
                    message, band.low, band.high
                ));
            }
            Some(value) => {
                self.downsampler.add(sensor, value);
                self.reporter.info(&message);
            }
            None => self.reporter.info(&message),
        }
    }

    fn tick(&mut self, wall: DateTime<Local>) {
        let points = self.downsampler.tick(wall);
        self.metrics.ticks += 1;
        self.metrics.points_emitted += points.len() as u64;
        for point in &points {
            self.surface.plot(point.timestamp, point.value, &point.label());
        }
    }

    fn rotate(&mut self) {
        let failures = self.recorder.rotate();
        self.metrics.rotations += 1;
        log::info!(
            "rotated record streams to index {}",
            self.recorder.rotation_index()
        );
        self.report_failures("rotate", failures);
    }

    fn report_failures(&mut self, action: &str, failures: StreamFailures) -> Option<StorageError> {
        let mut first = None;
        for (sensor, e) in failures {
            self.metrics.storage_faults += 1;
            self.reporter.critical(&format!(
                "Could not {} record stream for sensor {}: {}",
                action, sensor, e
            ));
            if first.is_none() {
                first = Some(e);
            }
        }
        first
    }

    /// Close every record stream and release the link
    ///
    /// Safe to call more than once. Returns the first stream that failed
    /// to close; every failure is reported.
    pub fn finish(&mut self) -> Result<()> {
        let failures = self.recorder.close_all();
        let first = self.report_failures("close", failures);
        self.reader.close();
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Link reader
    pub fn reader(&self) -> &LinkReader<S> {
        &self.reader
    }

    /// Mutable access to the link reader
    pub fn reader_mut(&mut self) -> &mut LinkReader<S> {
        &mut self.reader
    }

    /// Record writer
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Aggregation buffers
    pub fn downsampler(&self) -> &Downsampler {
        &self.downsampler
    }

    /// Rendering surface
    pub fn surface(&self) -> &P {
        &self.surface
    }

    /// Reporting sink
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Counters so far
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Moment the run began
    pub fn started(&self) -> Instant {
        self.started
    }
}

impl<S, P, R> std::fmt::Debug for Driver<S, P, R>
where
    S: LineSource + std::fmt::Debug,
    P: RenderSurface,
    R: ReportSink,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("reader", &self.reader)
            .field("recorder", &self.recorder)
            .field("downsampler", &self.downsampler)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryLineSource;
    use crate::journal::Journal;
    use crate::protocol::Severity;
    use crate::render::MemorySurface;
    use crate::report::{MemoryReporter, ReportConfig, Reporter};
    use chrono::TimeZone;
    use tempfile::TempDir;

    type TestDriver = Driver<MemoryLineSource, MemorySurface, MemoryReporter>;

    fn driver(dir: &TempDir, source: MemoryLineSource) -> (TestDriver, Instant) {
        let config = BaseStationConfig::default();
        let start = Instant::now();
        let driver = Driver::from_config(
            &config,
            source,
            dir.path(),
            MemorySurface::new(),
            MemoryReporter::new(),
        )
        .unwrap()
        .started_at(start);
        (driver, start)
    }

    fn wall() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_interval_timer() {
        let start = Instant::now();
        let mut timer = IntervalTimer::new(Duration::from_secs(60), start);
        assert!(!timer.due(start + Duration::from_secs(59)));
        assert!(timer.due(start + Duration::from_secs(60)));
        assert!(!timer.due(start + Duration::from_secs(61)));
        assert!(timer.due(start + Duration::from_secs(120)));
    }

    #[test]
    fn test_record_header() {
        let schema = BaseStationConfig::default().compile_schema().unwrap();
        assert_eq!(
            record_header(&schema),
            vec![
                "Time (mm-dd-yyyy H:M:S)",
                "Time (.1s Delta)",
                "Wheatstone Voltage (V)",
                "Range",
                "Log Amp Voltage",
                "Battery Voltage",
            ]
        );
    }

    #[test]
    fn test_success_is_recorded_and_buffered() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("12 1.50000 3 0.75000 3.30000");
        let (mut driver, start) = driver(&dir, source);

        let outcome = driver.step_at(start + Duration::from_millis(2_345), wall());
        assert!(outcome.is_success());

        let text = std::fs::read_to_string(dir.path().join("day1-sensor12.csv")).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Time (mm-dd-yyyy H:M:S)"));
        assert_eq!(
            lines.next().unwrap(),
            "03-01-2024 02:05:09 PM,23,1.50000,3,0.75000,3.30000"
        );

        assert_eq!(driver.downsampler().pending(12), 1);
        assert_eq!(driver.metrics().records_written, 1);
        let infos = driver.reporter().messages(Severity::Info);
        assert_eq!(infos.len(), 1);
        assert!(infos[0].contains("sensor: 12, wheatstone voltage: 1.50000"));
    }

    #[test]
    fn test_out_of_band_is_warning_but_kept() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("4 3.20000 1 0.10000 3.30000");
        let (mut driver, start) = driver(&dir, source);

        driver.step_at(start, wall());
        assert_eq!(driver.reporter().count(Severity::Warning), 1);
        assert_eq!(driver.metrics().out_of_band, 1);
        assert_eq!(driver.downsampler().pending(4), 1);
        assert_eq!(driver.recorder().stream_records(4), Some(1));
    }

    #[test]
    fn test_diagnostics_are_only_reported() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("Restarting BaseStation");
        source.push_line("something odd");
        let (mut driver, start) = driver(&dir, source);

        driver.step_at(start, wall());
        driver.step_at(start, wall());

        assert_eq!(driver.reporter().messages(Severity::Error), vec!["Received 'Restarting BaseStation'."]);
        assert_eq!(driver.reporter().count(Severity::Critical), 1);
        assert_eq!(driver.recorder().stream_count(), 0);
        assert_eq!(driver.downsampler().total_pending(), 0);
    }

    #[test]
    fn test_tick_plots_means() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("1 2.00000 1 0.5 3.3");
        source.push_line("1 1.00000 1 0.5 3.3");
        let (mut driver, start) = driver(&dir, source);

        driver.step_at(start + Duration::from_secs(1), wall());
        driver.step_at(start + Duration::from_secs(2), wall());
        assert!(driver.surface().points.is_empty());

        driver.step_at(start + Duration::from_secs(60), wall());
        assert_eq!(driver.surface().series("sensor1"), vec![1.5]);
        assert_eq!(driver.downsampler().total_pending(), 0);
        assert_eq!(driver.metrics().ticks, 1);
        assert_eq!(driver.surface().refreshes, 3);
    }

    #[test]
    fn test_rotation_timer() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("7 1.0 1 0.5 3.3");
        source.push_line("7 1.0 1 0.5 3.3");
        let (mut driver, start) = driver(&dir, source);

        driver.step_at(start, wall());
        driver.step_at(start + Duration::from_secs(86_400), wall());

        assert_eq!(driver.recorder().rotation_index(), 2);
        assert!(dir.path().join("day1-sensor7.csv").exists());
        assert!(dir.path().join("day2-sensor7.csv").exists());
        assert_eq!(driver.metrics().rotations, 1);
    }

    #[test]
    fn test_storage_fault_reported_and_loop_continues() {
        let dir = TempDir::new().unwrap();
        let mut config = BaseStationConfig::default();
        config.output.file_pattern = "{sensor}/day{index}.csv".to_string();
        // A plain file where sensor 3's directory should go
        std::fs::write(dir.path().join("3"), "not a directory").unwrap();

        let mut source = MemoryLineSource::connected();
        source.push_line("3 1.0 1 0.5 3.3");
        source.push_line("5 1.0 1 0.5 3.3");
        let mut driver = Driver::from_config(
            &config,
            source,
            dir.path(),
            MemorySurface::new(),
            MemoryReporter::new(),
        )
        .unwrap();

        driver.step_at(Instant::now(), wall());
        driver.step_at(Instant::now(), wall());

        assert_eq!(driver.reporter().count(Severity::Critical), 1);
        assert!(driver.reporter().contains("sensor 3"));
        assert_eq!(driver.metrics().storage_faults, 1);
        assert_eq!(driver.recorder().stream_records(5), Some(1));
        // Ingestion continues for the sensor whose storage failed
        assert_eq!(driver.downsampler().pending(3), 1);
    }

    #[test]
    fn test_run_stops_on_shutdown_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut source = MemoryLineSource::connected();
        source.push_line("2 1.0 1 0.5 3.3");
        let (mut driver, start) = driver(&dir, source);
        driver.step_at(start, wall());
        assert_eq!(driver.recorder().stream_count(), 1);

        driver.request_shutdown();
        driver.run().unwrap();

        assert_eq!(driver.recorder().stream_count(), 0);
        assert!(!driver.reader().is_connected());
        assert_eq!(
            driver.reporter().messages(Severity::Critical),
            vec!["Shutdown requested. Closing record files."]
        );
    }

    #[test]
    fn test_shutdown_reaches_journal() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path().join("errors.log"), 0, 0).unwrap();
        let reporter = Reporter::with_journal(ReportConfig::default(), journal);
        let config = BaseStationConfig::default();
        let mut driver = Driver::from_config(
            &config,
            MemoryLineSource::connected(),
            dir.path(),
            MemorySurface::new(),
            reporter,
        )
        .unwrap();

        driver.request_shutdown();
        driver.run().unwrap();

        let text = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - CRITICAL - Shutdown requested. Closing record files."));
    }

    #[test]
    fn test_link_transitions_counted() {
        let dir = TempDir::new().unwrap();
        let (mut driver, start) = driver(&dir, MemoryLineSource::new());

        driver.step_at(start, wall());
        driver.step_at(start + Duration::from_secs(400), wall());

        assert_eq!(driver.metrics().connects, 1);
        assert_eq!(driver.metrics().disconnects, 1);
        assert!(driver.reporter().contains("timed out"));
    }
}
