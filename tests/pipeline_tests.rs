// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! End-to-end pipeline tests
//!
//! Drive the full pipeline headless: scripted or simulated line source,
//! real record files in a temp directory, in-memory surface and reporter.

use std::fs;
use std::time::{Duration, Instant};

use basestation::*;
use basestation_sim::{ArrayConfig, Fault, FaultPlan, SimulatedArray, FIRMWARE_PHRASES};
use chrono::{Local, TimeZone};
use tempfile::TempDir;

fn wall(second: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, 1, 9, 0, second).unwrap()
}

fn config() -> BaseStationConfig {
    let mut config = BaseStationConfig::default();
    config.link.timeout_secs = 10;
    config.schedule.plot_interval_secs = 5;
    config.schedule.rotate_interval_secs = 30;
    config
}

#[test]
fn test_every_line_yields_one_outcome() {
    let dir = TempDir::new().unwrap();
    let mut source = MemoryLineSource::new();
    source.push_line("12 1.50000 3 0.75000 3.30000");
    source.push_line("Couldn't connect to device");
    source.push_line("Restarting BaseStation");
    source.push_line("");
    source.push_line("12 1.5 3");
    source.push_bytes(vec![0xc3, 0x28]);
    source.push_drop();

    let mut driver = Driver::from_config(
        &config(),
        source,
        dir.path(),
        MemorySurface::new(),
        MemoryReporter::new(),
    )
    .unwrap();

    let start = Instant::now();
    let severities: Vec<Severity> = (0..8)
        .map(|i| driver.step_at(start + Duration::from_millis(i * 10), wall(0)).severity())
        .collect();

    assert_eq!(
        severities,
        vec![
            Severity::Info,     // connected
            Severity::Info,     // reading
            Severity::Debug,    // discovery chatter
            Severity::Error,    // restart
            Severity::Debug,    // blank line
            Severity::Critical, // wrong arity
            Severity::Error,    // undecodable
            Severity::Error,    // connection lost
        ]
    );
    assert!(!driver.reader().is_connected());
    assert_eq!(driver.metrics().readings, 1);
    assert_eq!(driver.recorder().stream_count(), 1);
    assert!(driver.reporter().contains("Received 'Restarting BaseStation'."));
    assert!(driver.reporter().contains("BaseStation connection lost."));
}

#[test]
fn test_unique_sensors_get_one_header_each() {
    let dir = TempDir::new().unwrap();
    let mut source = MemoryLineSource::connected();
    for sensor in [3, 1, 3, 2, 1, 3] {
        source.push_line(format!("{} 1.00000 2 0.50000 3.00000", sensor));
    }
    let mut driver = Driver::from_config(
        &config(),
        source,
        dir.path(),
        NullSurface,
        MemoryReporter::new(),
    )
    .unwrap();

    let start = Instant::now();
    for _ in 0..6 {
        driver.step_at(start, wall(0));
    }

    assert_eq!(driver.recorder().stream_count(), 3);
    assert_eq!(driver.recorder().headers_written(), 3);
    for (sensor, rows) in [(1, 2), (2, 1), (3, 3)] {
        let text = fs::read_to_string(dir.path().join(format!("day1-sensor{}.csv", sensor))).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), rows + 1);
        assert!(lines[0].starts_with("Time (mm-dd-yyyy H:M:S),Time (.1s Delta)"));
    }
}

#[test]
fn test_rotation_starts_new_files_with_header() {
    let dir = TempDir::new().unwrap();
    let mut config = config();
    config.link.timeout_secs = 3600;
    let mut source = MemoryLineSource::connected();
    source.push_line("8 1.00000 2 0.50000 3.00000");
    let start = Instant::now();
    let mut driver = Driver::from_config(
        &config,
        source,
        dir.path(),
        NullSurface,
        MemoryReporter::new(),
    )
    .unwrap()
    .started_at(start);

    driver.step_at(start, wall(0));
    // Idle step past the rotation interval reopens every stream
    driver.step_at(start + Duration::from_secs(30), wall(30));
    assert_eq!(driver.recorder().rotation_index(), 2);

    driver
        .reader_mut()
        .source_mut()
        .push_line("8 1.10000 2 0.50000 3.00000");
    driver.step_at(start + Duration::from_secs(31), wall(31));

    let day1 = fs::read_to_string(dir.path().join("day1-sensor8.csv")).unwrap();
    assert_eq!(day1.lines().count(), 2);
    let day2 = fs::read_to_string(dir.path().join("day2-sensor8.csv")).unwrap();
    let lines: Vec<_> = day2.lines().collect();
    assert_eq!(lines.len(), 2, "{:?}", lines);
    assert!(lines[0].starts_with("Time (mm-dd-yyyy H:M:S)"));
    assert!(lines[1].contains("1.10000"));
}

#[test]
fn test_timeout_then_reconnect() {
    let dir = TempDir::new().unwrap();
    let start = Instant::now();
    let mut driver = Driver::from_config(
        &config(),
        MemoryLineSource::new(),
        dir.path(),
        NullSurface,
        MemoryReporter::new(),
    )
    .unwrap()
    .started_at(start);

    assert_eq!(driver.step_at(start, wall(0)).severity(), Severity::Info);
    let outcome = driver.step_at(start + Duration::from_secs(11), wall(11));
    assert!(matches!(outcome, Outcome::Error(ref m) if m.contains("timed out")));
    assert_eq!(driver.reader().state(), LinkState::Disconnected);

    let outcome = driver.step_at(start + Duration::from_secs(12), wall(12));
    assert!(matches!(outcome, Outcome::Info(ref m) if m.contains("connected")));
    assert_eq!(driver.reader().source().connect_attempts(), 2);
}

#[test]
fn test_plot_ticks_average_per_sensor() {
    let dir = TempDir::new().unwrap();
    let mut source = MemoryLineSource::connected();
    source.push_line("1 2.00000 2 0.50000 3.00000");
    source.push_line("2 1.00000 2 0.50000 3.00000");
    source.push_line("1 1.00000 2 0.50000 3.00000");
    let start = Instant::now();
    let mut driver = Driver::from_config(
        &config(),
        source,
        dir.path(),
        MemorySurface::new(),
        MemoryReporter::new(),
    )
    .unwrap()
    .started_at(start);

    for i in 0..3 {
        driver.step_at(start + Duration::from_secs(i), wall(i as u32));
    }
    driver.step_at(start + Duration::from_secs(5), wall(5));
    driver.step_at(start + Duration::from_secs(10), wall(10));

    let surface = driver.surface();
    assert_eq!(surface.series("sensor1"), vec![1.5]);
    assert_eq!(surface.series("sensor2"), vec![1.0]);
    assert_eq!(surface.points.len(), 2);
    assert_eq!(driver.metrics().ticks, 2);
}

#[test]
fn test_simulated_array_run() {
    let dir = TempDir::new().unwrap();
    let plan = FaultPlan::standard(7).with_connect_failures(2);
    let array = SimulatedArray::with_faults(ArrayConfig::new().with_sensors(3).with_seed(99), plan).unwrap();

    let start = Instant::now();
    let mut driver = Driver::from_config(
        &config(),
        array,
        dir.path(),
        MemorySurface::new(),
        MemoryReporter::new(),
    )
    .unwrap()
    .started_at(start);

    for i in 0..400u64 {
        driver.step_at(start + Duration::from_millis(i * 50), wall(0));
    }
    driver.finish().unwrap();

    let metrics = driver.metrics();
    let reporter = driver.reporter();
    assert!(metrics.readings > 100);
    assert_eq!(metrics.records_written, metrics.readings);
    assert_eq!(metrics.storage_faults, 0);
    assert!(metrics.out_of_band > 0);
    assert!(metrics.disconnects > 0);
    assert!(metrics.connects >= 2);
    assert!(reporter.count(Severity::Debug) > 0);
    assert!(reporter.contains("BaseStation not connecting."));
    assert!(reporter.contains("Received 'Restarting BaseStation'."));
    assert!(reporter.contains("Data could not be decoded properly."));
    assert!(reporter.contains("Received 'ERR 0x3f unexpected frame'."));
    for phrase in &FIRMWARE_PHRASES[..4] {
        assert!(reporter.contains(phrase));
    }
    assert!(!driver.surface().points.is_empty());
    for sensor in 1..=3 {
        assert!(dir.path().join(format!("day1-sensor{}.csv", sensor)).exists());
    }
}

#[test]
fn test_voltage_range_schema() {
    let dir = TempDir::new().unwrap();
    let mut config = config();
    config.schema = SchemaConfig::voltage_range();

    let plan = FaultPlan::new().with(2, Fault::OutOfBand);
    let array_config = ArrayConfig::new()
        .with_sensors(2)
        .with_seed(5)
        .with_schema(SchemaConfig::voltage_range());
    let array = SimulatedArray::with_faults(array_config, plan).unwrap();

    let mut driver = Driver::from_config(&config, array, dir.path(), NullSurface, MemoryReporter::new())
        .unwrap();
    let start = Instant::now();
    for _ in 0..5 {
        driver.step_at(start, wall(0));
    }

    assert_eq!(driver.metrics().readings, 4);
    assert_eq!(driver.reporter().count(Severity::Warning), 1);
    let text = fs::read_to_string(dir.path().join("day1-sensor1.csv")).unwrap();
    assert!(text.starts_with("Time (mm-dd-yyyy H:M:S),Time (.1s Delta),Voltage (V),Range"));
}
