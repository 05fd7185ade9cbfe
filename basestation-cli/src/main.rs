// BaseStation CLI - Serial base station command-line tool
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! # BaseStation
//!
//! Command-line base station for a serial sensor array.
//!
//! ## Usage
//!
//! ```bash
//! # Ingest from the first USB serial device until Ctrl+C
//! basestation run
//!
//! # Fixed port, custom output folder, faster plotting
//! basestation run --port /dev/ttyACM0 --output ./logs --plot-interval 10
//!
//! # No hardware: a simulated array of 6 sensors
//! basestation run --simulate 6 --seed 42
//!
//! # List serial ports
//! basestation list-ports
//!
//! # Feedback sweep
//! basestation feedback --port COM6 --values 0,25,50,75,100
//! ```

mod error;
mod feedback;
mod serial;
mod surface;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use basestation::{BaseStationConfig, Driver, Journal, LineSource, LinkConfig, Reporter, WindowSurface};
use basestation_sim::{ArrayConfig, FaultPlan, SimulatedArray};
use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, Result};
use crate::feedback::{sweep, sweep_path, SweepConfig};
use crate::serial::{describe, SerialLineSource};
use crate::surface::PacedSurface;

/// Sensor array base station
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest telemetry until interrupted
    Run(RunArgs),
    /// List serial ports
    ListPorts,
    /// Send set-points and record the answers
    Feedback(FeedbackArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (auto-detected when omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Directory holding one folder per run
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Inactivity timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Plot (aggregation) interval in seconds
    #[arg(long)]
    plot_interval: Option<u64>,

    /// Record file rotation interval in seconds
    #[arg(long)]
    rotate_interval: Option<u64>,

    /// Rendering budget per iteration in milliseconds
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// Use a simulated array of N sensors instead of a serial device
    #[arg(long, value_name = "N")]
    simulate: Option<usize>,

    /// Seed for the simulated array
    #[arg(long, requires = "simulate")]
    seed: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct FeedbackArgs {
    /// Serial port (auto-detected when omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Set-points to send
    #[arg(long, value_delimiter = ',', default_value = "0,10,20,30,40,50,60,70,80,90,100")]
    values: Vec<i64>,

    /// Seconds to wait for each answer
    #[arg(long, default_value = "2")]
    response_timeout: u64,

    /// Directory for sweep records
    #[arg(short, long, default_value = "feedback_logs")]
    output: PathBuf,

    /// Sweep against a simulated array that echoes every value
    #[arg(long)]
    simulate: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::ListPorts => list_ports(),
        Command::Feedback(args) => run_feedback(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &RunArgs) -> Result<BaseStationConfig> {
    let mut config = match &args.config {
        Some(path) => BaseStationConfig::from_file(path)?,
        None => BaseStationConfig::default(),
    };

    if let Some(port) = &args.port {
        config.link.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }
    if let Some(output) = &args.output {
        config.output.root = output.clone();
    }
    if let Some(timeout) = args.timeout {
        config.link.timeout_secs = timeout;
    }
    if let Some(interval) = args.plot_interval {
        config.schedule.plot_interval_secs = interval;
    }
    if let Some(interval) = args.rotate_interval {
        config.schedule.rotate_interval_secs = interval;
    }
    if let Some(ms) = args.refresh_ms {
        config.schedule.refresh_budget_ms = ms;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!("BaseStation v{}", env!("CARGO_PKG_VERSION"));

    let started = Local::now();
    let run_folder = config.output.run_folder(&started);
    std::fs::create_dir_all(&run_folder).map_err(|source| CliError::Io {
        path: run_folder.clone(),
        source,
    })?;
    info!("writing records to {}", run_folder.display());

    match args.simulate {
        Some(sensors) => {
            let mut array_config = ArrayConfig::new()
                .with_sensors(sensors)
                .with_schema(config.schema.clone());
            if let Some(seed) = args.seed {
                array_config = array_config.with_seed(seed);
            }
            let array = SimulatedArray::with_faults(array_config, FaultPlan::standard(200))?;
            info!("simulating {} sensors", sensors);
            ingest(&config, array, &run_folder)
        }
        None => ingest(&config, SerialLineSource::new(&config.link), &run_folder),
    }
}

fn ingest<S: LineSource>(config: &BaseStationConfig, source: S, run_folder: &Path) -> Result<()> {
    let journal = Journal::open(
        run_folder.join(&config.output.journal_name),
        config.output.journal_max_bytes,
        config.output.journal_backups,
    )?;
    let reporter = Reporter::with_journal(config.report, journal);

    let band = config.schema.good_band;
    let window = WindowSurface::new(config.schedule.plot_window()).with_reference_lines([band.low, band.high]);
    let surface = PacedSurface::new(window);

    let mut driver = Driver::from_config(config, source, run_folder, surface, reporter)?;

    let shutdown = driver.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;
    info!("Ingestion started. Press Ctrl+C to stop.");

    let result = driver.run();
    info!("{}", driver.surface().window().summary());
    info!("\n{}", driver.metrics().report());
    result.map_err(CliError::from)
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports()?;
    println!("Available serial ports:");
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!("  {} - {}", port.port_name, describe(&port.port_type));
    }
    Ok(())
}

fn run_feedback(args: FeedbackArgs) -> Result<()> {
    let config = SweepConfig {
        values: args.values,
        response_timeout: Duration::from_secs(args.response_timeout),
        ..Default::default()
    };
    let path = sweep_path(&args.output, &Local::now());

    if args.simulate {
        let mut array = SimulatedArray::new(ArrayConfig::new())?;
        array.connect()?;
        sweep(&mut array, &config, &path)?;
    } else {
        let link = LinkConfig {
            port: args.port,
            baud_rate: args.baud,
            ..Default::default()
        };
        let mut source = SerialLineSource::new(&link);
        source.connect()?;
        info!("connected to {}", source.endpoint().unwrap_or("serial port"));
        sweep(&mut source, &config, &path)?;
        source.disconnect();
    }

    info!("sweep recorded to {}", path.display());
    Ok(())
}
