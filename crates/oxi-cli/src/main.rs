use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use oxi_lib::{
    acquisition::{estimate_windows, LogReporter, Oximeter, Reading, Reporter},
    config::{self, OximeterConfig, PeakThreshold, Spo2Range},
    io::{
        bus::{Delay, NoDelay, StdDelay},
        sim::{SimParams, SimulatedMax30102},
        text as text_io,
    },
    signal::SamplePair,
};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "oxi",
    version,
    about = "OXI: pulse-oximeter acquisition and heart-rate/SpO2 estimation tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate BPM and SpO2 for each full window of `red,ir` rows read from stdin or --input
    Estimate {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
        /// Use a fixed IR peak threshold instead of the window mean
        #[arg(long)]
        fixed_threshold: Option<u32>,
        #[arg(long)]
        refractory: Option<usize>,
        #[arg(long)]
        spo2_min: Option<f64>,
        #[arg(long)]
        spo2_max: Option<f64>,
    },
    /// Run the acquisition loop against the emulated MAX30102
    Simulate {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        windows: usize,
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 20.0)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Part id the emulated sensor reports (e.g. 0x15)
        #[arg(long, value_parser = parse_byte, default_value = "0x15")]
        part_id: u8,
        /// Honour poll and settle delays in wall-clock time
        #[arg(long)]
        realtime: bool,
    },
    /// Decode one 6-byte FIFO frame given as 12 hex digits
    DecodeFifo { frame: String },
}

#[derive(Serialize)]
struct WindowOutput {
    window: usize,
    #[serde(flatten)]
    reading: Reading,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Estimate {
            input,
            config,
            fs,
            fixed_threshold,
            refractory,
            spo2_min,
            spo2_max,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(fs) = fs {
                cfg.sample_rate_hz = fs;
            }
            if let Some(value) = fixed_threshold {
                cfg.peak_threshold = PeakThreshold::Fixed { value };
            }
            if let Some(refractory) = refractory {
                cfg.refractory_samples = refractory;
            }
            cfg.spo2_range = Spo2Range {
                min: spo2_min.unwrap_or(cfg.spo2_range.min),
                max: spo2_max.unwrap_or(cfg.spo2_range.max),
            };
            cfg.validate()?;
            cmd_estimate(input.as_deref(), &cfg)?
        }
        Commands::Simulate {
            config,
            windows,
            bpm,
            noise,
            seed,
            part_id,
            realtime,
        } => {
            let cfg = load_config(config.as_deref())?;
            let params = SimParams {
                heart_rate_bpm: bpm,
                sample_rate_hz: cfg.sample_rate_hz,
                noise,
                seed,
                part_id,
                ..SimParams::default()
            };
            if realtime {
                cmd_simulate(cfg, params, windows, StdDelay)?
            } else {
                cmd_simulate(cfg, params, windows, NoDelay)?
            }
        }
        Commands::DecodeFifo { frame } => cmd_decode_fifo(&frame)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OximeterConfig> {
    match path {
        Some(path) => config::load(path),
        None => Ok(OximeterConfig::default()),
    }
}

fn read_pairs(input: Option<&Path>) -> Result<Vec<SamplePair>> {
    match input {
        Some(path) => text_io::read_sample_pairs(path),
        None => text_io::parse_sample_pairs(io::stdin().lock()),
    }
}

fn cmd_estimate(input: Option<&Path>, cfg: &OximeterConfig) -> Result<()> {
    let pairs = read_pairs(input)?;
    let readings = estimate_windows(&pairs, cfg);
    if readings.is_empty() {
        bail!(
            "need at least {} samples for one window, got {}",
            oxi_lib::WINDOW_SIZE,
            pairs.len()
        );
    }
    for (window, reading) in readings.into_iter().enumerate() {
        let js = serde_json::to_string(&WindowOutput { window, reading })?;
        println!("{}", js);
    }
    Ok(())
}

fn cmd_simulate<D: Delay>(
    cfg: OximeterConfig,
    params: SimParams,
    windows: usize,
    delay: D,
) -> Result<()> {
    let mut window = 0usize;
    let mut log_reporter = LogReporter;
    let reporter = |reading: &Reading| {
        log_reporter.report(reading);
        match serde_json::to_string(&WindowOutput {
            window,
            reading: *reading,
        }) {
            Ok(js) => println!("{}", js),
            Err(err) => log::error!("failed to encode reading: {}", err),
        }
        window += 1;
    };
    let sensor = SimulatedMax30102::new(params);
    let mut oximeter = Oximeter::new(sensor, delay, reporter, cfg);
    let part_id = oximeter.start().context("starting acquisition")?;
    log::debug!("sensor started, part id 0x{:02X}", part_id);
    oximeter.run_cycles(windows)?;
    Ok(())
}

fn cmd_decode_fifo(frame: &str) -> Result<()> {
    let hex = frame.trim().trim_start_matches("0x");
    if hex.len() != 12 {
        bail!("expected 12 hex digits, got {}", hex.len());
    }
    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let digits = hex
            .get(2 * i..2 * i + 2)
            .ok_or_else(|| anyhow!("frame is not ASCII hex: {}", frame))?;
        *byte = u8::from_str_radix(digits, 16)
            .with_context(|| format!("invalid hex byte '{}'", digits))?;
    }
    let pair = SamplePair::from_fifo_bytes(&bytes);
    println!("{}", serde_json::to_string(&pair)?);
    Ok(())
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid byte '{}': {}", s, e))
}
