//! Acquisition loop: drives the sensor, fills one window at a time and
//! reports both estimates per completed window.

use serde::{Deserialize, Serialize};

use crate::{
    config::{IdentityPolicy, OximeterConfig},
    detectors::ppg::{estimate_heart_rate, PeakDetectorConfig},
    error::Error,
    io::{
        bus::{Delay, RegisterBus},
        max30102::Max30102,
    },
    metrics::spo2::estimate_spo2,
    signal::{FullWindow, SamplePair, SampleWindow, WINDOW_SIZE},
};

/// Estimates for one completed window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub bpm: f64,
    pub spo2: f64,
    /// `false` when `bpm` lies outside the plausibility band.
    pub valid: bool,
    pub peak_count: usize,
    /// FIFO overflow counter observed after the window filled.
    pub fifo_overflow: u8,
}

/// Consumer of per-window readings (console, telemetry, ...).
pub trait Reporter {
    fn report(&mut self, reading: &Reading);
}

impl<F: FnMut(&Reading)> Reporter for F {
    fn report(&mut self, reading: &Reading) {
        self(reading)
    }
}

/// Writes each reading through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, reading: &Reading) {
        if reading.valid {
            log::info!("BPM: {:.1}, SpO2: {:.1}%", reading.bpm, reading.spo2);
        } else {
            log::warn!(
                "no reliable signal (BPM {:.1}); place the finger firmly on the sensor",
                reading.bpm
            );
        }
    }
}

/// Run both estimators over a completed window.
pub fn estimate_window(window: FullWindow<'_>, cfg: &OximeterConfig) -> Reading {
    let hr = estimate_heart_rate(window.ir(), &peak_config(cfg));
    let spo2 = estimate_spo2(window.red(), window.ir(), &cfg.spo2_range);
    Reading {
        bpm: hr.bpm,
        spo2: spo2.spo2,
        valid: cfg.plausible_bpm.contains(hr.bpm),
        peak_count: hr.peak_count(),
        fifo_overflow: 0,
    }
}

/// Split a recorded sequence into consecutive full windows and estimate each.
///
/// A trailing partial window is dropped.
pub fn estimate_windows(pairs: &[SamplePair], cfg: &OximeterConfig) -> Vec<Reading> {
    let mut window = SampleWindow::new();
    let mut readings = Vec::with_capacity(pairs.len() / WINDOW_SIZE);
    for &pair in pairs {
        window.push(pair);
        if let Some(full) = window.as_full() {
            readings.push(estimate_window(full, cfg));
            window.reset();
        }
    }
    if !window.is_empty() {
        log::debug!("dropping {} trailing sample(s) short of a window", window.len());
    }
    readings
}

fn peak_config(cfg: &OximeterConfig) -> PeakDetectorConfig {
    PeakDetectorConfig {
        sample_rate_hz: cfg.sample_rate_hz,
        threshold: cfg.peak_threshold,
        refractory_samples: cfg.refractory_samples,
    }
}

/// Owns the driver, the collection window and the collaborators.
///
/// Every cycle runs to completion (including `report`) before the window is
/// reset, so a new collection never overlaps an unconsumed window.
pub struct Oximeter<B, D, R> {
    sensor: Max30102<B>,
    delay: D,
    reporter: R,
    cfg: OximeterConfig,
    window: SampleWindow,
    started: bool,
}

impl<B, D, R> Oximeter<B, D, R>
where
    B: RegisterBus,
    D: Delay,
    R: Reporter,
{
    pub fn new(bus: B, delay: D, reporter: R, cfg: OximeterConfig) -> Self {
        Self {
            sensor: Max30102::new(bus),
            delay,
            reporter,
            cfg,
            window: SampleWindow::new(),
            started: false,
        }
    }

    pub fn config(&self) -> &OximeterConfig {
        &self.cfg
    }

    pub fn sensor_mut(&mut self) -> &mut Max30102<B> {
        &mut self.sensor
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_parts(self) -> (B, D, R) {
        (self.sensor.release(), self.delay, self.reporter)
    }

    /// Configure the sensor and check its identity.
    ///
    /// Returns the part id read back. Under [`IdentityPolicy::Halt`] a
    /// mismatch is an error; under [`IdentityPolicy::Warn`] it is logged.
    pub fn start(&mut self) -> Result<u8, Error<B::Error>> {
        self.sensor
            .initialize(&self.cfg.sensor, &mut self.delay, self.cfg.settle_ms)?;

        let part_id = self.sensor.read_part_id()?;
        let expected = self.cfg.expected_part_id;
        if part_id == expected {
            log::info!("MAX30102 ready (part id 0x{:02X})", part_id);
        } else {
            match self.cfg.identity_policy {
                IdentityPolicy::Halt => {
                    log::error!(
                        "unexpected part id 0x{:02X} (expected 0x{:02X}), halting",
                        part_id,
                        expected
                    );
                    return Err(Error::IdentityMismatch {
                        expected,
                        found: part_id,
                    });
                }
                IdentityPolicy::Warn => log::warn!(
                    "unexpected part id 0x{:02X} (expected 0x{:02X}), continuing",
                    part_id,
                    expected
                ),
            }
        }
        self.started = true;
        Ok(part_id)
    }

    /// Poll until the window holds `WINDOW_SIZE` pairs, then estimate it.
    fn collect(&mut self) -> Result<Reading, Error<B::Error>> {
        loop {
            if let Some(full) = self.window.as_full() {
                return Ok(estimate_window(full, &self.cfg));
            }
            match self.sensor.try_read_sample()? {
                Some(pair) => {
                    self.window.push(pair);
                    self.delay.delay_ms(self.cfg.poll_interval_ms);
                }
                None => log::trace!("FIFO empty, polling again"),
            }
        }
    }

    /// One COLLECT -> ESTIMATE -> REPORT cycle; the window is reset afterwards.
    ///
    /// Calls [`Oximeter::start`] first if it has not run yet.
    pub fn run_cycle(&mut self) -> Result<Reading, Error<B::Error>> {
        if !self.started {
            self.start()?;
        }
        let mut reading = self.collect()?;

        let overflow = self.sensor.fifo_overflow_count()?;
        if overflow > 0 {
            log::warn!("FIFO overflowed {} time(s) while filling the window", overflow);
        }
        reading.fifo_overflow = overflow;

        self.reporter.report(&reading);
        self.window.reset();
        Ok(reading)
    }

    pub fn run_cycles(&mut self, cycles: usize) -> Result<Vec<Reading>, Error<B::Error>> {
        (0..cycles).map(|_| self.run_cycle()).collect()
    }

    /// Run until a bus error (or an identity mismatch under the halt policy).
    pub fn run(&mut self) -> Result<std::convert::Infallible, Error<B::Error>> {
        loop {
            self.run_cycle()?;
        }
    }
}
