//! Register-level MAX30102 emulator producing a synthetic PPG.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::f64::consts::TAU;

use crate::{
    io::{bus::RegisterBus, max30102::*},
    signal::{SamplePair, SAMPLE_MAX},
};

/// Shape of the synthetic signal and timing of the emulated FIFO.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub heart_rate_bpm: f64,
    pub sample_rate_hz: f64,
    pub ir_baseline: f64,
    pub ir_amplitude: f64,
    pub red_baseline: f64,
    pub red_amplitude: f64,
    /// Peak-to-peak uniform noise added to both channels.
    pub noise: f64,
    /// Slow respiratory drift amplitude on both baselines.
    pub drift: f64,
    /// Write-pointer polls per newly produced sample.
    pub polls_per_sample: u32,
    pub part_id: u8,
    pub seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            heart_rate_bpm: 72.0,
            sample_rate_hz: 100.0,
            ir_baseline: 100_000.0,
            ir_amplitude: 2_000.0,
            red_baseline: 80_000.0,
            red_amplitude: 800.0,
            noise: 20.0,
            drift: 0.0,
            polls_per_sample: 2,
            part_id: EXPECTED_PART_ID,
            seed: 0,
        }
    }
}

/// Emulated sensor reachable through [`RegisterBus`].
///
/// Samples are only produced in SpO2 mode, one per `polls_per_sample` reads
/// of the write pointer. The 32-entry FIFO honors the rollover bit and counts
/// overflows like the real part.
pub struct SimulatedMax30102 {
    params: SimParams,
    rng: StdRng,
    registers: [u8; 256],
    fifo: VecDeque<SamplePair>,
    wr_ptr: u8,
    rd_ptr: u8,
    overflow: u8,
    polls: u32,
    generated: u64,
}

impl SimulatedMax30102 {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(params.seed),
            registers: [0; 256],
            fifo: VecDeque::with_capacity(usize::from(FIFO_DEPTH)),
            wr_ptr: 0,
            rd_ptr: 0,
            overflow: 0,
            polls: 0,
            generated: 0,
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Samples produced since power-up, including overwritten ones.
    pub fn samples_generated(&self) -> u64 {
        self.generated
    }

    /// Last value written to `reg`.
    pub fn register(&self, reg: u8) -> u8 {
        self.registers[usize::from(reg)]
    }

    /// Produce `count` samples immediately, as if the host had stalled.
    ///
    /// Like the real part, a completely full FIFO leaves the write and read
    /// pointers equal, so a pointer-polling reader sees no data from then on.
    /// With rollover enabled every further sample moves both pointers
    /// together and the FIFO stays unreadable through the pointers. Keep
    /// `count` below `FIFO_DEPTH` minus the entries already queued when the
    /// acquisition loop is expected to drain the backlog.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            self.produce();
        }
    }

    fn sampling(&self) -> bool {
        self.register(REG_MODE_CONFIG) & 0x07 == MODE_SPO2
    }

    fn rollover(&self) -> bool {
        self.register(REG_FIFO_CONFIG) & 0x10 != 0
    }

    fn clear_fifo(&mut self) {
        self.fifo.clear();
        self.wr_ptr = 0;
        self.rd_ptr = 0;
        self.overflow = 0;
    }

    fn synth(&mut self) -> SamplePair {
        let p = self.params;
        let t = self.generated as f64 / p.sample_rate_hz.max(1.0);
        let phase = (t * p.heart_rate_bpm / 60.0).fract();
        // systolic peak followed by a small dicrotic wave
        let pulse = (-0.5 * ((phase - 0.237) / 0.08).powi(2)).exp()
            + 0.1 * (-0.5 * ((phase - 0.45) / 0.06).powi(2)).exp();
        let drift = p.drift * (TAU * 0.25 * t).sin();
        let half = p.noise * 0.5;
        let mut noise = || {
            if half > 0.0 {
                self.rng.gen_range(-half..=half)
            } else {
                0.0
            }
        };
        let ir = p.ir_baseline + drift + p.ir_amplitude * pulse + noise();
        let red = p.red_baseline + drift + p.red_amplitude * pulse + noise();
        SamplePair::new(to_counts(red), to_counts(ir))
    }

    fn produce(&mut self) {
        let sample = self.synth();
        self.generated += 1;
        if self.fifo.len() == usize::from(FIFO_DEPTH) {
            self.overflow = (self.overflow + 1).min(0x1F);
            if !self.rollover() {
                return;
            }
            self.fifo.pop_front();
            self.rd_ptr = (self.rd_ptr + 1) % FIFO_DEPTH;
        }
        self.fifo.push_back(sample);
        self.wr_ptr = (self.wr_ptr + 1) % FIFO_DEPTH;
    }

    fn poll(&mut self) {
        if !self.sampling() {
            return;
        }
        self.polls += 1;
        if self.polls >= self.params.polls_per_sample.max(1) {
            self.polls = 0;
            self.produce();
        }
    }
}

fn to_counts(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(SAMPLE_MAX)) as u32
}

impl RegisterBus for SimulatedMax30102 {
    type Error = Infallible;

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        match reg {
            REG_MODE_CONFIG if value & MODE_RESET != 0 => {
                self.registers = [0; 256];
                self.clear_fifo();
                self.polls = 0;
            }
            REG_FIFO_WR_PTR | REG_FIFO_RD_PTR | REG_FIFO_OVF_CNT => {
                self.clear_fifo();
                self.registers[usize::from(reg)] = value;
            }
            _ => self.registers[usize::from(reg)] = value,
        }
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        Ok(match reg {
            REG_PART_ID => self.params.part_id,
            REG_FIFO_WR_PTR => {
                self.poll();
                self.wr_ptr
            }
            REG_FIFO_RD_PTR => self.rd_ptr,
            REG_FIFO_OVF_CNT => self.overflow,
            REG_INTR_STATUS_1 => 0,
            other => self.registers[usize::from(other)],
        })
    }

    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        if reg != REG_FIFO_DATA {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.registers[(usize::from(reg) + i) % 256];
            }
            return Ok(());
        }
        let sample = match self.fifo.pop_front() {
            Some(s) => {
                self.rd_ptr = (self.rd_ptr + 1) % FIFO_DEPTH;
                s
            }
            None => SamplePair::default(),
        };
        let mut frame = [0u8; FIFO_FRAME_LEN];
        frame[..3].copy_from_slice(&sample.red.to_be_bytes()[1..]);
        frame[3..].copy_from_slice(&sample.ir.to_be_bytes()[1..]);
        for (dst, src) in buf.iter_mut().zip(frame) {
            *dst = src;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bus::NoDelay;

    fn quiet() -> SimParams {
        SimParams {
            noise: 0.0,
            ..SimParams::default()
        }
    }

    fn initialized(params: SimParams) -> Max30102<SimulatedMax30102> {
        let mut driver = Max30102::new(SimulatedMax30102::new(params));
        driver
            .initialize(&SensorConfig::default(), &mut NoDelay, 0)
            .unwrap();
        driver
    }

    #[test]
    fn idle_until_spo2_mode() {
        let mut driver = Max30102::new(SimulatedMax30102::new(quiet()));
        for _ in 0..10 {
            assert_eq!(driver.try_read_sample().unwrap(), None);
        }
        assert_eq!(driver.bus().samples_generated(), 0);
    }

    #[test]
    fn initialize_leaves_reference_registers() {
        let driver = initialized(quiet());
        let sim = driver.bus();
        assert_eq!(sim.register(REG_FIFO_CONFIG), 0x5F);
        assert_eq!(sim.register(REG_SPO2_CONFIG), 0x2F);
        assert_eq!(sim.register(REG_MODE_CONFIG), MODE_SPO2);
    }

    #[test]
    fn alternates_between_no_data_and_sample() {
        let mut driver = initialized(quiet());
        assert_eq!(driver.try_read_sample().unwrap(), None);
        let pair = driver.try_read_sample().unwrap().expect("sample on second poll");
        assert!(pair.ir >= 100_000 && pair.ir <= 102_500);
        assert!(pair.red >= 80_000 && pair.red <= 81_000);
        assert_eq!(driver.try_read_sample().unwrap(), None);
    }

    #[test]
    fn reports_configured_part_id() {
        let mut driver = initialized(SimParams {
            part_id: 0x11,
            ..quiet()
        });
        assert_eq!(driver.read_part_id().unwrap(), 0x11);
    }

    #[test]
    fn rollover_counts_overflow_and_keeps_newest() {
        let mut driver = initialized(quiet());
        driver.bus_mut().advance(40);
        assert_eq!(driver.fifo_overflow_count().unwrap(), 8);
        assert_eq!(driver.bus().samples_generated(), 40);
        let mut drained = 0;
        // the pointers meet once the FIFO is full, so drain through the data register
        while driver.bus_mut().fifo.pop_front().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 32);
    }

    #[test]
    fn full_fifo_reads_as_empty_through_pointers() {
        let mut driver = initialized(quiet());
        driver.bus_mut().advance(usize::from(FIFO_DEPTH) - 1);
        assert!(driver.try_read_sample().unwrap().is_some());

        let mut driver = initialized(quiet());
        driver.bus_mut().advance(usize::from(FIFO_DEPTH));
        assert_eq!(driver.fifo_overflow_count().unwrap(), 0);
        assert_eq!(driver.try_read_sample().unwrap(), None);
        assert_eq!(driver.bus().fifo.len(), usize::from(FIFO_DEPTH));
    }

    #[test]
    fn soft_reset_clears_overflow() {
        let mut driver = initialized(quiet());
        driver.bus_mut().advance(40);
        driver
            .initialize(&SensorConfig::default(), &mut NoDelay, 0)
            .unwrap();
        assert_eq!(driver.fifo_overflow_count().unwrap(), 0);
    }
}
