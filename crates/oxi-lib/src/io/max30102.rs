//! MAX30102 register map and FIFO-backed sample driver.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    io::bus::{Delay, RegisterBus},
    signal::SamplePair,
};

/// 7-bit bus address of the MAX30102.
pub const I2C_ADDRESS: u8 = 0x57;
/// Value of [`REG_PART_ID`] on a MAX30102.
pub const EXPECTED_PART_ID: u8 = 0x15;

pub const REG_INTR_STATUS_1: u8 = 0x00;
pub const REG_INTR_ENABLE_1: u8 = 0x02;
pub const REG_FIFO_WR_PTR: u8 = 0x04;
pub const REG_FIFO_OVF_CNT: u8 = 0x05;
pub const REG_FIFO_RD_PTR: u8 = 0x06;
pub const REG_FIFO_DATA: u8 = 0x07;
pub const REG_FIFO_CONFIG: u8 = 0x08;
pub const REG_MODE_CONFIG: u8 = 0x09;
pub const REG_SPO2_CONFIG: u8 = 0x0A;
pub const REG_LED1_PA: u8 = 0x0C;
pub const REG_LED2_PA: u8 = 0x0D;
pub const REG_PART_ID: u8 = 0xFF;

pub const MODE_RESET: u8 = 0x40;
pub const MODE_SPO2: u8 = 0x03;

/// Depth of the on-chip FIFO, in sample pairs.
pub const FIFO_DEPTH: u8 = 32;
/// Bytes per FIFO entry in SpO2 mode (3 RED + 3 IR).
pub const FIFO_FRAME_LEN: usize = 6;

/// Register-level sensor settings, written once by [`Max30102::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Samples averaged on-chip per FIFO entry: 1, 2, 4, 8, 16 or 32.
    pub sample_averaging: u8,
    pub fifo_rollover: bool,
    /// FIFO almost-full threshold (4 bits).
    pub fifo_almost_full: u8,
    /// ADC full-scale range code (2 bits, 1 = 4096 nA).
    pub adc_range: u8,
    /// Sample-rate code (3 bits, 3 = 100 Hz).
    pub sample_rate: u8,
    /// LED pulse-width code (2 bits, 3 = 411 us / 18 bit).
    pub pulse_width: u8,
    pub led_red_pa: u8,
    pub led_ir_pa: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_averaging: 4,
            fifo_rollover: true,
            fifo_almost_full: 0x0F,
            adc_range: 0b01,
            sample_rate: 0b011,
            pulse_width: 0b11,
            led_red_pa: 0x24,
            led_ir_pa: 0x24,
        }
    }
}

impl SensorConfig {
    /// FIFO_CONFIG: averaging in bits 7-5, rollover in bit 4, almost-full in bits 3-0.
    pub fn fifo_config(&self) -> u8 {
        let avg = (self.sample_averaging.max(1).trailing_zeros() as u8).min(5);
        (avg << 5) | (u8::from(self.fifo_rollover) << 4) | (self.fifo_almost_full & 0x0F)
    }

    /// SPO2_CONFIG: ADC range in bits 6-5, sample rate in bits 4-2, pulse width in bits 1-0.
    pub fn spo2_config(&self) -> u8 {
        ((self.adc_range & 0b11) << 5) | ((self.sample_rate & 0b111) << 2) | (self.pulse_width & 0b11)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_averaging.is_power_of_two() || self.sample_averaging > 32 {
            bail!(
                "sensor.sample_averaging must be 1, 2, 4, 8, 16 or 32, got {}",
                self.sample_averaging
            );
        }
        if self.fifo_almost_full > 0x0F {
            bail!("sensor.fifo_almost_full must fit in 4 bits, got {}", self.fifo_almost_full);
        }
        if self.adc_range > 0b11 || self.pulse_width > 0b11 || self.sample_rate > 0b111 {
            bail!("sensor ADC range, sample rate or pulse width code out of range");
        }
        Ok(())
    }
}

/// Polling driver for the MAX30102 in SpO2 (RED + IR) mode.
///
/// Holds no samples itself; every successful [`Max30102::try_read_sample`]
/// drains exactly one FIFO entry.
pub struct Max30102<B> {
    bus: B,
}

impl<B: RegisterBus> Max30102<B> {
    /// Side-effect-free constructor. Nothing is written before `initialize()`.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Soft reset, wait `settle_ms`, clear the FIFO, then apply `cfg` and enter SpO2 mode.
    pub fn initialize<D: Delay>(
        &mut self,
        cfg: &SensorConfig,
        delay: &mut D,
        settle_ms: u32,
    ) -> Result<(), Error<B::Error>> {
        self.write(REG_MODE_CONFIG, MODE_RESET)?;
        delay.delay_ms(settle_ms);

        self.write(REG_FIFO_WR_PTR, 0x00)?;
        self.write(REG_FIFO_OVF_CNT, 0x00)?;
        self.write(REG_FIFO_RD_PTR, 0x00)?;

        self.write(REG_FIFO_CONFIG, cfg.fifo_config())?;
        self.write(REG_SPO2_CONFIG, cfg.spo2_config())?;
        self.write(REG_LED1_PA, cfg.led_red_pa)?;
        self.write(REG_LED2_PA, cfg.led_ir_pa)?;
        self.write(REG_MODE_CONFIG, MODE_SPO2)?;
        Ok(())
    }

    pub fn read_part_id(&mut self) -> Result<u8, Error<B::Error>> {
        self.read(REG_PART_ID)
    }

    /// Returns the oldest unread FIFO entry, or `None` when the write and read
    /// pointers are equal.
    pub fn try_read_sample(&mut self) -> Result<Option<SamplePair>, Error<B::Error>> {
        let wr = self.read(REG_FIFO_WR_PTR)?;
        let rd = self.read(REG_FIFO_RD_PTR)?;
        if wr == rd {
            return Ok(None);
        }

        let mut frame = [0u8; FIFO_FRAME_LEN];
        self.bus
            .read_burst(REG_FIFO_DATA, &mut frame)
            .map_err(Error::Bus)?;
        Ok(Some(SamplePair::from_fifo_bytes(&frame)))
    }

    /// Number of samples lost to FIFO overflow since the counter was last cleared.
    pub fn fifo_overflow_count(&mut self) -> Result<u8, Error<B::Error>> {
        self.read(REG_FIFO_OVF_CNT)
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), Error<B::Error>> {
        self.bus.write_register(reg, value).map_err(Error::Bus)
    }

    fn read(&mut self, reg: u8) -> Result<u8, Error<B::Error>> {
        self.bus.read_register(reg).map_err(Error::Bus)
    }
}
