use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::io::max30102::{SensorConfig, EXPECTED_PART_ID};

/// How the heart-rate detector decides a local maximum is tall enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PeakThreshold {
    /// Integer mean of the IR channel over the window.
    #[default]
    WindowMean,
    /// Fixed absolute IR level.
    Fixed { value: u32 },
}

/// What to do when the part-id register does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityPolicy {
    #[default]
    Halt,
    Warn,
}

/// Closed range the SpO2 estimate is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spo2Range {
    pub min: f64,
    pub max: f64,
}

impl Default for Spo2Range {
    fn default() -> Self {
        Self {
            min: 80.0,
            max: 100.0,
        }
    }
}

/// Open BPM interval treated as physiologically plausible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmBand {
    pub min: f64,
    pub max: f64,
}

impl Default for BpmBand {
    fn default() -> Self {
        Self {
            min: 40.0,
            max: 220.0,
        }
    }
}

impl BpmBand {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm > self.min && bpm < self.max
    }
}

/// Configurable parameters for acquisition and both estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OximeterConfig {
    /// Nominal sample rate used to turn a window length into seconds (Hz).
    pub sample_rate_hz: f64,
    pub peak_threshold: PeakThreshold,
    /// Samples skipped after an accepted peak.
    pub refractory_samples: usize,
    pub spo2_range: Spo2Range,
    pub plausible_bpm: BpmBand,
    pub identity_policy: IdentityPolicy,
    pub expected_part_id: u8,
    /// Pause after each collected sample (ms).
    pub poll_interval_ms: u32,
    /// Pause after the soft reset (ms).
    pub settle_ms: u32,
    pub sensor: SensorConfig,
}

impl Default for OximeterConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            peak_threshold: PeakThreshold::WindowMean,
            refractory_samples: 15,
            spo2_range: Spo2Range::default(),
            plausible_bpm: BpmBand::default(),
            identity_policy: IdentityPolicy::Halt,
            expected_part_id: EXPECTED_PART_ID,
            poll_interval_ms: 10,
            settle_ms: 100,
            sensor: SensorConfig::default(),
        }
    }
}

impl OximeterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: OximeterConfig = toml::from_str(text).context("parsing oximeter config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            bail!("sample_rate_hz must be positive and finite, got {}", self.sample_rate_hz);
        }
        let spo2 = self.spo2_range;
        if !(spo2.min.is_finite() && spo2.max.is_finite()) {
            bail!("spo2_range bounds must be finite, got {}..{}", spo2.min, spo2.max);
        }
        if spo2.min > spo2.max {
            bail!(
                "spo2_range.min ({}) exceeds spo2_range.max ({})",
                spo2.min,
                spo2.max
            );
        }
        let bpm = self.plausible_bpm;
        if !(bpm.min.is_finite() && bpm.max.is_finite()) {
            bail!("plausible_bpm bounds must be finite, got {}..{}", bpm.min, bpm.max);
        }
        if bpm.min >= bpm.max {
            bail!(
                "plausible_bpm.min ({}) must be below plausible_bpm.max ({})",
                bpm.min,
                bpm.max
            );
        }
        self.sensor.validate()?;
        Ok(())
    }
}

/// Read and validate a TOML configuration file.
pub fn load(path: &Path) -> Result<OximeterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    OximeterConfig::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
}
