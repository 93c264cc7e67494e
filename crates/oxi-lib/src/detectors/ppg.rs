use crate::{config::PeakThreshold, signal::Events};
use serde::{Deserialize, Serialize};

/// Parameters for pulse-peak counting over one IR window.
#[derive(Debug, Clone, Copy)]
pub struct PeakDetectorConfig {
    /// Nominal sample rate (Hz) used to convert the window length to seconds.
    pub sample_rate_hz: f64,
    pub threshold: PeakThreshold,
    /// Indices skipped after an accepted peak, so one pulse and its dicrotic
    /// notch are counted once.
    pub refractory_samples: usize,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            threshold: PeakThreshold::WindowMean,
            refractory_samples: 15,
        }
    }
}

/// Heart-rate estimate for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateEstimate {
    pub bpm: f64,
    pub peaks: Events,
}

impl HeartRateEstimate {
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }
}

/// Integer mean of a channel; the fractional part is dropped.
pub fn integer_mean(data: &[u32]) -> u32 {
    if data.is_empty() {
        return 0;
    }
    let sum: u64 = data.iter().map(|&x| u64::from(x)).sum();
    (sum / data.len() as u64) as u32
}

/// Find strict local maxima above the threshold on interior indices.
///
/// After each accepted peak the scan jumps `refractory_samples` ahead, so no
/// two returned indices are closer than `refractory_samples + 1`.
pub fn detect_ppg_peaks(ir: &[u32], cfg: &PeakDetectorConfig) -> Events {
    if ir.len() < 3 {
        return Events::default();
    }
    let threshold = match cfg.threshold {
        PeakThreshold::WindowMean => integer_mean(ir),
        PeakThreshold::Fixed { value } => value,
    };

    let last = ir.len() - 1;
    let mut peaks = Vec::new();
    let mut i = 1;
    while i < last {
        if ir[i] > ir[i - 1] && ir[i] > ir[i + 1] && ir[i] > threshold {
            peaks.push(i);
            i = i.saturating_add(cfg.refractory_samples).min(last);
        }
        i += 1;
    }
    Events::from_indices(peaks)
}

/// Beats per minute from a peak count over `window_len` samples.
pub fn bpm_from_peaks(peak_count: usize, window_len: usize, sample_rate_hz: f64) -> f64 {
    if window_len == 0 || sample_rate_hz <= 0.0 {
        return 0.0;
    }
    let duration_s = window_len as f64 / sample_rate_hz;
    (peak_count as f64 / duration_s) * 60.0
}

/// Count pulse peaks in an IR window and convert them to BPM.
///
/// A window without peaks yields 0 BPM, which callers treat as "no reading".
pub fn estimate_heart_rate(ir: &[u32], cfg: &PeakDetectorConfig) -> HeartRateEstimate {
    let peaks = detect_ppg_peaks(ir, cfg);
    let bpm = bpm_from_peaks(peaks.len(), ir.len(), cfg.sample_rate_hz);
    log::debug!("{} peak(s) in {} samples -> {:.1} BPM", peaks.len(), ir.len(), bpm);
    HeartRateEstimate { bpm, peaks }
}
