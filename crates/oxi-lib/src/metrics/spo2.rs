use crate::config::Spo2Range;
use serde::{Deserialize, Serialize};

/// Empirical linear model: SpO2 = A - B * R.
pub const SPO2_INTERCEPT: f64 = 110.0;
pub const SPO2_SLOPE: f64 = 25.0;

/// DC level and mean absolute deviation of one optical channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcDc {
    pub ac: f64,
    pub dc: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Spo2Estimate {
    pub spo2: f64,
    /// Ratio of ratios; 0 when a guarded term was zero.
    pub ratio: f64,
    pub red: AcDc,
    pub ir: AcDc,
}

pub fn ac_dc(data: &[u32]) -> AcDc {
    if data.is_empty() {
        return AcDc { ac: 0.0, dc: 0.0 };
    }
    let n = data.len() as f64;
    let dc = data.iter().map(|&x| f64::from(x)).sum::<f64>() / n;
    let ac = data.iter().map(|&x| (f64::from(x) - dc).abs()).sum::<f64>() / n;
    AcDc { ac, dc }
}

/// `(RED_AC / RED_DC) / (IR_AC / IR_DC)`, or 0 if any divisor is zero.
pub fn ratio_of_ratios(red: AcDc, ir: AcDc) -> f64 {
    if ir.dc == 0.0 || ir.ac == 0.0 || red.dc == 0.0 {
        return 0.0;
    }
    (red.ac / red.dc) / (ir.ac / ir.dc)
}

/// Estimate SpO2 from parallel RED and IR windows, clamped to `range`.
///
/// Never panics on an unvalidated range: an inverted range yields `range.max`
/// and a NaN bound is ignored.
pub fn estimate_spo2(red: &[u32], ir: &[u32], range: &Spo2Range) -> Spo2Estimate {
    let red_stats = ac_dc(red);
    let ir_stats = ac_dc(ir);
    let ratio = ratio_of_ratios(red_stats, ir_stats);
    let spo2 = (SPO2_INTERCEPT - SPO2_SLOPE * ratio).max(range.min).min(range.max);
    Spo2Estimate {
        spo2,
        ratio,
        red: red_stats,
        ir: ir_stats,
    }
}
