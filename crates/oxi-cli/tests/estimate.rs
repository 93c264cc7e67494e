use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

#[derive(Debug, Deserialize)]
struct WindowOutput {
    window: usize,
    bpm: f64,
    spo2: f64,
    valid: bool,
    peak_count: usize,
}

fn gaussian_ir(centers: &[usize]) -> Vec<u32> {
    (0..100)
        .map(|i| {
            let mut v = 5_000.0;
            for &c in centers {
                let d = (i as f64 - c as f64) / 2.0;
                v += 20_000.0 * (-0.5 * d * d).exp();
            }
            v.round() as u32
        })
        .collect()
}

fn write_pairs(path: &Path, red: &[u32], ir: &[u32]) -> std::io::Result<()> {
    let mut text = String::from("red,ir\n");
    for (r, i) in red.iter().zip(ir) {
        text.push_str(&format!("{},{}\n", r, i));
    }
    fs::write(path, text)
}

fn run_estimate(args: &[&str]) -> Result<Vec<WindowOutput>, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("oxi");
    cmd.arg("estimate").args(args);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let mut rows = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        rows.push(serde_json::from_str(line)?);
    }
    Ok(rows)
}

#[test]
fn five_peaks_per_second_report_300_bpm() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("pulses.csv");
    let ir = gaussian_ir(&[10, 30, 50, 70, 90]);
    write_pairs(&path, &vec![40_000; 100], &ir)?;

    let rows = run_estimate(&["--input", path.to_str().expect("utf8 path"), "--fs", "100"])?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].window, 0);
    assert_eq!(rows[0].peak_count, 5);
    assert!((rows[0].bpm - 300.0).abs() < 1e-9);
    // 300 BPM lies outside the plausibility band
    assert!(!rows[0].valid);
    Ok(())
}

#[test]
fn flat_signal_gives_zero_bpm_and_clamped_spo2() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("flat.csv");
    let flat = vec![50_000u32; 250];
    write_pairs(&path, &flat, &flat)?;

    let rows = run_estimate(&["--input", path.to_str().expect("utf8 path")])?;
    // the trailing 50 samples do not make a window
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.bpm, 0.0);
        assert_eq!(row.spo2, 100.0);
        assert!(!row.valid);
    }
    Ok(())
}

#[test]
fn spo2_clamp_range_is_configurable() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("low.csv");
    let red: Vec<u32> = (0..100).map(|i| if i % 2 == 0 { 44_000 } else { 36_000 }).collect();
    let ir: Vec<u32> = (0..100).map(|i| if i % 2 == 0 { 40_400 } else { 39_600 }).collect();
    write_pairs(&path, &red, &ir)?;
    let input = path.to_str().expect("utf8 path");

    let default_rows = run_estimate(&["--input", input])?;
    assert_eq!(default_rows[0].spo2, 80.0);

    let wide_rows = run_estimate(&["--input", input, "--spo2-min", "0"])?;
    assert_eq!(wide_rows[0].spo2, 0.0);
    Ok(())
}

#[test]
fn non_finite_spo2_bound_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("pulses.csv");
    write_pairs(&path, &vec![40_000; 100], &gaussian_ir(&[20, 60]))?;
    let mut cmd = cargo_bin_cmd!("oxi");
    cmd.args([
        "estimate",
        "--input",
        path.to_str().expect("utf8 path"),
        "--spo2-min",
        "NaN",
    ]);
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn fixed_threshold_flag_changes_peak_count() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("pulses.csv");
    write_pairs(&path, &vec![40_000; 100], &gaussian_ir(&[20, 60]))?;
    let input = path.to_str().expect("utf8 path");

    assert_eq!(run_estimate(&["--input", input])?[0].peak_count, 2);
    let rows = run_estimate(&["--input", input, "--fixed-threshold", "30000"])?;
    assert_eq!(rows[0].peak_count, 0);
    Ok(())
}

#[test]
fn short_recording_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("short.csv");
    write_pairs(&path, &[1, 2, 3], &[4, 5, 6])?;
    let mut cmd = cargo_bin_cmd!("oxi");
    cmd.args(["estimate", "--input", path.to_str().expect("utf8 path")]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn reads_samples_from_stdin() -> Result<(), Box<dyn Error>> {
    let text: String = (0..100).map(|_| "1000,2000\n").collect();
    let mut cmd = cargo_bin_cmd!("oxi");
    cmd.arg("estimate").write_stdin(text);
    let output = cmd.assert().success().get_output().stdout.clone();
    let row: WindowOutput = serde_json::from_slice(&output)?;
    assert_eq!(row.peak_count, 0);
    Ok(())
}
