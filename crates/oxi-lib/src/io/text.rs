use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

use crate::signal::{SamplePair, SAMPLE_MAX};

/// Parse `red,ir` rows. A non-numeric first row is taken as a header;
/// blank lines and `#` comments are skipped.
pub fn parse_sample_pairs<R: Read>(input: R) -> Result<Vec<SamplePair>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(input);
    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", idx + 1))?;
        if record.len() != 2 {
            bail!("row {}: expected 2 columns (red,ir), found {}", idx + 1, record.len());
        }
        let red = &record[0];
        let ir = &record[1];
        if idx == 0 && red.parse::<u32>().is_err() && ir.parse::<u32>().is_err() {
            continue;
        }
        out.push(SamplePair {
            red: parse_channel(red, "red", idx)?,
            ir: parse_channel(ir, "ir", idx)?,
        });
    }
    if out.is_empty() {
        bail!("no sample rows found");
    }
    Ok(out)
}

fn parse_channel(field: &str, name: &str, idx: usize) -> Result<u32> {
    let value: u32 = field
        .parse()
        .with_context(|| format!("row {}: {} is not an unsigned integer: {}", idx + 1, name, field))?;
    if value > SAMPLE_MAX {
        bail!("row {}: {} value {} exceeds 18 bits", idx + 1, name, value);
    }
    Ok(value)
}

/// Read `red,ir` sample pairs from disk.
pub fn read_sample_pairs(path: &Path) -> Result<Vec<SamplePair>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sample_pairs(file).with_context(|| format!("parsing {}", path.display()))
}
