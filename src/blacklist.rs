use crate::error::FilterError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistRegion {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl BlacklistRegion {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self { chrom: chrom.into(), start, end }
    }
}

/// Load blacklist regions from a BED-like file.
///
/// Coordinates are 0-based, half-open [start, end). Only the first three
/// columns are read; anything after them is ignored.
pub fn load_blacklist(path: &Path) -> Result<Vec<BlacklistRegion>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open blacklist {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut regions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read blacklist {}", path.display()))?;
        if let Some(region) = parse_line(&line, path, idx + 1)? {
            regions.push(region);
        }
    }
    tracing::debug!(regions = regions.len(), path = %path.display(), "loaded blacklist");
    Ok(regions)
}

fn parse_line(line: &str, path: &Path, line_no: usize) -> Result<Option<BlacklistRegion>, FilterError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
    {
        return Ok(None);
    }

    let malformed = |msg: String| FilterError::MalformedBlacklist {
        path: path.to_path_buf(),
        line: line_no,
        msg,
    };

    let mut fields = line.split('\t');
    let (Some(chrom), Some(start), Some(end)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed("expected at least 3 tab-separated columns".to_string()));
    };
    if chrom.is_empty() {
        return Err(malformed("empty reference sequence name".to_string()));
    }
    let start: u64 = start
        .trim()
        .parse()
        .map_err(|_| malformed(format!("non-numeric start '{start}'")))?;
    let end: u64 = end
        .trim()
        .parse()
        .map_err(|_| malformed(format!("non-numeric end '{end}'")))?;
    if end < start {
        return Err(malformed(format!("end {end} is before start {start}")));
    }

    Ok(Some(BlacklistRegion::new(chrom, start, end)))
}
