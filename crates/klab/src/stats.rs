//! gem5 statistics file scraping.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

/// Cycle counts of every CPU.
pub const DEFAULT_STAT_RE: &str = "^system.cpu[0-9]*.numCycles$";

/// Returns the value column of every stats row whose name matches
/// `stat_re`. Separator lines (leading `-`) and rows without a value are
/// skipped.
pub fn scrape(stats_file: &Path, stat_re: &str) -> Result<Vec<String>> {
    let re = Regex::new(stat_re).with_context(|| format!("bad stat regex: {stat_re}"))?;
    let file = std::fs::File::open(stats_file)
        .with_context(|| format!("open stats file: {}", stats_file.display()))?;
    let mut out = Vec::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line.context("read stats file")?;
        if line.starts_with('-') {
            continue;
        }
        let mut cols = line.split_whitespace();
        let (Some(name), Some(value)) = (cols.next(), cols.next()) else {
            continue;
        };
        if re.is_match(name) {
            out.push(value.to_string());
        }
    }
    Ok(out)
}
