//! gem5 checkpoint directory listing.

use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::Regex;

/// Checkpoint directories inside m5out start with this prefix.
pub const CHECKPOINT_PREFIX_RE: &str = r"^cpt\.";

/// Lists checkpoint directory names under `m5out_dir`, oldest first
/// (ties broken by name, so the order is deterministic).
pub fn list(m5out_dir: &Path) -> Result<Vec<String>> {
    let re = Regex::new(CHECKPOINT_PREFIX_RE).context("checkpoint prefix regex")?;
    let mut entries: Vec<(SystemTime, String)> = Vec::new();
    for entry in std::fs::read_dir(m5out_dir)
        .with_context(|| format!("read checkpoint dir: {}", m5out_dir.display()))?
    {
        let entry = entry.context("read checkpoint dir entry")?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !re.is_match(&name) {
            continue;
        }
        let md = entry
            .metadata()
            .with_context(|| format!("stat checkpoint: {}", entry.path().display()))?;
        if !md.is_dir() {
            continue;
        }
        let mtime = md
            .modified()
            .with_context(|| format!("checkpoint mtime: {}", entry.path().display()))?;
        entries.push((mtime, name));
    }
    entries.sort();
    Ok(entries.into_iter().map(|(_, name)| name).collect())
}
