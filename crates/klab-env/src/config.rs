use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Optional static defaults, `data/config.json` under the harness root.
///
/// Recognized keys are exactly the overridable options; an unknown key is a
/// configuration error rather than a silent merge.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    pub arch: Option<String>,
    pub buildroot_build_id: Option<String>,
    pub crosstool_ng_build_id: Option<String>,
    pub linux_build_id: Option<String>,
    pub gem5_build_id: Option<String>,
    pub gem5_build_type: Option<String>,
    pub qemu_build_id: Option<String>,
    pub gem5_worktree: Option<String>,
    pub run_id: Option<String>,
    pub port_offset: Option<u32>,
    pub gem5: Option<bool>,
}

pub fn config_file_path(root_dir: &Path) -> PathBuf {
    root_dir.join("data").join("config.json")
}

impl ConfigOverlay {
    /// Loads the overlay if the file exists; absence is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config overlay: {}", path.display()))?;
        let overlay = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse config overlay: {}", path.display()))?;
        Ok(Some(overlay))
    }
}
