use std::path::Path;

use anyhow::{Context, Result};

/// Formats elapsed whole seconds as HH:MM:SS.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let rem = seconds % 3600;
    format!("{:02}:{:02}:{:02}", hours, rem / 60, rem % 60)
}

/// Removes a file or directory tree; a missing path is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(md) if md.is_dir() => std::fs::remove_dir_all(path)
            .with_context(|| format!("remove dir: {}", path.display())),
        Ok(_) => {
            std::fs::remove_file(path).with_context(|| format!("remove file: {}", path.display()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("stat: {}", path.display())),
    }
}
