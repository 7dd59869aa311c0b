//! Cross-toolchain executable lookup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::Glob;

/// Locates a Buildroot cross tool (gcc, readelf, objdump, ...) in the host
/// bin dir. The toolchain tuple prefix varies per configuration, so the
/// lookup matches by glob instead of assembling the tuple.
pub fn toolchain_tool(host_bin_dir: &Path, tool: &str) -> Result<PathBuf> {
    let matcher = Glob::new(&format!("*-buildroot-*-{tool}"))
        .with_context(|| format!("toolchain tool glob: {tool}"))?
        .compile_matcher();
    let mut found: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(host_bin_dir)
        .with_context(|| format!("read host bin dir: {}", host_bin_dir.display()))?
    {
        let entry = entry.context("read host bin dir entry")?;
        let name = entry.file_name();
        if matcher.is_match(Path::new(&name)) {
            found.push(entry.path());
        }
    }
    found.sort();
    match found.into_iter().next() {
        Some(path) => Ok(path),
        None => bail!("no {tool} toolchain tool under {}", host_bin_dir.display()),
    }
}

/// Reads the entry point address from an ELF header via the toolchain
/// readelf.
pub fn elf_entry(readelf: &Path, elf_file: &Path) -> Result<u64> {
    let out = std::process::Command::new(readelf)
        .arg("-h")
        .arg(elf_file)
        .output()
        .with_context(|| format!("run readelf: {}", readelf.display()))?;
    if !out.status.success() {
        bail!("readelf failed for {}", elf_file.display());
    }
    let text = String::from_utf8_lossy(&out.stdout);
    for line in text.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("Entry point address:") {
            let addr = rest.trim();
            return parse_int_auto(addr).with_context(|| format!("parse entry point: {addr}"));
        }
    }
    bail!("no entry point in readelf output for {}", elf_file.display())
}

/// Accepts `0x…` hex or plain decimal, like strtol with base 0.
fn parse_int_auto(s: &str) -> Result<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u64::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse()?)
    }
}
