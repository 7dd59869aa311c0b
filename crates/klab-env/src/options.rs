use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::arch::{self, Arch};
use crate::config::ConfigOverlay;
use crate::ports;

pub const DEFAULT_BUILD_ID: &str = "default";
pub const DEFAULT_GEM5_BUILD_TYPE: &str = "opt";
pub const DEFAULT_RUN_ID: &str = "0";

/// Option block shared by every harness command.
///
/// Values left unset here fall back to the config overlay and then to the
/// built-in defaults, in that order (explicit flag always wins).
#[derive(Args, Clone, Debug, Default)]
pub struct CommonArgs {
    /// CPU architecture, canonical name or single-letter alias. Default: x86_64.
    #[arg(short = 'a', long, value_parser = arch::parse_arch)]
    pub arch: Option<Arch>,

    /// Buildroot build ID; keeps separate root filesystem builds apart. Default: default.
    #[arg(long, value_name = "ID")]
    pub buildroot_build_id: Option<String>,

    /// crosstool-NG build ID. Default: default.
    #[arg(long, value_name = "ID")]
    pub crosstool_ng_build_id: Option<String>,

    /// Linux build ID; keeps separate kernel builds apart. Default: default.
    #[arg(short = 'L', long, value_name = "ID")]
    pub linux_build_id: Option<String>,

    /// gem5 build ID. Default: default.
    #[arg(short = 'M', long, value_name = "ID")]
    pub gem5_build_id: Option<String>,

    /// gem5 build type, most often "debug". Default: opt.
    #[arg(short = 't', long, value_name = "TYPE")]
    pub gem5_build_type: Option<String>,

    /// QEMU build ID. Default: default.
    #[arg(short = 'Q', long, value_name = "ID")]
    pub qemu_build_id: Option<String>,

    /// gem5 worktree ID under data/gem5; the submodule source is used when absent.
    #[arg(short = 'N', long, value_name = "ID")]
    pub gem5_worktree: Option<String>,

    /// Run ID: namespaces run outputs so several runs can be inspected later. Default: 0.
    #[arg(short = 'n', long, value_name = "ID")]
    pub run_id: Option<String>,

    /// Port offset so parallel instances bind disjoint port blocks.
    /// Default: the run ID when it is an integer, otherwise 0.
    #[arg(long, value_name = "N")]
    pub port_offset: Option<u32>,

    /// Use gem5 instead of QEMU.
    #[arg(short = 'g', long)]
    pub gem5: bool,
}

/// User intent after defaulting; every field has a value.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedOptions {
    pub arch: Arch,
    pub buildroot_build_id: String,
    pub crosstool_ng_build_id: String,
    pub linux_build_id: String,
    pub gem5_build_id: String,
    pub gem5_build_type: String,
    pub qemu_build_id: String,
    pub gem5_worktree: Option<String>,
    pub run_id: String,
    pub port_offset: u32,
    pub gem5: bool,
}

fn pick(flag: &Option<String>, overlay: &Option<String>, default: &str) -> String {
    flag.clone()
        .or_else(|| overlay.clone())
        .unwrap_or_else(|| default.to_string())
}

impl ResolvedOptions {
    pub fn resolve(args: &CommonArgs, overlay: Option<&ConfigOverlay>) -> Result<Self> {
        let fallback = ConfigOverlay::default();
        let overlay = overlay.unwrap_or(&fallback);

        let arch = match (&args.arch, &overlay.arch) {
            (Some(arch), _) => *arch,
            (None, Some(token)) => Arch::parse(token)?,
            (None, None) => Arch::default(),
        };
        let run_id = pick(&args.run_id, &overlay.run_id, DEFAULT_RUN_ID);
        let port_offset =
            ports::resolve_port_offset(args.port_offset.or(overlay.port_offset), &run_id);

        Ok(ResolvedOptions {
            arch,
            buildroot_build_id: pick(
                &args.buildroot_build_id,
                &overlay.buildroot_build_id,
                DEFAULT_BUILD_ID,
            ),
            crosstool_ng_build_id: pick(
                &args.crosstool_ng_build_id,
                &overlay.crosstool_ng_build_id,
                DEFAULT_BUILD_ID,
            ),
            linux_build_id: pick(&args.linux_build_id, &overlay.linux_build_id, DEFAULT_BUILD_ID),
            gem5_build_id: pick(&args.gem5_build_id, &overlay.gem5_build_id, DEFAULT_BUILD_ID),
            gem5_build_type: pick(
                &args.gem5_build_type,
                &overlay.gem5_build_type,
                DEFAULT_GEM5_BUILD_TYPE,
            ),
            qemu_build_id: pick(&args.qemu_build_id, &overlay.qemu_build_id, DEFAULT_BUILD_ID),
            gem5_worktree: args
                .gem5_worktree
                .clone()
                .or_else(|| overlay.gem5_worktree.clone()),
            run_id,
            port_offset,
            gem5: args.gem5 || overlay.gem5.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_defaults_apply() {
        let opts = ResolvedOptions::resolve(&CommonArgs::default(), None).unwrap();
        assert_eq!(opts.arch, Arch::X86_64);
        assert_eq!(opts.buildroot_build_id, "default");
        assert_eq!(opts.gem5_build_type, "opt");
        assert_eq!(opts.run_id, "0");
        assert_eq!(opts.port_offset, 0);
        assert!(!opts.gem5);
        assert!(opts.gem5_worktree.is_none());
    }

    #[test]
    fn overlay_beats_default_and_flag_beats_overlay() {
        let overlay = ConfigOverlay {
            arch: Some("A".to_string()),
            linux_build_id: Some("from-overlay".to_string()),
            run_id: Some("7".to_string()),
            gem5: Some(true),
            ..ConfigOverlay::default()
        };

        let opts = ResolvedOptions::resolve(&CommonArgs::default(), Some(&overlay)).unwrap();
        assert_eq!(opts.arch, Arch::Aarch64);
        assert_eq!(opts.linux_build_id, "from-overlay");
        assert_eq!(opts.run_id, "7");
        assert_eq!(opts.port_offset, 7);
        assert!(opts.gem5);

        let args = CommonArgs {
            arch: Some(Arch::Arm),
            linux_build_id: Some("from-flag".to_string()),
            run_id: Some("2".to_string()),
            ..CommonArgs::default()
        };
        let opts = ResolvedOptions::resolve(&args, Some(&overlay)).unwrap();
        assert_eq!(opts.arch, Arch::Arm);
        assert_eq!(opts.linux_build_id, "from-flag");
        assert_eq!(opts.run_id, "2");
        assert_eq!(opts.port_offset, 2);
    }

    #[test]
    fn overlay_arch_accepts_aliases_and_rejects_junk() {
        let overlay = ConfigOverlay {
            arch: Some("x".to_string()),
            ..ConfigOverlay::default()
        };
        let opts = ResolvedOptions::resolve(&CommonArgs::default(), Some(&overlay)).unwrap();
        assert_eq!(opts.arch, Arch::X86_64);

        let overlay = ConfigOverlay {
            arch: Some("mips".to_string()),
            ..ConfigOverlay::default()
        };
        assert!(ResolvedOptions::resolve(&CommonArgs::default(), Some(&overlay)).is_err());
    }

    #[test]
    fn explicit_port_offset_beats_run_id() {
        let args = CommonArgs {
            run_id: Some("5".to_string()),
            port_offset: Some(11),
            ..CommonArgs::default()
        };
        let opts = ResolvedOptions::resolve(&args, None).unwrap();
        assert_eq!(opts.port_offset, 11);
    }

    #[test]
    fn non_numeric_run_id_defaults_offset_to_zero() {
        let args = CommonArgs {
            run_id: Some("bench-a".to_string()),
            ..CommonArgs::default()
        };
        let opts = ResolvedOptions::resolve(&args, None).unwrap();
        assert_eq!(opts.port_offset, 0);
    }
}
