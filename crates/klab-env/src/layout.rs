use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config;
use crate::options::ResolvedOptions;
use crate::ports::PortAssignment;

/// Which engine a run drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Qemu,
    Gem5,
}

/// Build-artifact locations, shared by every run of the same build IDs.
///
/// Each tool's output root is namespaced by its own build ID so parallel
/// builds of one tool never collide. These paths are a layout contract with
/// downstream tooling; renaming any of them is a breaking change.
#[derive(Clone, Debug, Serialize)]
pub struct BuildNamespace {
    pub buildroot_build_dir: PathBuf,
    pub buildroot_config_file: PathBuf,
    pub build_dir: PathBuf,
    pub host_dir: PathBuf,
    pub host_bin_dir: PathBuf,
    pub images_dir: PathBuf,
    pub rootfs_raw_file: PathBuf,
    pub qcow2_file: PathBuf,
    pub staging_dir: PathBuf,
    pub target_dir: PathBuf,

    pub linux_build_dir: PathBuf,
    pub linux_variant_dir: PathBuf,
    pub vmlinux: PathBuf,
    pub linux_image: PathBuf,

    pub qemu_build_dir: PathBuf,
    pub qemu_executable_basename: String,
    pub qemu_executable: PathBuf,
    pub qemu_img_executable: PathBuf,
    pub qemu_guest_build_dir: PathBuf,

    pub gem5_build_dir: PathBuf,
    pub gem5_m5term: PathBuf,
    pub gem5_build_build_dir: PathBuf,
    pub gem5_executable: PathBuf,
    pub gem5_system_dir: PathBuf,
    pub gem5_src_dir: PathBuf,
    pub gem5_config_dir: PathBuf,
    pub gem5_se_file: PathBuf,
    pub gem5_fs_file: PathBuf,

    pub crosstool_ng_out_dir: PathBuf,
    pub crosstool_ng_build_dir: PathBuf,
    pub crosstool_ng_util_dir: PathBuf,
    pub crosstool_ng_config_file: PathBuf,
    pub crosstool_ng_executable: PathBuf,
    pub crosstool_ng_work_dir: PathBuf,
}

/// Per-run locations, additionally namespaced by run ID and mode.
#[derive(Clone, Debug, Serialize)]
pub struct RunNamespace {
    pub run_dir_base: PathBuf,

    pub gem5_run_dir: PathBuf,
    pub m5out_dir: PathBuf,
    pub stats_file: PathBuf,
    pub trace_txt_file: PathBuf,
    pub gem5_readfile: PathBuf,
    pub gem5_termout_file: PathBuf,

    pub qemu_run_dir: PathBuf,
    pub qemu_trace_file: PathBuf,
    pub qemu_trace_txt_file: PathBuf,
    pub qemu_termout_file: PathBuf,
    pub qemu_rrfile: PathBuf,

    /// Reproducible run script inside the active mode's run dir.
    pub run_cmd_file: PathBuf,

    pub ports: PortAssignment,
}

/// The fully derived environment for one resolved option set.
///
/// Pure function of root directory + options: no filesystem access happens
/// here, and the value never changes after construction. Directory creation
/// is the separate [`Env::mkdirs`] step.
#[derive(Clone, Debug, Serialize)]
pub struct Env {
    pub root_dir: PathBuf,
    pub data_dir: PathBuf,
    pub p9_dir: PathBuf,
    pub gem5_worktrees_dir: PathBuf,
    pub out_dir: PathBuf,
    pub bench_boot_file: PathBuf,
    pub dl_dir: PathBuf,
    pub release_dir: PathBuf,
    pub submodules_dir: PathBuf,
    pub buildroot_src_dir: PathBuf,
    pub crosstool_ng_src_dir: PathBuf,
    pub crosstool_ng_defconfig: PathBuf,
    pub gem5_default_src_dir: PathBuf,
    pub linux_src_dir: PathBuf,
    pub extract_vmlinux: PathBuf,
    pub qemu_src_dir: PathBuf,
    pub parsec_src_dir: PathBuf,
    pub ccache_dir: PathBuf,
    pub github_token_file: PathBuf,
    pub config_file: PathBuf,

    pub options: ResolvedOptions,
    pub mode: RunMode,
    pub build: BuildNamespace,
    pub run: RunNamespace,
}

impl Env {
    pub fn new(root_dir: impl Into<PathBuf>, opts: &ResolvedOptions) -> Self {
        let root_dir = root_dir.into();
        let arch = opts.arch;

        let data_dir = root_dir.join("data");
        let p9_dir = data_dir.join("9p");
        let gem5_worktrees_dir = data_dir.join("gem5");
        let out_dir = root_dir.join("out");
        let submodules_dir = root_dir.join("submodules");
        let crosstool_ng_src_dir = submodules_dir.join("crosstool-ng");
        let linux_src_dir = submodules_dir.join("linux");

        let buildroot_build_dir = out_dir
            .join("buildroot")
            .join(arch.as_str())
            .join(&opts.buildroot_build_id);
        let build_dir = buildroot_build_dir.join("build");
        let host_dir = buildroot_build_dir.join("host");
        let images_dir = buildroot_build_dir.join("images");

        let linux_build_dir = build_dir.join("linux-custom");
        // Kernel variants live next to the base build dir, dot-suffixed by
        // build ID: build/linux-custom.<id>.
        let linux_variant_dir = build_dir.join(format!("linux-custom.{}", opts.linux_build_id));

        let qemu_build_dir = out_dir.join("qemu").join(&opts.qemu_build_id);
        let qemu_executable_basename = arch.qemu_system_basename();
        let qemu_executable = qemu_build_dir
            .join(format!("{}-softmmu", arch.as_str()))
            .join(&qemu_executable_basename);

        let gem5_build_dir = out_dir.join("gem5").join(&opts.gem5_build_id);
        let gem5_build_build_dir = gem5_build_dir.join("build");
        let gem5_executable = gem5_build_build_dir
            .join(arch.gem5_arch())
            .join(format!("gem5.{}", opts.gem5_build_type));
        let gem5_src_dir = match &opts.gem5_worktree {
            Some(worktree) => gem5_worktrees_dir.join(worktree),
            None => submodules_dir.join("gem5"),
        };
        let gem5_config_dir = gem5_src_dir.join("configs");

        let crosstool_ng_out_dir = out_dir.join("crosstool-ng").join(&opts.crosstool_ng_build_id);
        let crosstool_ng_util_dir = crosstool_ng_out_dir.join("util");

        let run_dir_base = out_dir.join("run");
        let gem5_run_dir = run_dir_base
            .join("gem5")
            .join(arch.as_str())
            .join(&opts.run_id);
        let m5out_dir = gem5_run_dir.join("m5out");
        let qemu_run_dir = run_dir_base
            .join("qemu")
            .join(arch.as_str())
            .join(&opts.run_id);

        let mode = if opts.gem5 { RunMode::Gem5 } else { RunMode::Qemu };
        let active_run_dir = match mode {
            RunMode::Qemu => &qemu_run_dir,
            RunMode::Gem5 => &gem5_run_dir,
        };
        let ports = match mode {
            RunMode::Qemu => PortAssignment::qemu(opts.port_offset),
            RunMode::Gem5 => PortAssignment::gem5(opts.port_offset),
        };

        let build = BuildNamespace {
            buildroot_config_file: buildroot_build_dir.join(".config"),
            host_bin_dir: host_dir.join("usr").join("bin"),
            rootfs_raw_file: images_dir.join("rootfs.ext2"),
            qcow2_file: images_dir.join("rootfs.ext2.qcow2"),
            staging_dir: buildroot_build_dir.join("staging"),
            target_dir: buildroot_build_dir.join("target"),

            vmlinux: linux_variant_dir.join("vmlinux"),
            linux_image: linux_variant_dir.join(arch.linux_image_rel()),

            qemu_img_executable: qemu_build_dir.join("qemu-img"),
            qemu_guest_build_dir: build_dir.join("qemu-custom"),

            gem5_m5term: gem5_build_dir.join("m5term"),
            gem5_system_dir: gem5_build_dir.join("system"),
            gem5_se_file: gem5_config_dir.join("example").join("se.py"),
            gem5_fs_file: gem5_config_dir.join("example").join("fs.py"),

            crosstool_ng_build_dir: crosstool_ng_out_dir.join(arch.as_str()),
            crosstool_ng_config_file: crosstool_ng_util_dir.join(".config"),
            crosstool_ng_executable: crosstool_ng_util_dir.join("ct-ng"),
            crosstool_ng_work_dir: crosstool_ng_out_dir.join("work"),

            buildroot_build_dir,
            build_dir,
            host_dir,
            images_dir,
            linux_build_dir,
            linux_variant_dir,
            qemu_build_dir,
            qemu_executable_basename,
            qemu_executable,
            gem5_build_dir,
            gem5_build_build_dir,
            gem5_executable,
            gem5_src_dir,
            gem5_config_dir,
            crosstool_ng_out_dir,
            crosstool_ng_util_dir,
        };

        let run = RunNamespace {
            m5out_dir: m5out_dir.clone(),
            stats_file: m5out_dir.join("stats.txt"),
            trace_txt_file: m5out_dir.join("trace.txt"),
            gem5_readfile: gem5_run_dir.join("readfile"),
            gem5_termout_file: gem5_run_dir.join("termout.txt"),

            qemu_trace_file: qemu_run_dir.join("trace.bin"),
            qemu_trace_txt_file: qemu_run_dir.join("trace.txt"),
            qemu_termout_file: qemu_run_dir.join("termout.txt"),
            qemu_rrfile: qemu_run_dir.join("rrfile"),

            run_cmd_file: active_run_dir.join("run.sh"),
            ports,

            run_dir_base,
            gem5_run_dir,
            qemu_run_dir,
        };

        Env {
            bench_boot_file: out_dir.join("bench-boot.txt"),
            dl_dir: out_dir.join("dl"),
            release_dir: out_dir.join("release"),
            buildroot_src_dir: submodules_dir.join("buildroot"),
            crosstool_ng_defconfig: crosstool_ng_src_dir.join("defconfig"),
            gem5_default_src_dir: submodules_dir.join("gem5"),
            extract_vmlinux: linux_src_dir.join("scripts").join("extract-vmlinux"),
            qemu_src_dir: submodules_dir.join("qemu"),
            parsec_src_dir: submodules_dir.join("parsec-benchmark"),
            ccache_dir: PathBuf::from("/usr/lib/ccache"),
            github_token_file: data_dir.join("github-token"),
            config_file: config::config_file_path(&root_dir),

            root_dir,
            data_dir,
            p9_dir,
            gem5_worktrees_dir,
            out_dir,
            submodules_dir,
            crosstool_ng_src_dir,
            linux_src_dir,

            options: opts.clone(),
            mode,
            build,
            run,
        }
    }

    /// The active mode's engine executable.
    pub fn executable(&self) -> &Path {
        match self.mode {
            RunMode::Qemu => &self.build.qemu_executable,
            RunMode::Gem5 => &self.build.gem5_executable,
        }
    }

    /// The active mode's run output directory.
    pub fn run_dir(&self) -> &Path {
        match self.mode {
            RunMode::Qemu => &self.run.qemu_run_dir,
            RunMode::Gem5 => &self.run.gem5_run_dir,
        }
    }

    /// The active mode's terminal-output capture file.
    pub fn termout_file(&self) -> &Path {
        match self.mode {
            RunMode::Qemu => &self.run.qemu_termout_file,
            RunMode::Gem5 => &self.run.gem5_termout_file,
        }
    }

    pub fn gdb_port(&self) -> u32 {
        self.run.ports.gdb_port()
    }

    /// Creates every directory a build or run expects to exist.
    /// Idempotent: pre-existing directories are left untouched.
    pub fn mkdirs(&self) -> Result<()> {
        for dir in [
            &self.build.build_dir,
            &self.build.gem5_build_dir,
            &self.run.gem5_run_dir,
            &self.run.qemu_run_dir,
            &self.p9_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create dir: {}", dir.display()))?;
        }
        Ok(())
    }
}
