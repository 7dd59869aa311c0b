use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use klab_env::{config, CommonArgs, ConfigOverlay, Env, ResolvedOptions};
use klab_runner::CmdSpec;

mod checkpoints;
mod github;
mod images;
mod stats;
mod toolchain;
mod util;

#[derive(Debug, Parser)]
#[command(name = "klab")]
#[command(about = "Kernel lab build/run harness utilities.", long_about = None)]
#[command(version)]
struct Cli {
    /// Harness root directory (holds data/, out/ and submodules/).
    /// Default: the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve and print the full environment as JSON.
    Paths(PathsArgs),
    /// Create every directory a build or run expects to exist.
    Mkdir(MkdirArgs),
    /// Remove one tool's build output.
    Clean(CleanArgs),
    /// Run a command through the harness runner.
    Exec(ExecArgs),
    /// Print values scraped from the gem5 stats file.
    Stats(StatsArgs),
    /// List gem5 checkpoint directories, oldest first.
    Checkpoints(CheckpointsArgs),
    /// Convert the root filesystem image between raw and qcow2.
    Qcow2(Qcow2Args),
    /// Print the path of a cross-toolchain tool.
    Tool(ToolArgs),
    /// Print the entry point address of an ELF file.
    ElfEntry(ElfEntryArgs),
    /// Query GitHub releases of the harness repository.
    Release(ReleaseArgs),
}

#[derive(Debug, Args)]
struct PathsArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct MkdirArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct CleanArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Which tool's build output to remove.
    #[arg(long, value_enum)]
    tool: CleanTool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[clap(rename_all = "kebab_case")]
enum CleanTool {
    Buildroot,
    CrosstoolNg,
    Gem5,
    Linux,
    Qemu,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Capture combined stdout and stderr into this file.
    #[arg(long, value_name = "PATH")]
    out_file: Option<PathBuf>,

    /// Write a reproducible run script here before executing.
    #[arg(long, value_name = "PATH")]
    cmd_file: Option<PathBuf>,

    /// Do not echo child output to the terminal.
    #[arg(long)]
    quiet: bool,

    /// Do not print the command before running it.
    #[arg(long)]
    no_show_cmd: bool,

    /// Extra environment for the child, KEY=VALUE. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Environment variable names removed from the child. Repeatable.
    #[arg(long = "unset", value_name = "KEY")]
    unset: Vec<String>,

    /// Print the elapsed wall time after the command finishes.
    #[arg(long)]
    time: bool,

    /// Program and arguments.
    #[arg(
        value_name = "CMD",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    argv: Vec<String>,
}

#[derive(Debug, Args)]
struct StatsArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Regex a stat name must match. Default: per-CPU cycle counts.
    #[arg(long, value_name = "RE")]
    stat_re: Option<String>,

    /// Stats file to scrape instead of the run's stats.txt.
    #[arg(long, value_name = "PATH")]
    stats_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckpointsArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct Qcow2Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Convert qcow2 back to raw instead.
    #[arg(long)]
    reverse: bool,

    /// Use the qemu-img on PATH instead of the built one.
    #[arg(long)]
    prebuilt: bool,
}

#[derive(Debug, Args)]
struct ToolArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Tool suffix to look up (gcc, readelf, objdump, ...).
    #[arg(value_name = "TOOL")]
    tool: String,
}

#[derive(Debug, Args)]
struct ElfEntryArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// ELF file to inspect.
    #[arg(value_name = "PATH")]
    elf_file: PathBuf,
}

#[derive(Debug, Args)]
struct ReleaseArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    cmd: ReleaseCommand,
}

#[derive(Debug, Subcommand)]
enum ReleaseCommand {
    /// List releases.
    List,
    /// Show the latest release.
    Latest,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let Cli { root, cmd } = Cli::parse();
    match cmd {
        Command::Paths(args) => cmd_paths(&root, args),
        Command::Mkdir(args) => cmd_mkdir(&root, args),
        Command::Clean(args) => cmd_clean(&root, args),
        Command::Exec(args) => cmd_exec(args),
        Command::Stats(args) => cmd_stats(&root, args),
        Command::Checkpoints(args) => cmd_checkpoints(&root, args),
        Command::Qcow2(args) => cmd_qcow2(&root, args),
        Command::Tool(args) => cmd_tool(&root, args),
        Command::ElfEntry(args) => cmd_elf_entry(&root, args),
        Command::Release(args) => cmd_release(&root, args),
    }
}

fn resolve_env(root: &Option<PathBuf>, common: &CommonArgs) -> Result<Env> {
    let root = match root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("current dir")?,
    };
    let overlay = ConfigOverlay::load(&config::config_file_path(&root))?;
    let opts = ResolvedOptions::resolve(common, overlay.as_ref())?;
    Ok(Env::new(root, &opts))
}

fn cmd_paths(root: &Option<PathBuf>, args: PathsArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_mkdir(root: &Option<PathBuf>, args: MkdirArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    env.mkdirs()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_clean(root: &Option<PathBuf>, args: CleanArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    let dir = match args.tool {
        CleanTool::Buildroot => &env.build.buildroot_build_dir,
        CleanTool::CrosstoolNg => &env.build.crosstool_ng_build_dir,
        CleanTool::Gem5 => &env.build.gem5_build_dir,
        CleanTool::Linux => &env.build.linux_variant_dir,
        CleanTool::Qemu => &env.build.qemu_build_dir,
    };
    util::remove_if_exists(dir)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_exec(args: ExecArgs) -> Result<ExitCode> {
    let mut extra_env = BTreeMap::new();
    for pair in &args.env {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("malformed --env (expected KEY=VALUE): {pair}"))?;
        extra_env.insert(key.to_string(), value.to_string());
    }
    let spec = CmdSpec {
        cmd_file: args.cmd_file.clone(),
        out_file: args.out_file.clone(),
        show_stdout: !args.quiet,
        show_cmd: !args.no_show_cmd,
        extra_env,
        delete_env: args.unset.clone(),
        ..CmdSpec::new(args.argv.clone())
    };
    let start = Instant::now();
    let code = klab_runner::run_cmd(&spec)?;
    if args.time {
        println!("time {}", util::format_elapsed(start.elapsed().as_secs()));
    }
    Ok(ExitCode::from(code.clamp(0, 255) as u8))
}

fn cmd_stats(root: &Option<PathBuf>, args: StatsArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    let file = args.stats_file.unwrap_or_else(|| env.run.stats_file.clone());
    let re = args.stat_re.as_deref().unwrap_or(stats::DEFAULT_STAT_RE);
    for value in stats::scrape(&file, re)? {
        println!("{value}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_checkpoints(root: &Option<PathBuf>, args: CheckpointsArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    for name in checkpoints::list(&env.run.m5out_dir)? {
        println!("{name}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_qcow2(root: &Option<PathBuf>, args: Qcow2Args) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    images::raw_to_qcow2(&env, args.prebuilt, args.reverse)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_tool(root: &Option<PathBuf>, args: ToolArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    let path = toolchain::toolchain_tool(&env.build.host_bin_dir, &args.tool)?;
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_elf_entry(root: &Option<PathBuf>, args: ElfEntryArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    let readelf = toolchain::toolchain_tool(&env.build.host_bin_dir, "readelf")?;
    let entry = toolchain::elf_entry(&readelf, &args.elf_file)?;
    println!("{entry:#x}");
    Ok(ExitCode::SUCCESS)
}

fn cmd_release(root: &Option<PathBuf>, args: ReleaseArgs) -> Result<ExitCode> {
    let env = resolve_env(root, &args.common)?;
    let path = match args.cmd {
        ReleaseCommand::List => "/releases",
        ReleaseCommand::Latest => "/releases/latest",
    };
    let json = github::make_request(
        &env.github_token_file,
        &github::GithubRequest {
            path,
            ..github::GithubRequest::default()
        },
    )?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(ExitCode::SUCCESS)
}
