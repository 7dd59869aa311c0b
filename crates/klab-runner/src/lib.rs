//! One-shot external command execution with observable output.
//!
//! Every external tool invocation of the harness goes through [`run_cmd`]:
//! it can render the command for the user, persist a self-executable
//! reproduction script, capture combined stdout+stderr to a log file while
//! echoing it live, and it keeps the calling process immune to interrupts
//! meant for the child. The child's exit status is data, not an error;
//! failing to start the child is an error.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

mod shell;
mod sigint;

pub use shell::{render_cmd, shell_quote};
pub use sigint::SigintGuard;

/// One external command invocation.
#[derive(Clone, Debug)]
pub struct CmdSpec {
    /// Program and arguments.
    pub argv: Vec<String>,
    /// Write a self-executable reproduction script here before running.
    pub cmd_file: Option<PathBuf>,
    /// Capture combined stdout+stderr into this file.
    pub out_file: Option<PathBuf>,
    /// Echo child output to the terminal as it arrives.
    pub show_stdout: bool,
    /// Print the rendered command before running it.
    pub show_cmd: bool,
    /// Environment variables added to or replaced in the child's environment.
    pub extra_env: BTreeMap<String, String>,
    /// Environment variable names removed from the child's environment,
    /// even when also present in `extra_env` or inherited.
    pub delete_env: Vec<String>,
}

impl CmdSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CmdSpec {
            argv: argv.into_iter().map(Into::into).collect(),
            cmd_file: None,
            out_file: None,
            show_stdout: true,
            show_cmd: true,
            extra_env: BTreeMap::new(),
            delete_env: Vec::new(),
        }
    }
}

/// Runs the command to completion and returns its exit status code.
///
/// A non-zero exit is returned as `Ok`; whether that is fatal is the
/// caller's policy. Only failure to start the process or to write the
/// requested files is an `Err`. A child killed by signal N reports 128 + N.
pub fn run_cmd(spec: &CmdSpec) -> Result<i32> {
    let program = spec.argv.first().context("empty command")?.clone();

    if spec.show_cmd {
        println!("{}", shell::render_cmd(&spec.argv, &spec.extra_env));
    }
    if let Some(cmd_file) = &spec.cmd_file {
        write_cmd_file(cmd_file, &spec.argv, &spec.extra_env)?;
    }

    let mut cmd = Command::new(&program);
    cmd.args(&spec.argv[1..]);
    for (key, value) in &spec.extra_env {
        cmd.env(key, value);
    }
    // Removals win: applied after the overlay, and `env_remove` also shadows
    // the inherited environment.
    for key in &spec.delete_env {
        cmd.env_remove(key);
    }

    let status = match &spec.out_file {
        Some(out_file) => run_captured(cmd, &program, out_file, spec.show_stdout)?,
        None => run_passthrough(cmd, &program, spec.show_stdout)?,
    };
    Ok(exit_code(status))
}

fn run_passthrough(mut cmd: Command, program: &str, show_stdout: bool) -> Result<ExitStatus> {
    if !show_stdout {
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
    }
    let _sigint = SigintGuard::install();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn: {program}"))?;
    child.wait().context("wait for child")
}

fn run_captured(
    mut cmd: Command,
    program: &str,
    out_file: &Path,
    show_stdout: bool,
) -> Result<ExitStatus> {
    if let Some(parent) = out_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir: {}", parent.display()))?;
        }
    }
    let mut logfile = std::fs::File::create(out_file)
        .with_context(|| format!("create log file: {}", out_file.display()))?;

    // stdout and stderr share one pipe so the log keeps their interleaving.
    let (mut reader, writer) = std::io::pipe().context("create log pipe")?;
    let writer_err = writer.try_clone().context("clone log pipe")?;
    cmd.stdout(Stdio::from(writer));
    cmd.stderr(Stdio::from(writer_err));

    let _sigint = SigintGuard::install();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn: {program}"))?;
    // The Command still holds the parent's copies of the pipe write ends;
    // dropping it is what lets the reader see EOF when the child exits.
    drop(cmd);

    let mut stdout = std::io::stdout();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).context("read child output")?;
        if n == 0 {
            break;
        }
        logfile
            .write_all(&buf[..n])
            .with_context(|| format!("write log file: {}", out_file.display()))?;
        if show_stdout {
            stdout.write_all(&buf[..n]).context("echo child output")?;
            stdout.flush().context("flush terminal")?;
        }
    }
    child.wait().context("wait for child")
}

/// Writes the rendered command as a bash script and sets the owner-execute
/// bit on top of the existing permissions.
fn write_cmd_file(
    path: &Path,
    argv: &[String],
    extra_env: &BTreeMap<String, String>,
) -> Result<()> {
    let mut script = String::from("#!/usr/bin/env bash\n");
    script.push_str(&shell::render_cmd(argv, extra_env));
    std::fs::write(path, &script)
        .with_context(|| format!("write command script: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let mode = std::fs::metadata(path)
            .with_context(|| format!("stat command script: {}", path.display()))?
            .permissions()
            .mode();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o100))
            .with_context(|| format!("chmod command script: {}", path.display()))?;
    }
    Ok(())
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    status.code().unwrap_or(1)
}
