use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use klab_runner::{run_cmd, CmdSpec};

// The SIGINT guard is process-global, so every test that drives the runner
// serializes on this lock.
static RUN_LOCK: Mutex<()> = Mutex::new(());

struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("{prefix}_{}_{n}", std::process::id()));
        std::fs::create_dir_all(&path).expect("create temp dir");
        TempDir { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn quiet(argv: Vec<String>) -> CmdSpec {
    CmdSpec {
        show_stdout: false,
        show_cmd: false,
        ..CmdSpec::new(argv)
    }
}

#[cfg(unix)]
fn sigint_disposition() -> libc::sighandler_t {
    unsafe {
        let mut old: libc::sigaction = std::mem::zeroed();
        libc::sigaction(libc::SIGINT, std::ptr::null(), &mut old);
        old.sa_sigaction
    }
}

#[test]
fn captured_output_is_the_combined_child_bytes() {
    let _lock = RUN_LOCK.lock().unwrap();
    let tmp = TempDir::new("klab_runner_capture");
    let out_file = tmp.path().join("logs").join("out.txt");

    let spec = CmdSpec {
        out_file: Some(out_file.clone()),
        ..quiet(sh("printf one; printf two >&2; printf three"))
    };
    let code = run_cmd(&spec).unwrap();
    assert_eq!(code, 0);
    assert_eq!(std::fs::read(&out_file).unwrap(), b"onetwothree");
}

#[test]
fn env_overlay_reaches_the_child() {
    let _lock = RUN_LOCK.lock().unwrap();
    let tmp = TempDir::new("klab_runner_env");
    let out_file = tmp.path().join("out.txt");

    let mut extra_env = BTreeMap::new();
    extra_env.insert("KLAB_T_SET".to_string(), "hello".to_string());
    let spec = CmdSpec {
        out_file: Some(out_file.clone()),
        extra_env,
        ..quiet(sh("printf '%s' \"${KLAB_T_SET:-unset}\""))
    };
    assert_eq!(run_cmd(&spec).unwrap(), 0);
    assert_eq!(std::fs::read(&out_file).unwrap(), b"hello");
}

#[test]
fn removal_beats_override_and_inheritance() {
    let _lock = RUN_LOCK.lock().unwrap();
    let tmp = TempDir::new("klab_runner_unset");
    let out_file = tmp.path().join("out.txt");

    std::env::set_var("KLAB_T_DEL", "inherited");
    let mut extra_env = BTreeMap::new();
    extra_env.insert("KLAB_T_DEL".to_string(), "overridden".to_string());
    let spec = CmdSpec {
        out_file: Some(out_file.clone()),
        extra_env,
        delete_env: vec!["KLAB_T_DEL".to_string()],
        ..quiet(sh("printf '%s' \"${KLAB_T_DEL:-unset}\""))
    };
    assert_eq!(run_cmd(&spec).unwrap(), 0);
    std::env::remove_var("KLAB_T_DEL");
    assert_eq!(std::fs::read(&out_file).unwrap(), b"unset");
}

#[test]
fn cmd_file_reproduces_the_invocation() {
    let _lock = RUN_LOCK.lock().unwrap();
    let tmp = TempDir::new("klab_runner_script");
    let out_file = tmp.path().join("direct.txt");
    let cmd_file = tmp.path().join("run.sh");

    let mut extra_env = BTreeMap::new();
    extra_env.insert("KLAB_T_RT".to_string(), "via env".to_string());
    let spec = CmdSpec {
        out_file: Some(out_file.clone()),
        cmd_file: Some(cmd_file.clone()),
        extra_env,
        delete_env: vec!["KLAB_T_RT_ABSENT".to_string()],
        ..quiet(sh(
            "printf '%s|%s' \"${KLAB_T_RT:-unset}\" \"${KLAB_T_RT_ABSENT:-unset}\"",
        ))
    };
    assert_eq!(run_cmd(&spec).unwrap(), 0);
    let direct = std::fs::read(&out_file).unwrap();

    let script = std::fs::read_to_string(&cmd_file).unwrap();
    assert!(script.starts_with("#!/usr/bin/env bash\n"), "{script}");
    assert!(script.contains("KLAB_T_RT='via env'"), "{script}");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let mode = std::fs::metadata(&cmd_file).unwrap().permissions().mode();
        assert_ne!(mode & 0o100, 0, "owner-execute bit missing: {mode:o}");
    }

    let replay = Command::new("bash").arg(&cmd_file).output().unwrap();
    assert!(replay.status.success());
    assert_eq!(replay.stdout, direct);
    assert_eq!(direct, b"via env|unset");
}

#[test]
fn child_exit_code_is_data_not_an_error() {
    let _lock = RUN_LOCK.lock().unwrap();
    let spec = quiet(sh("exit 7"));
    assert_eq!(run_cmd(&spec).unwrap(), 7);
}

#[cfg(unix)]
#[test]
fn signal_death_maps_to_128_plus_signo() {
    let _lock = RUN_LOCK.lock().unwrap();
    let spec = quiet(sh("kill -TERM $$"));
    assert_eq!(run_cmd(&spec).unwrap(), 128 + libc::SIGTERM);
}

#[test]
fn spawn_failure_is_an_error() {
    let _lock = RUN_LOCK.lock().unwrap();
    let spec = quiet(vec!["/nonexistent/klab-no-such-program".to_string()]);
    let err = run_cmd(&spec).unwrap_err().to_string();
    assert!(err.contains("spawn"), "{err}");

    let err = run_cmd(&quiet(Vec::new())).unwrap_err().to_string();
    assert!(err.contains("empty command"), "{err}");
}

#[cfg(unix)]
#[test]
fn sigint_disposition_is_restored_on_every_path() {
    let _lock = RUN_LOCK.lock().unwrap();
    let before = sigint_disposition();

    assert_eq!(run_cmd(&quiet(sh("true"))).unwrap(), 0);
    assert_eq!(sigint_disposition(), before, "after success");

    assert_eq!(run_cmd(&quiet(sh("exit 3"))).unwrap(), 3);
    assert_eq!(sigint_disposition(), before, "after child failure");

    let tmp = TempDir::new("klab_runner_sig");
    let spec = CmdSpec {
        out_file: Some(tmp.path().join("out.txt")),
        ..quiet(vec!["/nonexistent/klab-no-such-program".to_string()])
    };
    assert!(run_cmd(&spec).is_err());
    assert_eq!(sigint_disposition(), before, "after spawn failure");
}
