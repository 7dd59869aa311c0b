//! Interrupt routing while a child owns the terminal.

/// Scoped SIGINT suppression.
///
/// While the guard lives, the calling process ignores SIGINT, so a Ctrl-C
/// aimed at a foreground child is consumed by the child alone instead of
/// tearing down the harness around it. The previous disposition is restored
/// on drop, which covers every exit path of the execution scope.
///
/// The signal handler table is process-global state: overlapping guards in
/// one process are not supported. Parallel runs belong in separate
/// processes, which is what the per-build-ID/run-ID namespacing is for.
#[cfg(unix)]
pub struct SigintGuard {
    prev: libc::sighandler_t,
}

#[cfg(unix)]
impl SigintGuard {
    pub fn install() -> Self {
        let prev = unsafe { libc::signal(libc::SIGINT, libc::SIG_IGN) };
        SigintGuard { prev }
    }
}

#[cfg(unix)]
impl Drop for SigintGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(libc::SIGINT, self.prev);
        }
    }
}

#[cfg(not(unix))]
pub struct SigintGuard;

#[cfg(not(unix))]
impl SigintGuard {
    pub fn install() -> Self {
        SigintGuard
    }
}
