use crate::jobs::{JobClass, JobTable};
use crate::process::ProcessState;
use crate::shell::SHELL_TERMINAL;
use libc::c_int;
use nix::sys::signal::{
    killpg, sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{tcsetpgrp, write, Pid};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The one piece of process-wide data: signal handlers have no other way to
/// reach the job table.
///
/// Locking discipline: non-handler code takes the lock only inside a
/// `SignalBlocker`, and every handler runs with the handled set masked, so
/// the mutex is never contended and `lock()` never blocks.
pub static JOB_TABLE: Lazy<Mutex<JobTable>> = Lazy::new(|| Mutex::new(JobTable::new()));

static SHELL_PGID: AtomicI32 = AtomicI32::new(0);
static INTERACTIVE: AtomicBool = AtomicBool::new(false);

pub fn job_table() -> MutexGuard<'static, JobTable> {
    JOB_TABLE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handled_signals() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTSTP);
    set
}

/// Masks SIGCHLD/SIGINT/SIGTSTP for its lifetime, restoring the previous mask
/// on drop. Every non-handler mutation of the job table happens inside one.
pub struct SignalBlocker {
    saved: SigSet,
}

impl SignalBlocker {
    pub fn new() -> Self {
        let mut saved = SigSet::empty();
        sigprocmask(
            SigmaskHow::SIG_BLOCK,
            Some(&handled_signals()),
            Some(&mut saved),
        )
        .expect("failed sigprocmask");
        SignalBlocker { saved }
    }
}

impl Default for SignalBlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalBlocker {
    fn drop(&mut self) {
        sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.saved), None).ok();
    }
}

/// Installs the shell's handlers. SIGCHLD drives the reaper, SIGINT/SIGTSTP
/// are forwarded to the foreground group, SIGQUIT terminates the shell, and
/// SIGTTIN/SIGTTOU are ignored so a background child touching the terminal
/// never stops the shell itself.
pub fn install_signal_handlers(shell_pgid: Pid, interactive: bool) {
    SHELL_PGID.store(shell_pgid.as_raw(), Ordering::SeqCst);
    INTERACTIVE.store(interactive, Ordering::SeqCst);
    // The table must exist before the first SIGCHLD can arrive.
    Lazy::force(&JOB_TABLE);

    // sa_mask covers the whole handled set: handlers never preempt each other.
    let mask = handled_signals();
    let restart = SaFlags::SA_RESTART;
    unsafe {
        sigaction(
            Signal::SIGCHLD,
            &SigAction::new(SigHandler::Handler(sigchld_handler), restart, mask),
        )
        .expect("failed sigaction");
        sigaction(
            Signal::SIGINT,
            &SigAction::new(SigHandler::Handler(forward_handler), restart, mask),
        )
        .expect("failed sigaction");
        sigaction(
            Signal::SIGTSTP,
            &SigAction::new(SigHandler::Handler(forward_handler), restart, mask),
        )
        .expect("failed sigaction");
        sigaction(
            Signal::SIGQUIT,
            &SigAction::new(SigHandler::Handler(sigquit_handler), restart, SigSet::empty()),
        )
        .expect("failed sigaction");
        sigaction(
            Signal::SIGTTIN,
            &SigAction::new(SigHandler::SigIgn, restart, SigSet::empty()),
        )
        .expect("failed sigaction");
        sigaction(
            Signal::SIGTTOU,
            &SigAction::new(SigHandler::SigIgn, restart, SigSet::empty()),
        )
        .expect("failed sigaction");
    }
}

extern "C" fn sigchld_handler(_sig: c_int) {
    reap_children();
}

extern "C" fn forward_handler(sig: c_int) {
    let signal = match Signal::try_from(sig) {
        Ok(signal) => signal,
        Err(_) => return,
    };
    let pgid = job_table().foreground_pgid();
    if let Some(pgid) = pgid {
        let _ = killpg(pgid, signal);
    }
}

extern "C" fn sigquit_handler(_sig: c_int) {
    std::process::exit(0);
}

/// Drains every pending child-status notification, including stop and
/// continue reports, and applies them to the job table.
///
/// Handler context: nothing here may allocate, take a contended lock, or
/// trace.
pub fn reap_children() {
    let mut table = job_table();
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(Pid::from_raw(-1), Some(flags)) {
            Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                apply_status(&mut table, pid, ProcessState::Terminated);
            }
            Ok(WaitStatus::Stopped(pid, _)) => {
                apply_status(&mut table, pid, ProcessState::Stopped);
            }
            Ok(WaitStatus::Continued(pid)) => {
                apply_status(&mut table, pid, ProcessState::Running);
            }
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => break,
        }
    }
}

fn apply_status(table: &mut JobTable, pid: Pid, state: ProcessState) {
    let job_id = match table.job_id_with_process(pid) {
        Some(id) => id,
        None => return,
    };
    let was_foreground = table
        .get_job(job_id)
        .map(|job| job.class == JobClass::Foreground)
        .unwrap_or(false);

    table.set_process_state(pid, state);

    match state {
        ProcessState::Terminated => {
            table.synchronize(job_id);
            if was_foreground && !table.contains_job(job_id) {
                reclaim_terminal();
            }
        }
        ProcessState::Stopped => {
            if was_foreground {
                reclaim_terminal();
                if let Some(job) = table.get_job_mut(job_id) {
                    job.class = JobClass::Background;
                }
            }
        }
        ProcessState::Running => {}
    }
}

/// Makes the shell's own group the terminal's foreground group again.
/// Handler context: failure is reported with write(2) only.
fn reclaim_terminal() {
    if !INTERACTIVE.load(Ordering::SeqCst) {
        return;
    }
    let pgid = Pid::from_raw(SHELL_PGID.load(Ordering::SeqCst));
    if tcsetpgrp(SHELL_TERMINAL, pgid).is_err() {
        let _ = write(
            libc::STDERR_FILENO,
            b"jsh: fatal: failed to reclaim controlling terminal\n",
        );
    }
}

/// Blocks the caller until the job table has no foreground job.
///
/// Must be entered with a `SignalBlocker` held: the foreground check and the
/// sigsuspend are then atomic with respect to SIGCHLD, so a status change
/// between the two cannot be lost.
pub fn wait_for_foreground() {
    loop {
        if !job_table().has_foreground_job() {
            return;
        }
        // Unmasks everything and sleeps until a handler has run.
        unsafe {
            let empty_set: libc::sigset_t = std::mem::zeroed();
            libc::sigsuspend(&empty_set);
        }
    }
}
