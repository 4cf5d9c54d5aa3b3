use crate::jobs::JobClass;
use crate::parser::{Command, Pipeline};
use crate::shell::SHELL_TERMINAL;
use crate::signals::{self, SignalBlocker};
use anyhow::{anyhow, Context as _, Result};
use jsh_types::Context;
use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::signal::{sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2, execvp, fork, getpid, pipe2, setpgid, tcsetpgrp, ForkResult, Pid};
use std::ffi::CString;
use std::fmt;
use std::io::{self, Write as _};
use std::os::unix::io::RawFd;
use tracing::debug;

/// Lifecycle of one spawned child, as reported by the kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessState {
    Running,
    Stopped,
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessState::Running => f.write_str("Running"),
            ProcessState::Stopped => f.write_str("Stopped"),
            ProcessState::Terminated => f.write_str("Terminated"),
        }
    }
}

/// One spawned child of a pipeline. State is mutated only by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: Pid,
    pub cmd: String,
    pub argv: Vec<String>,
    pub state: ProcessState,
}

impl Process {
    pub fn new(pid: Pid, cmd: String, argv: Vec<String>) -> Self {
        Process {
            pid,
            cmd,
            argv,
            state: ProcessState::Running,
        }
    }

    pub fn cmdline(&self) -> String {
        self.argv.join(" ")
    }
}

/// Spawns every command of the pipeline into one fresh process group, wiring
/// standard streams left to right, and registers the job. Foreground
/// pipelines own the terminal and are waited for; background pipelines are
/// announced as `[N] pid …`.
pub fn launch_pipeline(ctx: &Context, pipeline: &Pipeline) -> Result<()> {
    let n = pipeline.commands.len();

    // Keep the reaper out of the job table until the whole pipeline is
    // registered; wait_for_foreground relies on this mask staying in place.
    let _guard = SignalBlocker::new();

    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n.saturating_sub(1));
    for _ in 1..n {
        pipes.push(pipe2(OFlag::O_CLOEXEC).context("failed pipe2")?);
    }

    let class = if pipeline.background {
        JobClass::Background
    } else {
        JobClass::Foreground
    };
    let job_id = signals::job_table().add_job(class);

    let mut leader: Option<Pid> = None;
    let mut terminal_error: Option<anyhow::Error> = None;

    for (pos, command) in pipeline.commands.iter().enumerate() {
        match unsafe { fork() }.context("failed fork")? {
            ForkResult::Child => {
                exec_child(pos, command, pipeline, &pipes, leader);
            }
            ForkResult::Parent { child } => {
                let pgid = *leader.get_or_insert(child);
                // Also done in the child; doing it on both sides closes the
                // setpgid/exec race either way it is scheduled.
                let _ = setpgid(child, pgid);
                if pos == 0 && !pipeline.background && ctx.interactive {
                    if let Err(err) = tcsetpgrp(SHELL_TERMINAL, pgid) {
                        terminal_error = Some(
                            anyhow!(err)
                                .context("failed to transfer terminal to foreground job"),
                        );
                    }
                }
                debug!(
                    "forked pid:{} '{}' pos:{} pgid:{}",
                    child, command.name, pos, pgid
                );
                signals::job_table().add_process(
                    job_id,
                    Process::new(child, command.name.clone(), command.argv.clone()),
                );
            }
        }
    }

    for (read_end, write_end) in pipes {
        close(read_end).ok();
        close(write_end).ok();
    }

    if let Some(err) = terminal_error {
        // The job keeps running but cannot hold the foreground slot.
        if let Some(job) = signals::job_table().get_job_mut(job_id) {
            job.class = JobClass::Background;
        }
        return Err(err);
    }

    if pipeline.background {
        let pids = signals::job_table()
            .get_job(job_id)
            .map(|job| job.pids())
            .unwrap_or_default();
        let pids = pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        println!("[{job_id}] {pids}");
        io::stdout().flush().ok();
    } else {
        signals::wait_for_foreground();
    }

    Ok(())
}

/// Child-side setup between fork and exec: own process group, default signal
/// dispositions, stream wiring, then execvp. Never returns to the caller.
fn exec_child(
    pos: usize,
    command: &Command,
    pipeline: &Pipeline,
    pipes: &[(RawFd, RawFd)],
    leader: Option<Pid>,
) -> ! {
    reset_signals();

    let pgid = leader.unwrap_or_else(|| getpid());
    let _ = setpgid(Pid::from_raw(0), pgid);

    if pos == 0 {
        if let Some(path) = &pipeline.input {
            match open(path.as_str(), OFlag::O_RDONLY, Mode::empty()) {
                Ok(fd) => wire(fd, STDIN_FILENO),
                Err(err) => child_die(&format!("jsh: {path}: {err}")),
            }
        }
    } else {
        let (read_end, _) = pipes[pos - 1];
        if dup2(read_end, STDIN_FILENO).is_err() {
            child_die("jsh: failed to wire pipe onto stdin");
        }
    }

    if pos == pipeline.commands.len() - 1 {
        if let Some(path) = &pipeline.output {
            let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
            match open(path.as_str(), flags, Mode::from_bits_truncate(0o644)) {
                Ok(fd) => wire(fd, STDOUT_FILENO),
                Err(err) => child_die(&format!("jsh: {path}: {err}")),
            }
        }
    } else {
        let (_, write_end) = pipes[pos];
        if dup2(write_end, STDOUT_FILENO).is_err() {
            child_die("jsh: failed to wire pipe onto stdout");
        }
    }
    // Remaining pipe ends carry O_CLOEXEC and vanish at exec.

    let cmd = match CString::new(command.name.clone()) {
        Ok(cmd) => cmd,
        Err(_) => child_die(&format!("jsh: {}: invalid command name", command.name)),
    };
    let argv: Vec<CString> = command
        .argv
        .iter()
        .map(|arg| CString::new(arg.clone()))
        .collect::<std::result::Result<_, _>>()
        .unwrap_or_else(|_| child_die(&format!("jsh: {}: invalid argument", command.name)));

    let err = match execvp(&cmd, &argv) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    match err {
        Errno::ENOENT => child_die(&format!("{}: Command not found.", command.name)),
        other => child_die(&format!("{}: {}", command.name, other)),
    }
}

fn wire(fd: RawFd, stream: RawFd) {
    if dup2(fd, stream).is_err() {
        child_die("jsh: failed to redirect standard stream");
    }
    close(fd).ok();
}

fn child_die(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

/// Restores the dispositions the shell overrides, and clears the signal mask
/// inherited from the launcher's critical section.
fn reset_signals() {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
    ] {
        unsafe {
            sigaction(signal, &action).ok();
        }
    }
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_state_display() {
        assert_eq!(ProcessState::Running.to_string(), "Running");
        assert_eq!(ProcessState::Stopped.to_string(), "Stopped");
        assert_eq!(ProcessState::Terminated.to_string(), "Terminated");
    }

    #[test]
    fn new_processes_start_running() {
        let p = Process::new(
            Pid::from_raw(123),
            "wc".to_string(),
            vec!["wc".to_string(), "-l".to_string()],
        );
        assert_eq!(p.state, ProcessState::Running);
        assert_eq!(p.cmdline(), "wc -l");
    }
}
