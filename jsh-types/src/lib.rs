use anyhow::Result;
use libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::Pid;
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::mem;
use std::os::unix::io::FromRawFd;
use std::os::unix::io::RawFd;
use thiserror::Error;

/// jsh specific error types. The `Display` text of the job-control variants
/// is the exact message shown to the user.
#[derive(Error, Debug)]
pub enum JshError {
    #[error("Usage: {0}.")]
    Usage(String),

    #[error("{cmd} {job_id}: No such job.")]
    NoSuchJob { cmd: &'static str, job_id: u32 },

    #[error("No process with pid {0}.")]
    NoSuchProcess(i32),

    #[error("No job with id {0}.")]
    NoJobWithId(u32),

    #[error("Job {job_id} doesn't have a process at index {index}.")]
    NoProcessAtIndex { job_id: u32, index: usize },

    #[error("{0}")]
    Parse(String),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    System(String),
}

pub type JshResult<T> = std::result::Result<T, JshError>;

/// Per-invocation execution context handed to builtins and the launcher.
#[derive(Clone)]
pub struct Context {
    pub shell_pid: Pid,
    pub shell_pgid: Pid,
    pub interactive: bool,
    pub foreground: bool,
    pub infile: RawFd,
    pub outfile: RawFd,
    pub errfile: RawFd,
}

impl Context {
    pub fn new(shell_pid: Pid, shell_pgid: Pid, interactive: bool) -> Self {
        Context {
            shell_pid,
            shell_pgid,
            interactive,
            foreground: true,
            infile: STDIN_FILENO,
            outfile: STDOUT_FILENO,
            errfile: STDERR_FILENO,
        }
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Context")
            .field("shell_pid", &self.shell_pid)
            .field("shell_pgid", &self.shell_pgid)
            .field("interactive", &self.interactive)
            .field("foreground", &self.foreground)
            .field("infile", &self.infile)
            .field("outfile", &self.outfile)
            .field("errfile", &self.errfile)
            .finish()
    }
}

impl Context {
    pub fn write_stdout(&self, msg: &str) -> Result<()> {
        // Borrow the fd; the File must not close it on drop.
        let mut file = unsafe { File::from_raw_fd(self.outfile) };
        writeln!(&mut file, "{msg}")?;
        mem::forget(file);
        Ok(())
    }

    pub fn write_stderr(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.errfile) };
        writeln!(&mut file, "{msg}")?;
        mem::forget(file);
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    ExitedWith(i32),
}
