use crate::process::{Process, ProcessState};
use nix::unistd::Pid;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Whether a job currently owns (or is slated to own) the controlling
/// terminal. At most one job in the table is `Foreground` at any moment.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobClass {
    Foreground,
    Background,
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobClass::Foreground => f.write_str("Foreground"),
            JobClass::Background => f.write_str("Background"),
        }
    }
}

/// The processes spawned from one pipeline, sharing a process group whose id
/// is the pid of the first (leader) process.
#[derive(Debug)]
pub struct Job {
    pub id: u32,
    pub class: JobClass,
    pub pgid: Option<Pid>,
    processes: Vec<Process>,
}

impl Job {
    fn new(id: u32, class: JobClass) -> Self {
        Job {
            id,
            class,
            pgid: None,
            processes: Vec::new(),
        }
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.processes.iter().map(|p| p.pid).collect()
    }

    pub fn contains_process(&self, pid: Pid) -> bool {
        self.processes.iter().any(|p| p.pid == pid)
    }

    /// Pid of the process at pipeline position `index`.
    pub fn process_at(&self, index: usize) -> Option<Pid> {
        self.processes.get(index).map(|p| p.pid)
    }

    pub fn is_live(&self) -> bool {
        self.processes
            .iter()
            .any(|p| p.state != ProcessState::Terminated)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "[{}] {}", self.id, self.class)?;
        for process in &self.processes {
            writeln!(
                f,
                "    {} {:<10} {}",
                process.pid,
                process.state.to_string(),
                process.cmdline()
            )?;
        }
        Ok(())
    }
}

/// Ordered collection of active jobs, keyed by job number.
///
/// This is the shell's sole process-wide mutable state; see `signals` for the
/// access discipline shared with the SIGCHLD handler.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: BTreeMap<u32, Job>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: BTreeMap::new(),
        }
    }

    /// Inserts an empty job under the smallest unused job number and returns
    /// that number. Freed numbers are reused.
    pub fn add_job(&mut self, class: JobClass) -> u32 {
        let id = (1..)
            .find(|n| !self.jobs.contains_key(n))
            .expect("job numbers exhausted");
        debug!("add job [{}] {}", id, class);
        self.jobs.insert(id, Job::new(id, class));
        id
    }

    /// Appends a process to a job; the first appended process defines the
    /// job's group id.
    pub fn add_process(&mut self, id: u32, process: Process) {
        let job = self.jobs.get_mut(&id).expect("job exists while launching");
        if job.pgid.is_none() {
            job.pgid = Some(process.pid);
        }
        debug!("add process {} to job [{}]", process.pid, id);
        job.processes.push(process);
    }

    pub fn contains_job(&self, id: u32) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn get_job(&self, id: u32) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_job_mut(&mut self, id: u32) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains_process(&self, pid: Pid) -> bool {
        self.job_id_with_process(pid).is_some()
    }

    pub fn job_id_with_process(&self, pid: Pid) -> Option<u32> {
        self.jobs
            .values()
            .find(|job| job.contains_process(pid))
            .map(|job| job.id)
    }

    pub fn get_job_with_process(&self, pid: Pid) -> Option<&Job> {
        self.jobs.values().find(|job| job.contains_process(pid))
    }

    pub fn has_foreground_job(&self) -> bool {
        self.foreground_job().is_some()
    }

    pub fn foreground_job(&self) -> Option<&Job> {
        self.jobs
            .values()
            .find(|job| job.class == JobClass::Foreground)
    }

    pub fn foreground_pgid(&self) -> Option<Pid> {
        self.foreground_job().and_then(|job| job.pgid)
    }

    /// Records a state change for the process identified by `pid`. Reaper-side
    /// path: must stay free of tracing and allocation.
    pub fn set_process_state(&mut self, pid: Pid, state: ProcessState) -> bool {
        for job in self.jobs.values_mut() {
            for process in &mut job.processes {
                if process.pid == pid {
                    process.state = state;
                    return true;
                }
            }
        }
        false
    }

    /// Removes the job if every one of its processes has terminated.
    /// Reaper-side path: must stay free of tracing and allocation.
    pub fn synchronize(&mut self, id: u32) {
        if let Some(job) = self.jobs.get(&id) {
            if !job.is_live() {
                self.jobs.remove(&id);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }
}

impl fmt::Display for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for job in self.jobs.values() {
            write!(f, "{job}")?;
        }
        Ok(())
    }
}
