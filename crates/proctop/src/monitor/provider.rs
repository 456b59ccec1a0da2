//! Process information provider.
//!
//! Everything the monitor knows about the OS comes through
//! [`ProcessProvider`]: snapshots, thread lists, executable paths, signals
//! and liveness. The live implementation is
//! [`SysinfoProvider`](super::SysinfoProvider); [`InMemoryProvider`] backs the
//! tests and demos with a scripted process set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

/// Process or thread identifier.
pub type Pid = u32;

/// Coarse run state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    #[default]
    Unknown,
}

impl ProcessStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Idle => "idle",
            Self::Stopped => "stopped",
            Self::Zombie => "zombie",
            Self::Unknown => "unknown",
        }
    }
}

/// One process as reported by a snapshot, before table processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: Pid,
    pub parent_pid: Option<Pid>,
    pub name: String,
    /// CPU usage in percent of one core.
    pub cpu_percent: f32,
    /// Resident memory in bytes.
    pub memory: u64,
    pub status: ProcessStatus,
    pub executable_path: Option<PathBuf>,
}

impl RawProcess {
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            parent_pid: None,
            name: name.into(),
            cpu_percent: 0.0,
            memory: 0,
            status: ProcessStatus::Running,
            executable_path: None,
        }
    }

    #[must_use]
    pub fn with_cpu(mut self, cpu_percent: f32) -> Self {
        self.cpu_percent = cpu_percent;
        self
    }

    #[must_use]
    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory = bytes;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Pid) -> Self {
        self.parent_pid = Some(parent);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ProcessStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }
}

/// Why a single record in a snapshot could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Only the pid (and maybe the name) is visible.
    #[error("access denied reading process {pid}")]
    AccessDenied { pid: Pid, name: Option<String> },
    /// The process exited while the snapshot was taken.
    #[error("process {pid} vanished during enumeration")]
    Vanished { pid: Pid },
}

impl RecordError {
    pub fn pid(&self) -> Pid {
        match self {
            Self::AccessDenied { pid, .. } | Self::Vanished { pid } => *pid,
        }
    }
}

/// One snapshot entry: a full record or a per-record failure.
pub type ProcessRecord = Result<RawProcess, RecordError>;

/// A thread of a process as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawThread {
    pub thread_id: Pid,
    /// Accumulated CPU time in seconds.
    pub cpu_time: f64,
}

/// Signals the monitor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite request to exit (SIGTERM).
    Terminate,
    /// Forced kill (SIGKILL).
    Kill,
}

/// Errors from provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("process {0} not found")]
    NotFound(Pid),
    #[error("access denied for process {0}")]
    AccessDenied(Pid),
    /// The OS process listing could not be read at all.
    #[error("process listing unavailable: {0}")]
    Unavailable(String),
    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Source of process information and control.
pub trait ProcessProvider {
    /// Enumerate every visible process.
    ///
    /// Individual records may fail; the whole call fails only when the
    /// listing itself cannot be read.
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, ProviderError>;

    /// Threads of `pid`, including the main thread.
    fn threads(&mut self, pid: Pid) -> Result<Vec<RawThread>, ProviderError>;

    fn executable_path(&mut self, pid: Pid) -> Result<PathBuf, ProviderError>;

    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), ProviderError>;

    /// Whether `pid` (process or thread id) is still running. Zombies count
    /// as exited.
    fn is_alive(&mut self, pid: Pid) -> bool;

    /// Direct children of `pid`, freshly queried.
    fn children(&mut self, pid: Pid) -> Result<Vec<Pid>, ProviderError>;

    /// All descendants of `pid`, deepest first.
    fn descendants(&mut self, pid: Pid) -> Result<Vec<Pid>, ProviderError> {
        walk_descendants(pid, |parent| self.children(parent))
    }

    /// Number of logical CPUs, used to normalize CPU percentages.
    fn cpu_count(&self) -> usize {
        1
    }
}

/// Breadth-first walk below `pid`, returned deepest first.
pub(crate) fn walk_descendants(
    pid: Pid,
    mut children: impl FnMut(Pid) -> Result<Vec<Pid>, ProviderError>,
) -> Result<Vec<Pid>, ProviderError> {
    let mut ordered = Vec::new();
    let mut seen = BTreeSet::from([pid]);
    let mut frontier = vec![pid];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for parent in frontier {
            for child in children(parent)? {
                if seen.insert(child) {
                    ordered.push(child);
                    next.push(child);
                }
            }
        }
        frontier = next;
    }
    ordered.reverse();
    Ok(ordered)
}

#[derive(Debug, Clone)]
struct ScriptedProcess {
    raw: RawProcess,
    alive: bool,
    /// Thread id -> alive.
    threads: BTreeMap<Pid, bool>,
    record_denied: bool,
    exe_denied: bool,
    signal_denied: bool,
    signal_unsupported: bool,
    ignores_terminate: bool,
}

/// Scripted in-memory provider.
///
/// Processes exit immediately when signalled unless told to ignore
/// `Terminate`; every signal sent is recorded in order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    processes: BTreeMap<Pid, ScriptedProcess>,
    vanished: Vec<Pid>,
    failing_snapshots: u32,
    snapshot_calls: u32,
    cpu_count: usize,
    signals: Vec<(Pid, Signal)>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            cpu_count: 1,
            ..Self::default()
        }
    }

    /// Add or replace a process.
    #[must_use]
    pub fn with_process(mut self, raw: RawProcess) -> Self {
        self.insert(raw);
        self
    }

    /// Add or replace a process on an existing provider.
    pub fn insert(&mut self, raw: RawProcess) {
        let pid = raw.pid;
        self.processes.insert(
            pid,
            ScriptedProcess {
                raw,
                alive: true,
                threads: BTreeMap::from([(pid, true)]),
                record_denied: false,
                exe_denied: false,
                signal_denied: false,
                signal_unsupported: false,
                ignores_terminate: false,
            },
        );
    }

    /// Give `pid` extra threads; `(tid, alive)`.
    ///
    /// Dead threads are still listed by `threads`, as when a thread exits
    /// between enumeration and signalling.
    #[must_use]
    pub fn with_threads(mut self, pid: Pid, threads: &[(Pid, bool)]) -> Self {
        if let Some(p) = self.processes.get_mut(&pid) {
            p.threads.extend(threads.iter().copied());
        }
        self
    }

    #[must_use]
    pub fn with_cpu_count(mut self, cpus: usize) -> Self {
        self.cpu_count = cpus.max(1);
        self
    }

    /// Snapshot reports `pid` as access denied.
    #[must_use]
    pub fn deny_record(mut self, pid: Pid) -> Self {
        self.flag(pid, |p| p.record_denied = true);
        self
    }

    /// Executable path lookups for `pid` are denied.
    #[must_use]
    pub fn deny_exe(mut self, pid: Pid) -> Self {
        self.flag(pid, |p| p.exe_denied = true);
        self
    }

    /// Signals to `pid` are denied.
    #[must_use]
    pub fn deny_signal(mut self, pid: Pid) -> Self {
        self.flag(pid, |p| p.signal_denied = true);
        self
    }

    /// Signals to `pid` fail as unsupported.
    #[must_use]
    pub fn unsupported_signal(mut self, pid: Pid) -> Self {
        self.flag(pid, |p| p.signal_unsupported = true);
        self
    }

    /// `pid` survives `Terminate` and only dies on `Kill`.
    #[must_use]
    pub fn ignore_terminate(mut self, pid: Pid) -> Self {
        self.flag(pid, |p| p.ignores_terminate = true);
        self
    }

    /// Next snapshot reports `pid` as vanished mid-enumeration.
    #[must_use]
    pub fn vanish_during_snapshot(mut self, pid: Pid) -> Self {
        self.vanished.push(pid);
        self
    }

    /// The next `n` snapshots fail as unavailable.
    #[must_use]
    pub fn fail_snapshots(mut self, n: u32) -> Self {
        self.failing_snapshots = n;
        self
    }

    /// Make the next `n` snapshots fail on an existing provider.
    pub fn set_failing_snapshots(&mut self, n: u32) {
        self.failing_snapshots = n;
    }

    /// Simulate `pid` exiting on its own.
    pub fn exit(&mut self, pid: Pid) {
        if let Some(p) = self.processes.get_mut(&pid) {
            p.alive = false;
            p.threads.values_mut().for_each(|alive| *alive = false);
        }
    }

    /// Change the sampled CPU usage of a live process.
    pub fn set_cpu(&mut self, pid: Pid, cpu_percent: f32) {
        if let Some(p) = self.processes.get_mut(&pid) {
            p.raw.cpu_percent = cpu_percent;
        }
    }

    pub fn set_memory(&mut self, pid: Pid, bytes: u64) {
        if let Some(p) = self.processes.get_mut(&pid) {
            p.raw.memory = bytes;
        }
    }

    /// Signals sent so far, in order.
    pub fn signals(&self) -> &[(Pid, Signal)] {
        &self.signals
    }

    pub fn snapshot_calls(&self) -> u32 {
        self.snapshot_calls
    }

    fn flag(&mut self, pid: Pid, f: impl FnOnce(&mut ScriptedProcess)) {
        if let Some(p) = self.processes.get_mut(&pid) {
            f(p);
        }
    }

    fn live(&self, pid: Pid) -> Option<&ScriptedProcess> {
        self.processes.get(&pid).filter(|p| p.alive)
    }
}

impl ProcessProvider for InMemoryProvider {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, ProviderError> {
        self.snapshot_calls += 1;
        if self.failing_snapshots > 0 {
            self.failing_snapshots -= 1;
            return Err(ProviderError::Unavailable("scripted failure".into()));
        }

        let vanished = std::mem::take(&mut self.vanished);
        let records = self
            .processes
            .values()
            .filter(|p| p.alive)
            .map(|p| {
                if vanished.contains(&p.raw.pid) {
                    Err(RecordError::Vanished { pid: p.raw.pid })
                } else if p.record_denied {
                    Err(RecordError::AccessDenied {
                        pid: p.raw.pid,
                        name: Some(p.raw.name.clone()),
                    })
                } else {
                    Ok(p.raw.clone())
                }
            })
            .collect();
        Ok(records)
    }

    fn threads(&mut self, pid: Pid) -> Result<Vec<RawThread>, ProviderError> {
        let process = self.live(pid).ok_or(ProviderError::NotFound(pid))?;
        if process.record_denied {
            return Err(ProviderError::AccessDenied(pid));
        }
        Ok(process
            .threads
            .keys()
            .map(|&tid| RawThread {
                thread_id: tid,
                cpu_time: f64::from(tid % 7) * 0.25,
            })
            .collect())
    }

    fn executable_path(&mut self, pid: Pid) -> Result<PathBuf, ProviderError> {
        let process = self.live(pid).ok_or(ProviderError::NotFound(pid))?;
        if process.exe_denied {
            return Err(ProviderError::AccessDenied(pid));
        }
        process
            .raw
            .executable_path
            .clone()
            .ok_or(ProviderError::AccessDenied(pid))
    }

    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), ProviderError> {
        let Some(process) = self.processes.get_mut(&pid).filter(|p| p.alive) else {
            return Err(ProviderError::NotFound(pid));
        };
        if process.signal_denied {
            return Err(ProviderError::AccessDenied(pid));
        }
        if process.signal_unsupported {
            return Err(ProviderError::Unsupported("signal"));
        }
        self.signals.push((pid, signal));
        if signal == Signal::Kill || !process.ignores_terminate {
            process.alive = false;
            process.threads.values_mut().for_each(|alive| *alive = false);
        }
        Ok(())
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        self.processes.values().any(|p| {
            (p.raw.pid == pid && p.alive && p.raw.status != ProcessStatus::Zombie)
                || p.threads.get(&pid).copied().unwrap_or(false)
        })
    }

    fn children(&mut self, pid: Pid) -> Result<Vec<Pid>, ProviderError> {
        Ok(self
            .processes
            .values()
            .filter(|p| p.alive && p.raw.parent_pid == Some(pid))
            .map(|p| p.raw.pid)
            .collect())
    }

    fn cpu_count(&self) -> usize {
        self.cpu_count.max(1)
    }
}
