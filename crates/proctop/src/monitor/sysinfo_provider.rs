//! Live process provider backed by `sysinfo`.
//!
//! Signals go through `nix` on Unix so the caller can tell a vanished
//! process (ESRCH) from a protected one (EPERM).

use super::provider::{
    walk_descendants, Pid, ProcessProvider, ProcessRecord, ProcessStatus, ProviderError,
    RawProcess, RawThread, Signal,
};
use std::collections::HashMap;
use std::path::PathBuf;
use sysinfo::{
    CpuRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System, ThreadKind, UpdateKind,
};

/// Process provider over a long-lived `sysinfo::System`.
///
/// CPU percentages are deltas between consecutive snapshots, so the first
/// snapshot reports zero CPU for everything.
pub struct SysinfoProvider {
    system: System,
    cpu_count: usize,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        let cpu_count = system.cpus().len().max(1);
        tracing::debug!(cpu_count, "sysinfo provider ready");
        Self { system, cpu_count }
    }

    fn snapshot_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_exe(UpdateKind::OnlyIfNotSet)
    }

    fn refresh_one(&mut self, pid: Pid, kind: ProcessRefreshKind) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sysinfo::Pid::from_u32(pid)]),
            true,
            kind,
        );
    }

    fn refresh_all(&mut self, kind: ProcessRefreshKind) {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, kind);
    }

    /// Userland threads show up as processes on Linux; they are listed per
    /// process through `threads`, not in the table.
    fn is_thread(process: &sysinfo::Process) -> bool {
        matches!(process.thread_kind(), Some(ThreadKind::Userland))
    }

    fn map_status(status: sysinfo::ProcessStatus) -> ProcessStatus {
        match status {
            sysinfo::ProcessStatus::Run => ProcessStatus::Running,
            sysinfo::ProcessStatus::Sleep | sysinfo::ProcessStatus::UninterruptibleDiskSleep => {
                ProcessStatus::Sleeping
            }
            sysinfo::ProcessStatus::Idle => ProcessStatus::Idle,
            sysinfo::ProcessStatus::Stop | sysinfo::ProcessStatus::Tracing => {
                ProcessStatus::Stopped
            }
            sysinfo::ProcessStatus::Zombie | sysinfo::ProcessStatus::Dead => ProcessStatus::Zombie,
            _ => ProcessStatus::Unknown,
        }
    }

    fn is_exited(process: &sysinfo::Process) -> bool {
        matches!(
            process.status(),
            sysinfo::ProcessStatus::Zombie | sysinfo::ProcessStatus::Dead
        )
    }

    /// Pid 0 is the idle task, and `kill(0, ..)` targets our own process
    /// group, so it is never a valid target.
    fn reject_idle(pid: Pid) -> Result<(), ProviderError> {
        if pid == IDLE_PID {
            return Err(ProviderError::NotFound(pid));
        }
        Ok(())
    }

    /// Live processes grouped by parent, from one refresh.
    fn parent_map(&mut self) -> HashMap<Pid, Vec<Pid>> {
        self.refresh_all(ProcessRefreshKind::nothing());
        let mut by_parent: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for (child, proc) in self.system.processes() {
            if Self::is_thread(proc) || Self::is_exited(proc) {
                continue;
            }
            if let Some(parent) = proc.parent() {
                by_parent
                    .entry(parent.as_u32())
                    .or_default()
                    .push(child.as_u32());
            }
        }
        by_parent
    }
}

const IDLE_PID: Pid = 0;

/// CPU seconds (user plus system) consumed by thread `tid` of `pid`.
#[cfg(target_os = "linux")]
fn task_cpu_seconds(pid: Pid, tid: Pid) -> Option<f64> {
    use nix::unistd::{sysconf, SysconfVar};

    let stat = std::fs::read_to_string(format!("/proc/{pid}/task/{tid}/stat")).ok()?;
    let ticks = stat_cpu_ticks(&stat)?;
    let per_second = sysconf(SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .filter(|hz| *hz > 0)
        .map_or(100.0, |hz| hz as f64);
    Some(ticks as f64 / per_second)
}

#[cfg(not(target_os = "linux"))]
fn task_cpu_seconds(_pid: Pid, _tid: Pid) -> Option<f64> {
    None
}

/// `utime + stime` from a `stat` line. The command name may contain spaces
/// and parentheses, so fields are counted from the last `)`.
#[cfg(target_os = "linux")]
fn stat_cpu_ticks(stat: &str) -> Option<u64> {
    let fields: Vec<&str> = stat[stat.rfind(')')? + 1..].split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProvider for SysinfoProvider {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, ProviderError> {
        self.refresh_all(Self::snapshot_kind());

        let processes = self.system.processes();
        if processes.is_empty() {
            return Err(ProviderError::Unavailable("no processes visible".into()));
        }

        Ok(processes
            .iter()
            .filter(|(_, proc)| !Self::is_thread(proc))
            .map(|(pid, proc)| {
                Ok(RawProcess {
                    pid: pid.as_u32(),
                    parent_pid: proc.parent().map(|p| p.as_u32()),
                    name: proc.name().to_string_lossy().to_string(),
                    cpu_percent: proc.cpu_usage(),
                    memory: proc.memory(),
                    status: Self::map_status(proc.status()),
                    executable_path: proc.exe().map(PathBuf::from),
                })
            })
            .collect())
    }

    fn threads(&mut self, pid: Pid) -> Result<Vec<RawThread>, ProviderError> {
        self.refresh_one(pid, ProcessRefreshKind::nothing().with_cpu());
        let process = self
            .system
            .process(sysinfo::Pid::from_u32(pid))
            .filter(|p| !Self::is_exited(p))
            .ok_or(ProviderError::NotFound(pid))?;

        // Without a per-thread listing only the main thread is reported.
        let mut tids: Vec<Pid> = process
            .tasks()
            .map(|tasks| tasks.iter().map(|t| t.as_u32()).collect())
            .unwrap_or_default();
        if !tids.contains(&pid) {
            tids.push(pid);
        }
        tids.sort_unstable();

        Ok(tids
            .into_iter()
            .map(|tid| RawThread {
                thread_id: tid,
                cpu_time: task_cpu_seconds(pid, tid).unwrap_or(0.0),
            })
            .collect())
    }

    fn executable_path(&mut self, pid: Pid) -> Result<PathBuf, ProviderError> {
        self.refresh_one(pid, ProcessRefreshKind::nothing().with_exe(UpdateKind::Always));
        let process = self
            .system
            .process(sysinfo::Pid::from_u32(pid))
            .filter(|p| !Self::is_exited(p))
            .ok_or(ProviderError::NotFound(pid))?;
        process
            .exe()
            .map(PathBuf::from)
            .ok_or(ProviderError::AccessDenied(pid))
    }

    #[cfg(unix)]
    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), ProviderError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal as NixSignal};
        use nix::unistd::Pid as NixPid;

        Self::reject_idle(pid)?;
        let raw = i32::try_from(pid).map_err(|_| ProviderError::NotFound(pid))?;
        let sig = match signal {
            Signal::Terminate => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
        };
        match kill(NixPid::from_raw(raw), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ProviderError::NotFound(pid)),
            Err(Errno::EPERM) => Err(ProviderError::AccessDenied(pid)),
            Err(e) => Err(ProviderError::Unavailable(e.to_string())),
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self, pid: Pid, signal: Signal) -> Result<(), ProviderError> {
        Self::reject_idle(pid)?;
        self.refresh_one(pid, ProcessRefreshKind::nothing());
        let process = self
            .system
            .process(sysinfo::Pid::from_u32(pid))
            .ok_or(ProviderError::NotFound(pid))?;
        let sig = match signal {
            Signal::Terminate => sysinfo::Signal::Term,
            Signal::Kill => sysinfo::Signal::Kill,
        };
        match process.kill_with(sig) {
            Some(true) => Ok(()),
            Some(false) => Err(ProviderError::AccessDenied(pid)),
            None => Err(ProviderError::Unsupported("signal")),
        }
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        if pid == IDLE_PID {
            return false;
        }
        self.refresh_one(pid, ProcessRefreshKind::nothing());
        self.system
            .process(sysinfo::Pid::from_u32(pid))
            .is_some_and(|p| !Self::is_exited(p))
    }

    fn children(&mut self, pid: Pid) -> Result<Vec<Pid>, ProviderError> {
        Self::reject_idle(pid)?;
        Ok(self.parent_map().remove(&pid).unwrap_or_default())
    }

    /// One refresh, then a walk over the parent links.
    fn descendants(&mut self, pid: Pid) -> Result<Vec<Pid>, ProviderError> {
        Self::reject_idle(pid)?;
        let by_parent = self.parent_map();
        walk_descendants(pid, |parent| {
            Ok(by_parent.get(&parent).cloned().unwrap_or_default())
        })
    }

    fn cpu_count(&self) -> usize {
        self.cpu_count
    }
}
