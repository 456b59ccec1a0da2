//! On-demand process inspection: thread lists and executable paths.
//!
//! Nothing here is cached; each call asks the provider again so the answer
//! reflects the process as it is now.

use super::provider::{Pid, ProcessProvider, ProviderError};
use std::path::PathBuf;
use thiserror::Error;

/// Why an inspection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    #[error("process {0} no longer exists")]
    NotFound(Pid),
    #[error("access denied for process {0}")]
    AccessDenied(Pid),
    #[error("inspection unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for InspectError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(pid) => Self::NotFound(pid),
            ProviderError::AccessDenied(pid) => Self::AccessDenied(pid),
            ProviderError::Unavailable(msg) => Self::Unavailable(msg),
            ProviderError::Unsupported(what) => Self::Unavailable(format!("{what} unsupported")),
        }
    }
}

/// A thread of an inspected process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadEntry {
    pub thread_id: Pid,
    pub owning_pid: Pid,
    /// Accumulated CPU time in seconds.
    pub cpu_time: f64,
}

/// Everything the detail overlay shows, each part with its own outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDetails {
    pub pid: Pid,
    pub threads: Result<Vec<ThreadEntry>, InspectError>,
    pub executable_path: Result<PathBuf, InspectError>,
}

/// Borrowing view over a provider for inspection calls.
pub struct Inspector<'a, P: ProcessProvider + ?Sized> {
    provider: &'a mut P,
}

impl<'a, P: ProcessProvider + ?Sized> Inspector<'a, P> {
    pub fn new(provider: &'a mut P) -> Self {
        Self { provider }
    }

    /// Threads of `pid`, sorted by thread id.
    pub fn list_threads(&mut self, pid: Pid) -> Result<Vec<ThreadEntry>, InspectError> {
        let mut threads: Vec<ThreadEntry> = self
            .provider
            .threads(pid)
            .map_err(|err| {
                tracing::debug!(pid, error = %err, "thread listing failed");
                InspectError::from(err)
            })?
            .into_iter()
            .map(|t| ThreadEntry {
                thread_id: t.thread_id,
                owning_pid: pid,
                cpu_time: t.cpu_time,
            })
            .collect();
        threads.sort_by_key(|t| t.thread_id);
        threads.dedup_by_key(|t| t.thread_id);
        Ok(threads)
    }

    pub fn executable_path(&mut self, pid: Pid) -> Result<PathBuf, InspectError> {
        self.provider.executable_path(pid).map_err(|err| {
            tracing::debug!(pid, error = %err, "executable path lookup failed");
            InspectError::from(err)
        })
    }

    pub fn details(&mut self, pid: Pid) -> ProcessDetails {
        ProcessDetails {
            pid,
            threads: self.list_threads(pid),
            executable_path: self.executable_path(pid),
        }
    }
}
