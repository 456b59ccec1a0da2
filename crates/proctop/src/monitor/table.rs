//! Process table model: the ordered, annotated list of processes the UI
//! pages through.

use super::provider::{Pid, ProcessProvider, ProcessRecord, ProcessStatus, RecordError};
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Column the table is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
    Pid,
    Name,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "MEM",
            Self::Pid => "PID",
            Self::Name => "NAME",
        }
    }

    /// Natural direction when the key is first selected.
    pub fn default_descending(self) -> bool {
        matches!(self, Self::Cpu | Self::Memory)
    }
}

/// Active ordering of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortMode {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortMode {
    fn default() -> Self {
        Self::natural(SortKey::Cpu)
    }
}

impl SortMode {
    pub fn natural(key: SortKey) -> Self {
        Self {
            key,
            descending: key.default_descending(),
        }
    }

    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            descending: !self.descending,
            ..self
        }
    }

    /// Total order: the key in the chosen direction, then pid ascending.
    ///
    /// Degraded values sort below every real value.
    pub fn compare(self, a: &ProcessEntry, b: &ProcessEntry) -> Ordering {
        let primary = match self.key {
            SortKey::Cpu => cmp_optional(a.cpu_percent, b.cpu_percent, f32::total_cmp),
            SortKey::Memory => cmp_optional(a.memory, b.memory, |x, y| x.cmp(y)),
            SortKey::Pid => a.pid.cmp(&b.pid),
            SortKey::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
        };
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.pid.cmp(&b.pid))
    }
}

fn cmp_optional<T: Copy>(a: Option<T>, b: Option<T>, f: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => f(&x, &y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Direction of change against the previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Steady,
}

impl Trend {
    pub fn glyph(self) -> char {
        match self {
            Self::Rising => '▲',
            Self::Falling => '▼',
            Self::Steady => ' ',
        }
    }

    fn between(previous: f64, current: f64, threshold: f64) -> Self {
        let delta = current - previous;
        if delta > threshold {
            Self::Rising
        } else if delta < -threshold {
            Self::Falling
        } else {
            Self::Steady
        }
    }
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub parent_pid: Option<Pid>,
    pub name: String,
    /// `None` when the record was unreadable.
    pub cpu_percent: Option<f32>,
    /// Resident bytes, `None` when the record was unreadable.
    pub memory: Option<u64>,
    pub status: ProcessStatus,
    pub executable_path: Option<PathBuf>,
    pub is_new: bool,
    pub cpu_trend: Trend,
    pub memory_trend: Trend,
}

impl ProcessEntry {
    pub fn is_degraded(&self) -> bool {
        self.cpu_percent.is_none() || self.memory.is_none()
    }
}

/// Knobs for how snapshots become table entries.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Divide CPU by the logical CPU count.
    pub normalize_cpu: bool,
    /// Drop the pid 0 pseudo-process.
    pub hide_idle_process: bool,
    pub new_process_window: Duration,
    /// Percentage points.
    pub cpu_trend_delta: f32,
    /// Bytes.
    pub memory_trend_delta: u64,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            normalize_cpu: true,
            hide_idle_process: true,
            new_process_window: Duration::from_secs(5),
            cpu_trend_delta: 10.0,
            memory_trend_delta: 50 * 1024 * 1024,
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Counters from one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub entries: usize,
    pub degraded: usize,
    pub omitted: usize,
}

/// Owned, ordered process list keyed by pid.
#[derive(Debug)]
pub struct ProcessTable {
    entries: Vec<ProcessEntry>,
    positions: HashMap<Pid, usize>,
    first_seen: HashMap<Pid, Option<Instant>>,
    sort: SortMode,
    options: TableOptions,
    refreshes: u64,
}

impl ProcessTable {
    pub fn new(options: TableOptions, sort: SortMode) -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            first_seen: HashMap::new(),
            sort,
            options,
            refreshes: 0,
        }
    }

    /// Take a snapshot from `provider` and swap it in.
    ///
    /// Provider-level failures are retried with exponential backoff; when
    /// every attempt fails the previous list stays in place.
    pub fn refresh<P: ProcessProvider + ?Sized>(
        &mut self,
        provider: &mut P,
    ) -> Result<RefreshStats, MonitorError> {
        let records = self.fetch_with_retry(provider)?;
        let stats = self.apply_snapshot(records, provider.cpu_count(), Instant::now());
        tracing::debug!(
            entries = stats.entries,
            degraded = stats.degraded,
            omitted = stats.omitted,
            "process table refreshed"
        );
        Ok(stats)
    }

    fn fetch_with_retry<P: ProcessProvider + ?Sized>(
        &self,
        provider: &mut P,
    ) -> Result<Vec<ProcessRecord>, MonitorError> {
        let attempts = self.options.retry_attempts.max(1);
        let mut backoff = self.options.retry_backoff;
        let mut reason = String::new();

        for attempt in 1..=attempts {
            match provider.snapshot() {
                Ok(records) => return Ok(records),
                Err(err) => {
                    tracing::warn!(attempt, attempts, error = %err, "process snapshot failed");
                    reason = err.to_string();
                    if attempt < attempts {
                        std::thread::sleep(backoff);
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }
        Err(MonitorError::ProviderUnavailable { attempts, reason })
    }

    /// Build the new entry list from raw records and replace the old one.
    pub fn apply_snapshot(
        &mut self,
        records: Vec<ProcessRecord>,
        cpu_count: usize,
        now: Instant,
    ) -> RefreshStats {
        let cpu_divisor = if self.options.normalize_cpu {
            cpu_count.max(1) as f32
        } else {
            1.0
        };
        let first_refresh = self.refreshes == 0;
        let mut stats = RefreshStats::default();
        let mut entries: Vec<ProcessEntry> = Vec::with_capacity(records.len());
        let mut seen: HashMap<Pid, Option<Instant>> = HashMap::with_capacity(records.len());

        for record in records {
            let pid = match &record {
                Ok(raw) => raw.pid,
                Err(err) => err.pid(),
            };
            if self.options.hide_idle_process && pid == 0 {
                continue;
            }

            let entry = match record {
                Ok(raw) => ProcessEntry {
                    pid: raw.pid,
                    parent_pid: raw.parent_pid,
                    name: raw.name,
                    cpu_percent: Some((raw.cpu_percent / cpu_divisor).max(0.0)),
                    memory: Some(raw.memory),
                    status: raw.status,
                    executable_path: raw.executable_path,
                    is_new: false,
                    cpu_trend: Trend::Steady,
                    memory_trend: Trend::Steady,
                },
                Err(RecordError::AccessDenied { pid, name }) => {
                    tracing::debug!(pid, "degraded process record");
                    stats.degraded += 1;
                    let fallback = self.entry(pid).map(|e| e.name.clone());
                    ProcessEntry {
                        pid,
                        parent_pid: self.entry(pid).and_then(|e| e.parent_pid),
                        name: name.or(fallback).unwrap_or_else(|| "<unknown>".into()),
                        cpu_percent: None,
                        memory: None,
                        status: ProcessStatus::Unknown,
                        executable_path: None,
                        is_new: false,
                        cpu_trend: Trend::Steady,
                        memory_trend: Trend::Steady,
                    }
                }
                Err(RecordError::Vanished { pid }) => {
                    tracing::debug!(pid, "process vanished during snapshot");
                    stats.omitted += 1;
                    continue;
                }
            };

            if seen.contains_key(&entry.pid) {
                stats.omitted += 1;
                continue;
            }
            // `None` marks processes that were already running at startup
            let first = match self.first_seen.get(&entry.pid) {
                Some(first) => *first,
                None if first_refresh => None,
                None => Some(now),
            };
            seen.insert(entry.pid, first);
            entries.push(entry);
        }

        for entry in &mut entries {
            entry.is_new = seen.get(&entry.pid).copied().flatten().is_some_and(|first| {
                now.saturating_duration_since(first) < self.options.new_process_window
            });
            if let Some(previous) = self.entry(entry.pid) {
                if let (Some(old), Some(new)) = (previous.cpu_percent, entry.cpu_percent) {
                    entry.cpu_trend = Trend::between(
                        f64::from(old),
                        f64::from(new),
                        f64::from(self.options.cpu_trend_delta),
                    );
                }
                if let (Some(old), Some(new)) = (previous.memory, entry.memory) {
                    entry.memory_trend = Trend::between(
                        old as f64,
                        new as f64,
                        self.options.memory_trend_delta as f64,
                    );
                }
            }
        }

        let sort = self.sort;
        entries.sort_by(|a, b| sort.compare(a, b));

        stats.entries = entries.len();
        self.positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.pid, i))
            .collect();
        self.entries = entries;
        self.first_seen = seen;
        self.refreshes += 1;
        stats
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
        self.entries.sort_by(|a, b| sort.compare(a, b));
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.pid, i))
            .collect();
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort
    }

    pub fn entries(&self) -> &[ProcessEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProcessEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, pid: Pid) -> Option<usize> {
        self.positions.get(&pid).copied()
    }

    pub fn entry(&self, pid: Pid) -> Option<&ProcessEntry> {
        self.position(pid).and_then(|i| self.entries.get(i))
    }

    /// Entries in `[start, end)`, clamped to the list.
    pub fn slice(&self, start: usize, end: usize) -> &[ProcessEntry] {
        let end = end.min(self.entries.len());
        let start = start.min(end);
        &self.entries[start..end]
    }

    /// Number of completed refreshes.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::provider::{InMemoryProvider, RawProcess};

    fn options() -> TableOptions {
        TableOptions {
            normalize_cpu: false,
            retry_backoff: Duration::ZERO,
            ..TableOptions::default()
        }
    }

    fn table() -> ProcessTable {
        ProcessTable::new(options(), SortMode::default())
    }

    fn raw(pid: Pid, cpu: f32, mem: u64) -> ProcessRecord {
        Ok(RawProcess::new(pid, format!("proc{pid}"))
            .with_cpu(cpu)
            .with_memory(mem))
    }

    fn pids(table: &ProcessTable) -> Vec<Pid> {
        table.entries().iter().map(|e| e.pid).collect()
    }

    #[test]
    fn test_default_sort_is_cpu_descending_with_pid_tiebreak() {
        let mut t = table();
        t.apply_snapshot(
            vec![raw(3, 5.0, 1), raw(1, 50.0, 1), raw(2, 5.0, 1)],
            1,
            Instant::now(),
        );
        assert_eq!(pids(&t), vec![1, 2, 3]);
        assert_eq!(t.position(3), Some(2));
    }

    #[test]
    fn test_sort_by_memory_and_reverse() {
        let mut t = table();
        t.apply_snapshot(
            vec![raw(1, 0.0, 300), raw(2, 0.0, 100), raw(3, 0.0, 200)],
            1,
            Instant::now(),
        );
        t.set_sort(SortMode::natural(SortKey::Memory));
        assert_eq!(pids(&t), vec![1, 3, 2]);
        t.set_sort(SortMode::natural(SortKey::Memory).reversed());
        assert_eq!(pids(&t), vec![2, 3, 1]);
        assert_eq!(t.position(2), Some(0));
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive() {
        let mut t = ProcessTable::new(options(), SortMode::natural(SortKey::Name));
        t.apply_snapshot(
            vec![
                Ok(RawProcess::new(1, "zsh")),
                Ok(RawProcess::new(2, "Bash")),
                Ok(RawProcess::new(3, "awk")),
            ],
            1,
            Instant::now(),
        );
        assert_eq!(pids(&t), vec![3, 2, 1]);
    }

    #[test]
    fn test_degraded_record_kept_and_sorted_last() {
        let mut t = table();
        let mut records: Vec<ProcessRecord> = (1..=50).map(|pid| raw(pid, 1.0, 10)).collect();
        records.push(Err(RecordError::AccessDenied {
            pid: 99,
            name: Some("secret".into()),
        }));
        let stats = t.apply_snapshot(records, 1, Instant::now());

        assert_eq!(t.len(), 51);
        assert_eq!(stats.degraded, 1);
        let last = t.entries().last().unwrap();
        assert_eq!(last.pid, 99);
        assert!(last.is_degraded());
        assert_eq!(last.name, "secret");
    }

    #[test]
    fn test_vanished_record_omitted() {
        let mut t = table();
        let stats = t.apply_snapshot(
            vec![raw(1, 0.0, 0), Err(RecordError::Vanished { pid: 2 })],
            1,
            Instant::now(),
        );
        assert_eq!(t.len(), 1);
        assert_eq!(stats.omitted, 1);
    }

    #[test]
    fn test_duplicate_pids_collapse() {
        let mut t = table();
        t.apply_snapshot(vec![raw(1, 1.0, 0), raw(1, 2.0, 0)], 1, Instant::now());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_idle_process_hidden() {
        let mut t = table();
        t.apply_snapshot(vec![raw(0, 99.0, 0), raw(1, 0.0, 0)], 1, Instant::now());
        assert_eq!(pids(&t), vec![1]);

        let mut shown = ProcessTable::new(
            TableOptions {
                hide_idle_process: false,
                ..options()
            },
            SortMode::default(),
        );
        shown.apply_snapshot(vec![raw(0, 99.0, 0), raw(1, 0.0, 0)], 1, Instant::now());
        assert_eq!(pids(&shown), vec![0, 1]);
    }

    #[test]
    fn test_hidden_idle_process_not_counted() {
        let mut t = table();
        let stats = t.apply_snapshot(
            vec![
                Err(RecordError::AccessDenied { pid: 0, name: None }),
                Err(RecordError::Vanished { pid: 0 }),
                raw(1, 0.0, 0),
            ],
            1,
            Instant::now(),
        );
        assert_eq!(stats.degraded, 0);
        assert_eq!(stats.omitted, 0);
        assert_eq!(pids(&t), vec![1]);
    }

    #[test]
    fn test_cpu_normalized_by_core_count() {
        let mut t = ProcessTable::new(TableOptions::default(), SortMode::default());
        t.apply_snapshot(vec![raw(1, 200.0, 0)], 4, Instant::now());
        assert_eq!(t.entry(1).unwrap().cpu_percent, Some(50.0));
    }

    #[test]
    fn test_trends_against_previous_sample() {
        let mut t = table();
        let now = Instant::now();
        let mb = 1024 * 1024;
        t.apply_snapshot(vec![raw(1, 10.0, 100 * mb), raw(2, 50.0, 100 * mb)], 1, now);
        t.apply_snapshot(vec![raw(1, 30.0, 100 * mb), raw(2, 45.0, 10 * mb)], 1, now);

        let one = t.entry(1).unwrap();
        assert_eq!(one.cpu_trend, Trend::Rising);
        assert_eq!(one.memory_trend, Trend::Steady);
        let two = t.entry(2).unwrap();
        assert_eq!(two.cpu_trend, Trend::Steady);
        assert_eq!(two.memory_trend, Trend::Falling);
    }

    #[test]
    fn test_new_process_highlight_window() {
        let mut t = table();
        let start = Instant::now();
        t.apply_snapshot(vec![raw(1, 0.0, 0)], 1, start);
        assert!(!t.entry(1).unwrap().is_new, "startup processes are not new");

        t.apply_snapshot(vec![raw(1, 0.0, 0), raw(2, 0.0, 0)], 1, start + Duration::from_secs(1));
        assert!(t.entry(2).unwrap().is_new);
        assert!(!t.entry(1).unwrap().is_new);

        t.apply_snapshot(vec![raw(1, 0.0, 0), raw(2, 0.0, 0)], 1, start + Duration::from_secs(7));
        assert!(!t.entry(2).unwrap().is_new);
    }

    #[test]
    fn test_refresh_retries_then_succeeds() {
        let mut provider = InMemoryProvider::new()
            .with_process(RawProcess::new(1, "init"))
            .fail_snapshots(2);
        let mut t = table();
        let stats = t.refresh(&mut provider).unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(provider.snapshot_calls(), 3);
    }

    #[test]
    fn test_refresh_gives_up_and_keeps_old_list() {
        let mut provider = InMemoryProvider::new().with_process(RawProcess::new(1, "init"));
        let mut t = table();
        t.refresh(&mut provider).unwrap();

        provider.set_failing_snapshots(5);
        let err = t.refresh(&mut provider).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::ProviderUnavailable { attempts: 3, .. }
        ));
        assert_eq!(pids(&t), vec![1]);
    }

    #[test]
    fn test_slice_is_clamped() {
        let mut t = table();
        t.apply_snapshot((1..=5).map(|p| raw(p, 0.0, 0)).collect(), 1, Instant::now());
        assert_eq!(t.slice(3, 10).len(), 2);
        assert!(t.slice(8, 10).is_empty());
    }
}
