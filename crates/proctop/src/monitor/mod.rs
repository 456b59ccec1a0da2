//! The live process-table engine and the interactive monitor built on it.
//!
//! - `provider`: OS process enumeration and signalling behind a trait
//! - `table`: ordered, pid-keyed process list refreshed from snapshots
//! - `viewport`: pagination and selection over the table
//! - `inspector`: on-demand thread and executable-path lookups
//! - `terminate`: termination of a process with its children and threads
//! - `config`, `input`, `app`, `ui`: the terminal front end

pub mod app;
pub mod config;
pub mod input;
pub mod inspector;
pub mod provider;
#[cfg(feature = "system")]
pub mod sysinfo_provider;
pub mod table;
pub mod terminate;
pub mod ui;
pub mod viewport;

pub use app::{App, Notice, NoticeLevel, Overlay};
pub use config::MonitorConfig;
pub use input::Command;
pub use inspector::{InspectError, Inspector, ProcessDetails, ThreadEntry};
pub use provider::{
    InMemoryProvider, Pid, ProcessProvider, ProcessRecord, ProcessStatus, ProviderError,
    RawProcess, RawThread, RecordError, Signal,
};
#[cfg(feature = "system")]
pub use sysinfo_provider::SysinfoProvider;
pub use table::{ProcessEntry, ProcessTable, RefreshStats, SortKey, SortMode, TableOptions, Trend};
pub use terminate::{
    Outcome, OutcomeCounts, TerminationController, TerminationPolicy, TerminationReport,
    TerminationResult, VictimKind,
};
pub use viewport::{compute_view, Direction, Reconciled, Selection, View};
