//! Interactive terminal process monitor.
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)] // terminal coordinates are u16 by construction
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::format_push_string)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::doc_markdown)]
//!
//! `proctop` samples the OS process set on a timer, keeps an ordered table
//! keyed by pid, and renders the visible page of it to a terminal. From the
//! list an operator can inspect a process's threads, look up its executable,
//! or terminate it together with its children.
//!
//! # Architecture
//!
//! - [`monitor::ProcessProvider`] is the seam to the OS. [`monitor::SysinfoProvider`]
//!   (feature `system`) reads the live system; [`monitor::InMemoryProvider`]
//!   is a scripted stand-in for tests.
//! - [`monitor::ProcessTable`] owns the entries; [`monitor::Selection`] refers to
//!   them by pid only.
//! - [`terminal::Terminal`] hides raw mode, input and output so the event loop
//!   runs unchanged against [`terminal::TestableBackend`].
//! - Frames are drawn into a [`direct::CellBuffer`] and written by the
//!   [`direct::DiffRenderer`], which only emits changed cells.
//!
//! # Example
//!
//! ```ignore
//! use proctop::monitor::{App, MonitorConfig, SysinfoProvider};
//! use proctop::terminal::{CrosstermBackend, GenericTerminal};
//!
//! let mut app = App::new(SysinfoProvider::new(), MonitorConfig::default());
//! let mut terminal = GenericTerminal::new(CrosstermBackend::new());
//! app.run(&mut terminal)?;
//! ```

pub mod color;
pub mod direct;
pub mod error;
pub mod monitor;
pub mod terminal;

pub use color::{Color, ColorMode};
pub use error::{ConfigError, MonitorError};
pub use monitor::{App, MonitorConfig, ProcessProvider};
pub use terminal::{CrosstermTerminal, GenericTerminal, Terminal, TerminalBackend, TestableBackend};
