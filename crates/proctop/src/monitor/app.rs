//! Monitor controller: owns the table, the selection and the overlays, and
//! runs the poll / refresh / redraw loop.

use super::config::MonitorConfig;
use super::input::{self, Command};
use super::inspector::{InspectError, Inspector, ProcessDetails};
use super::provider::{Pid, ProcessProvider};
use super::table::{ProcessEntry, ProcessTable, SortKey, SortMode};
use super::terminate::{Outcome, TerminationController, TerminationReport};
use super::ui;
use super::viewport::{Direction, Reconciled, Selection, View};
use crate::color::ColorMode;
use crate::direct::{CellBuffer, DiffRenderer};
use crate::error::MonitorError;
use crate::terminal::Terminal;
use crossterm::event::{Event, KeyCode, KeyModifiers};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long a notice stays in the status line.
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Modal panel drawn over the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Help,
    Threads {
        name: String,
        details: ProcessDetails,
        scroll: usize,
    },
    ExecutablePath {
        pid: Pid,
        name: String,
        path: Result<PathBuf, InspectError>,
    },
    ConfirmKill {
        pid: Pid,
        name: String,
    },
    KillReport {
        name: String,
        report: TerminationReport,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Transient status-line message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
    expires: Instant,
}

/// Interactive process monitor over a provider.
pub struct App<P: ProcessProvider> {
    provider: P,
    config: MonitorConfig,
    table: ProcessTable,
    selection: Selection,
    overlay: Option<Overlay>,
    notice: Option<Notice>,
    page_size: usize,
    color_mode: ColorMode,
    last_refresh: Option<Instant>,
    refresh_pending: bool,
    running: bool,
}

impl<P: ProcessProvider> App<P> {
    pub fn new(provider: P, config: MonitorConfig) -> Self {
        let table = ProcessTable::new(config.table_options(), config.sort_mode());
        Self {
            provider,
            config,
            table,
            selection: Selection::default(),
            overlay: None,
            notice: None,
            page_size: 0,
            color_mode: ColorMode::detect(),
            last_refresh: None,
            refresh_pending: true,
            running: true,
        }
    }

    #[must_use]
    pub fn with_color_mode(mut self, color_mode: ColorMode) -> Self {
        self.color_mode = color_mode;
        self
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected(&self) -> Option<&ProcessEntry> {
        self.selection.selected_pid.and_then(|pid| self.table.entry(pid))
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows available for the table; the selection is kept on screen.
    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size != self.page_size {
            self.page_size = page_size;
            self.selection.navigate(&self.table, page_size, Direction::Stay);
        }
    }

    /// Visible window for the current selection.
    pub fn view(&self) -> View {
        self.selection.view(&self.table, self.page_size)
    }

    /// Refresh when the interval has elapsed or a refresh was requested.
    pub fn tick(&mut self, now: Instant) -> Result<(), MonitorError> {
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| now >= notice.expires)
        {
            self.notice = None;
        }
        let due = self
            .last_refresh
            .map_or(true, |last| now.duration_since(last) >= self.config.refresh_interval());
        if self.refresh_pending || due {
            self.refresh()?;
        }
        Ok(())
    }

    /// Take a snapshot now and reconcile the selection against it.
    pub fn refresh(&mut self) -> Result<(), MonitorError> {
        self.refresh_pending = false;
        self.last_refresh = Some(Instant::now());
        self.table.refresh(&mut self.provider)?;

        if let Reconciled::Reanchored { from, to } = self.selection.reconcile(&self.table) {
            tracing::debug!(?from, to, "selection re-anchored");
        }
        self.selection
            .navigate(&self.table, self.page_size, Direction::Stay);
        self.refresh_open_threads();
        Ok(())
    }

    /// Thread lists are never carried across refreshes.
    fn refresh_open_threads(&mut self) {
        let Some(Overlay::Threads { details, .. }) = &self.overlay else {
            return;
        };
        let pid = details.pid;
        let fresh = Inspector::new(&mut self.provider).details(pid);
        if fresh.threads == Err(InspectError::NotFound(pid)) {
            self.overlay = None;
            self.set_notice(format!("process {pid} exited"), NoticeLevel::Warning);
            return;
        }
        if let Some(Overlay::Threads { details, .. }) = &mut self.overlay {
            *details = fresh;
        }
    }

    fn set_notice(&mut self, text: String, level: NoticeLevel) {
        self.notice = Some(Notice {
            text,
            level,
            expires: Instant::now() + NOTICE_TTL,
        });
    }

    /// The selected process vanished under an action.
    fn lost_process(&mut self, pid: Pid) {
        self.set_notice(format!("process {pid} no longer exists"), NoticeLevel::Warning);
        self.selection.clear();
        self.refresh_pending = true;
    }

    /// Handle a key press. Returns true when the monitor should exit.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if input::is_interrupt(code, modifiers) {
            self.running = false;
            return true;
        }

        if let Some(overlay) = &mut self.overlay {
            match overlay {
                Overlay::ConfirmKill { pid, name } => {
                    let (pid, name) = (*pid, name.clone());
                    match code {
                        KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                            self.overlay = None;
                            self.terminate(pid, name);
                        }
                        KeyCode::Char('n' | 'N' | 'q' | 'Q') | KeyCode::Esc => {
                            self.overlay = None;
                        }
                        _ => {}
                    }
                }
                Overlay::Threads {
                    scroll, details, ..
                } => match code {
                    KeyCode::Up => *scroll = scroll.saturating_sub(1),
                    KeyCode::Down => *scroll = (*scroll + 1).min(last_thread_row(details)),
                    KeyCode::PageUp => *scroll = scroll.saturating_sub(self.page_size.max(1)),
                    KeyCode::PageDown => {
                        *scroll = (*scroll + self.page_size.max(1)).min(last_thread_row(details));
                    }
                    KeyCode::Char('q' | 'Q') => {
                        self.running = false;
                        return true;
                    }
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('t' | 'T') => {
                        self.overlay = None;
                    }
                    _ => {}
                },
                _ => match code {
                    KeyCode::Char('q' | 'Q') => {
                        self.running = false;
                        return true;
                    }
                    KeyCode::Esc
                    | KeyCode::Enter
                    | KeyCode::Char('?' | 'e' | 'E')
                    | KeyCode::F(1) => {
                        self.overlay = None;
                    }
                    _ => {}
                },
            }
            return false;
        }

        let Some(command) = input::map_key(code, modifiers) else {
            return false;
        };
        match command {
            Command::Quit => {
                self.running = false;
                return true;
            }
            Command::Move(direction) => {
                self.selection.navigate(&self.table, self.page_size, direction);
            }
            Command::SortBy(key) => self.sort_by(key),
            Command::ReverseSort => self.apply_sort(self.table.sort_mode().reversed()),
            Command::Help => self.overlay = Some(Overlay::Help),
            Command::Dismiss => self.notice = None,
            Command::Threads => self.open_threads(),
            Command::ExecutablePath => self.open_executable_path(),
            Command::Kill => {
                if let Some(entry) = self.selected() {
                    self.overlay = Some(Overlay::ConfirmKill {
                        pid: entry.pid,
                        name: entry.name.clone(),
                    });
                } else {
                    self.set_notice("no process selected".into(), NoticeLevel::Info);
                }
            }
        }
        false
    }

    /// Same key twice flips the direction.
    fn sort_by(&mut self, key: SortKey) {
        let current = self.table.sort_mode();
        let next = if current.key == key {
            current.reversed()
        } else {
            SortMode::natural(key)
        };
        self.apply_sort(next);
    }

    fn apply_sort(&mut self, sort: SortMode) {
        self.table.set_sort(sort);
        self.selection
            .navigate(&self.table, self.page_size, Direction::Stay);
    }

    fn selected_identity(&mut self) -> Option<(Pid, String)> {
        let identity = self.selected().map(|e| (e.pid, e.name.clone()));
        if identity.is_none() {
            self.set_notice("no process selected".into(), NoticeLevel::Info);
        }
        identity
    }

    fn open_threads(&mut self) {
        let Some((pid, name)) = self.selected_identity() else {
            return;
        };
        let details = Inspector::new(&mut self.provider).details(pid);
        if details.threads == Err(InspectError::NotFound(pid)) {
            self.lost_process(pid);
            return;
        }
        self.overlay = Some(Overlay::Threads {
            name,
            details,
            scroll: 0,
        });
    }

    fn open_executable_path(&mut self) {
        let Some((pid, name)) = self.selected_identity() else {
            return;
        };
        let path = Inspector::new(&mut self.provider).executable_path(pid);
        if path == Err(InspectError::NotFound(pid)) {
            self.lost_process(pid);
            return;
        }
        self.overlay = Some(Overlay::ExecutablePath { pid, name, path });
    }

    fn terminate(&mut self, pid: Pid, name: String) {
        let policy = self.config.termination_policy();
        let report = TerminationController::new(&mut self.provider, policy).terminate(pid);
        self.refresh_pending = true;

        match report.target_outcome() {
            Some(Outcome::NotFound) if report.results.len() == 1 => self.lost_process(pid),
            Some(Outcome::Terminated) if report.is_complete() => {
                self.set_notice(format!("terminated {name} ({pid})"), NoticeLevel::Info);
            }
            _ => self.overlay = Some(Overlay::KillReport { name, report }),
        }
    }

    /// Run the interactive loop until the user quits.
    ///
    /// The terminal is restored even when the loop fails.
    pub fn run<T: Terminal>(&mut self, terminal: &mut T) -> Result<(), MonitorError> {
        terminal.enter()?;
        let result = self.event_loop(terminal);
        let restored = terminal.leave();
        result.and(restored)
    }

    fn event_loop<T: Terminal>(&mut self, terminal: &mut T) -> Result<(), MonitorError> {
        let (width, height) = terminal.size()?;
        let mut buffer = CellBuffer::new(width, height);
        let mut renderer = DiffRenderer::with_color_mode(self.color_mode);
        self.running = true;

        while self.running {
            self.tick(Instant::now())?;
            self.set_page_size(ui::page_size(buffer.height()));
            ui::draw(self, &mut buffer);
            terminal.flush(&mut buffer, &mut renderer)?;

            if !terminal.poll(self.config.input_poll())? {
                continue;
            }
            let event = terminal.read_event()?;
            if let Event::Resize(w, h) = event {
                buffer.resize(w, h);
                renderer.reset();
            } else if let Some(key) = input::key_press(&event) {
                if self.handle_key(key.code, key.modifiers) {
                    break;
                }
            }
        }
        tracing::info!("monitor stopped");
        Ok(())
    }

    /// Draw one frame into a fresh buffer, for non-interactive output.
    pub fn render_once(&mut self, width: u16, height: u16) -> Result<CellBuffer, MonitorError> {
        let mut buffer = CellBuffer::new(width, height);
        self.refresh()?;
        self.set_page_size(ui::page_size(height));
        ui::draw(self, &mut buffer);
        Ok(buffer)
    }
}

fn last_thread_row(details: &ProcessDetails) -> usize {
    details
        .threads
        .as_ref()
        .map_or(0, |threads| threads.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::provider::{InMemoryProvider, RawProcess};

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.sort = SortKey::Pid;
        config.sort_descending = false;
        config.termination.timeout_ms = 100;
        config.termination.kill_grace_ms = 50;
        config.provider.retry_backoff_ms = 1;
        config
    }

    fn new_app(pids: &[Pid]) -> App<InMemoryProvider> {
        let mut provider = InMemoryProvider::new();
        for &pid in pids {
            provider.insert(RawProcess::new(pid, format!("proc{pid}")).with_exe("/bin/x"));
        }
        let mut app = App::new(provider, config()).with_color_mode(ColorMode::Mono);
        app.set_page_size(10);
        app.refresh().unwrap();
        app
    }

    fn press(app: &mut App<InMemoryProvider>, c: char) -> bool {
        app.handle_key(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_first_refresh_selects_first_row() {
        let app = new_app(&[10, 20, 30]);
        assert_eq!(app.selection().selected_pid, Some(10));
        assert_eq!(app.view().range(), 0..3);
    }

    #[test]
    fn test_navigation_moves_selection() {
        let mut app = new_app(&[10, 20, 30]);
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(app.selection().selected_pid, Some(30));
        app.handle_key(KeyCode::Home, KeyModifiers::NONE);
        assert_eq!(app.selection().selected_pid, Some(10));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = new_app(&[1]);
        assert!(press(&mut app, 'q'));
        assert!(!app.is_running());

        let mut app = new_app(&[1]);
        assert!(app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn test_sort_same_key_reverses() {
        let mut app = new_app(&[1, 2, 3]);
        press(&mut app, 'p');
        assert!(app.table().sort_mode().descending);
        assert_eq!(app.table().get(0).unwrap().pid, 3);
        // selection followed pid 1 to the bottom
        assert_eq!(app.view().index, Some(2));

        press(&mut app, 'n');
        assert_eq!(app.table().sort_mode(), SortMode::natural(SortKey::Name));
    }

    #[test]
    fn test_threads_overlay_and_close() {
        let mut app = new_app(&[10]);
        press(&mut app, 't');
        assert!(matches!(app.overlay(), Some(Overlay::Threads { .. })));
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.overlay().is_none());
    }

    #[test]
    fn test_exe_for_exited_process_clears_selection() {
        let mut app = new_app(&[10, 20]);
        app.provider_mut().exit(10);
        press(&mut app, 'e');
        assert!(app.overlay().is_none());
        assert!(app.notice().unwrap().text.contains("no longer exists"));
        assert_eq!(app.selection().selected_pid, None);

        app.tick(Instant::now()).unwrap();
        assert_eq!(app.selection().selected_pid, Some(20));
    }

    #[test]
    fn test_exe_access_denied_shows_overlay() {
        let provider = InMemoryProvider::new()
            .with_process(RawProcess::new(5, "root-owned").with_exe("/sbin/x"))
            .deny_exe(5);
        let mut app = App::new(provider, config());
        app.refresh().unwrap();
        press(&mut app, 'E');
        assert_eq!(
            app.overlay(),
            Some(&Overlay::ExecutablePath {
                pid: 5,
                name: "root-owned".into(),
                path: Err(InspectError::AccessDenied(5)),
            })
        );
    }

    #[test]
    fn test_kill_needs_confirmation() {
        let mut app = new_app(&[10, 20]);
        press(&mut app, 'k');
        assert!(matches!(
            app.overlay(),
            Some(Overlay::ConfirmKill { pid: 10, .. })
        ));
        press(&mut app, 'n');
        assert!(app.overlay().is_none());
        assert!(app.provider().signals().is_empty());

        press(&mut app, 'K');
        press(&mut app, 'y');
        assert!(!app.provider().signals().is_empty());
        assert!(app.notice().unwrap().text.contains("terminated"));

        app.tick(Instant::now()).unwrap();
        assert!(app.table().entry(10).is_none());
        assert_eq!(app.selection().selected_pid, Some(20));
    }

    #[test]
    fn test_kill_timeout_shows_report() {
        let mut app = new_app(&[10]);
        *app.provider_mut() = InMemoryProvider::new()
            .with_process(RawProcess::new(10, "stubborn"))
            .ignore_terminate(10);
        press(&mut app, 'k');
        press(&mut app, 'y');
        match app.overlay() {
            Some(Overlay::KillReport { report, .. }) => {
                assert_eq!(report.target_outcome(), Some(Outcome::TimedOut));
            }
            other => panic!("expected kill report, got {other:?}"),
        }
    }

    #[test]
    fn test_overlay_swallows_list_keys() {
        let mut app = new_app(&[1, 2]);
        press(&mut app, '?');
        assert_eq!(app.overlay(), Some(&Overlay::Help));
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(app.selection().selected_pid, Some(1));
        press(&mut app, '?');
        assert!(app.overlay().is_none());
    }

    #[test]
    fn test_provider_unavailable_is_fatal() {
        let mut app = new_app(&[1]);
        app.provider_mut().set_failing_snapshots(10);
        let err = app.refresh().unwrap_err();
        assert!(matches!(err, MonitorError::ProviderUnavailable { attempts: 3, .. }));
        assert_eq!(app.table().len(), 1);
    }

    #[test]
    fn test_tick_respects_interval() {
        let mut app = new_app(&[1]);
        let before = app.table().refreshes();
        app.tick(Instant::now()).unwrap();
        assert_eq!(app.table().refreshes(), before);
        app.tick(Instant::now() + Duration::from_secs(2)).unwrap();
        assert_eq!(app.table().refreshes(), before + 1);
    }

    #[test]
    fn test_notice_expires() {
        let mut app = new_app(&[]);
        press(&mut app, 'k');
        assert!(app.notice().is_some());
        app.tick(Instant::now() + NOTICE_TTL + Duration::from_millis(1))
            .unwrap();
        assert!(app.notice().is_none());
    }
}
