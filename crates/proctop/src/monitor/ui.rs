//! Layout and rendering for the process monitor.
//!
//! ```text
//! row 0        title bar
//! row 1        column header
//! rows 2..h-2  visible slice of the table
//! row h-2      separator / notice
//! row h-1      controls
//! ```

use super::app::{App, NoticeLevel, Overlay};
use super::inspector::InspectError;
use super::provider::ProcessProvider;
use super::table::ProcessEntry;
use super::terminate::{Outcome, TerminationReport};
use crate::color::Color;
use crate::direct::{CellBuffer, Modifiers, Style};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Rows outside the table body: title, column header, separator, footer.
const CHROME_ROWS: u16 = 4;
/// Columns right of the name: cpu, memory, status.
const RIGHT_COLUMNS: u16 = 29;
/// Pid column plus its trailing space.
const PID_COLUMN: u16 = 8;

const TITLE: Style = Style::new(Color::WHITE, Color::BLUE).with_modifiers(Modifiers::BOLD);
const HEADER: Style = Style::fg(Color::CYAN).with_modifiers(Modifiers::BOLD);
const KEY: Style = Style::fg(Color::CYAN);
const DIMMED: Style = Style::fg(Color::GRAY);
const TEXT: Style = Style::fg(Color::WHITE);
const BOX: Style = Style::fg(Color::YELLOW);

/// Table rows available at a given terminal height.
pub fn page_size(height: u16) -> usize {
    usize::from(height.saturating_sub(CHROME_ROWS))
}

/// Main draw function, called each frame.
pub fn draw<P: ProcessProvider>(app: &App<P>, buffer: &mut CellBuffer) {
    buffer.clear();
    let (w, h) = (buffer.width(), buffer.height());
    let config = app.config();
    if w < config.min_width || h < config.min_height || h < CHROME_ROWS + 1 {
        draw_too_small(buffer, config.min_width, config.min_height);
        return;
    }

    draw_title(app, buffer);
    draw_column_header(buffer);
    draw_rows(app, buffer);
    draw_status_line(app, buffer, h - 2);
    draw_footer(app, buffer, h - 1);

    if let Some(overlay) = app.overlay() {
        draw_overlay(app, overlay, buffer);
    }
}

fn draw_too_small(buffer: &mut CellBuffer, min_width: u16, min_height: u16) {
    let (w, h) = (buffer.width(), buffer.height());
    let lines = [
        "Terminal too small".to_string(),
        format!("{w}x{h}, need {min_width}x{min_height}"),
    ];
    let top = (h / 2).saturating_sub(1);
    for (i, line) in lines.iter().enumerate() {
        let text = truncate(line, usize::from(w));
        let x = w.saturating_sub(text.width() as u16) / 2;
        buffer.put_str(x, top + i as u16, &text, BOX);
    }
}

fn draw_title<P: ProcessProvider>(app: &App<P>, buffer: &mut CellBuffer) {
    let table = app.table();
    let sort = table.sort_mode();
    let degraded = table.entries().iter().filter(|e| e.is_degraded()).count();
    let arrow = if sort.descending { "▼" } else { "▲" };

    let mut title = format!(" proctop  {} processes", table.len());
    if degraded > 0 {
        title.push_str(&format!(" ({degraded} restricted)"));
    }
    title.push_str(&format!(
        "  sort:{}{arrow}  every {}ms",
        sort.key.label(),
        app.config().refresh_ms
    ));

    buffer.fill_row(0, TITLE);
    buffer.put_str(0, 0, &truncate(&title, usize::from(buffer.width())), TITLE);
}

fn draw_column_header(buffer: &mut CellBuffer) {
    let w = buffer.width();
    buffer.put_str(0, 1, &format!("{:>7} ", "PID"), HEADER);
    buffer.put_str(PID_COLUMN, 1, "NAME", HEADER);
    buffer.put_str(
        w.saturating_sub(RIGHT_COLUMNS),
        1,
        &format!(" {:>8} {:>10} {:<8}", "CPU%", "MEM", "STATUS"),
        HEADER,
    );
}

fn draw_rows<P: ProcessProvider>(app: &App<P>, buffer: &mut CellBuffer) {
    let view = app.view();
    let selected = app.selection().selected_pid;
    let rows = app.table().slice(view.visible_start, view.visible_end);
    let name_width = usize::from(buffer.width().saturating_sub(PID_COLUMN + RIGHT_COLUMNS));
    let right = buffer.width().saturating_sub(RIGHT_COLUMNS);

    for (i, entry) in rows.iter().enumerate() {
        let y = 2 + i as u16;
        let style = row_style(app, entry, selected == Some(entry.pid));
        buffer.fill_row(y, style);
        buffer.put_str(0, y, &format!("{:>7} ", entry.pid), style);
        buffer.put_str(PID_COLUMN, y, &truncate(&entry.name, name_width), style);
        buffer.put_str(right, y, &right_columns(entry), style);
    }
}

fn right_columns(entry: &ProcessEntry) -> String {
    let cpu = entry
        .cpu_percent
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
    let mem = entry.memory.map_or_else(|| "n/a".to_string(), format_bytes);
    format!(
        " {cpu:>7}{} {mem:>9}{} {:<8}",
        entry.cpu_trend.glyph(),
        entry.memory_trend.glyph(),
        entry.status.label()
    )
}

fn row_style<P: ProcessProvider>(app: &App<P>, entry: &ProcessEntry, selected: bool) -> Style {
    if selected {
        return if app.color_mode().has_color() {
            Style::new(Color::BLACK, Color::CYAN).with_modifiers(Modifiers::BOLD)
        } else {
            Style::default().with_modifiers(Modifiers::REVERSE)
        };
    }
    if entry.is_degraded() {
        return DIMMED.with_modifiers(Modifiers::DIM);
    }
    let highlight = &app.config().highlight;
    let cpu = entry.cpu_percent.unwrap_or(0.0);
    if cpu >= highlight.very_high_cpu {
        Style::fg(Color::RED).with_modifiers(Modifiers::BOLD)
    } else if cpu >= highlight.high_cpu {
        Style::fg(Color::YELLOW)
    } else if entry.is_new {
        Style::fg(Color::GREEN)
    } else {
        Style::default()
    }
}

fn draw_status_line<P: ProcessProvider>(app: &App<P>, buffer: &mut CellBuffer, y: u16) {
    let rule = "─".repeat(usize::from(buffer.width()));
    buffer.put_str(0, y, &rule, DIMMED);
    if let Some(notice) = app.notice() {
        let style = match notice.level {
            NoticeLevel::Info => Style::fg(Color::GREEN),
            NoticeLevel::Warning => Style::fg(Color::YELLOW).with_modifiers(Modifiers::BOLD),
        };
        let text = truncate(
            &format!(" {} ", notice.text),
            usize::from(buffer.width().saturating_sub(2)),
        );
        buffer.put_str(1, y, &text, style);
    }
}

fn draw_footer<P: ProcessProvider>(app: &App<P>, buffer: &mut CellBuffer, y: u16) {
    let keys = [
        ("[↑↓]", "move"),
        ("[t]", "threads"),
        ("[e]", "exe"),
        ("[k]", "kill"),
        ("[cmpn]", "sort"),
        ("[r]", "rev"),
        ("[?]", "help"),
        ("[q]", "quit"),
    ];

    let mut x = 0;
    for (key, desc) in keys {
        x += buffer.put_str(x, y, key, KEY);
        x += buffer.put_str(x, y, desc, DIMMED);
        x += buffer.put_str(x, y, " ", DIMMED);
    }

    let position = match app.view().index {
        Some(index) => format!("{}/{}", index + 1, app.table().len()),
        None => "0/0".to_string(),
    };
    let px = buffer.width().saturating_sub(position.len() as u16);
    if px > x {
        buffer.put_str(px, y, &position, DIMMED);
    }
}

fn draw_overlay<P: ProcessProvider>(app: &App<P>, overlay: &Overlay, buffer: &mut CellBuffer) {
    let body_rows = usize::from(buffer.height().saturating_sub(CHROME_ROWS + 2));
    match overlay {
        Overlay::Help => draw_box(buffer, " Help ", &help_lines()),
        Overlay::Threads {
            name,
            details,
            scroll,
        } => {
            let mut lines = vec![match &details.executable_path {
                Ok(path) => (format!("executable: {}", path.display()), TEXT),
                Err(err) => (format!("executable: {}", inspect_message(err)), DIMMED),
            }];
            match &details.threads {
                Ok(threads) => {
                    lines.push((format!("{} thread(s)", threads.len()), TEXT));
                    lines.push((format!("{:>10}  {:>12}", "TID", "CPU TIME"), HEADER));
                    let room = body_rows.saturating_sub(lines.len() + 1);
                    for thread in threads.iter().skip(*scroll).take(room) {
                        lines.push((
                            format!("{:>10}  {:>11.2}s", thread.thread_id, thread.cpu_time),
                            TEXT,
                        ));
                    }
                }
                Err(err) => lines.push((inspect_message(err), Style::fg(Color::RED))),
            }
            lines.push(("↑↓ scroll  Esc close".to_string(), DIMMED));
            let title = format!(" Threads of {name} ({}) ", details.pid);
            draw_box(buffer, &title, &lines);
        }
        Overlay::ExecutablePath { pid, name, path } => {
            let line = match path {
                Ok(path) => (path.display().to_string(), TEXT),
                Err(err) => (inspect_message(err), Style::fg(Color::RED)),
            };
            let lines = [line, ("Esc close".to_string(), DIMMED)];
            draw_box(buffer, &format!(" Executable of {name} ({pid}) "), &lines);
        }
        Overlay::ConfirmKill { pid, name } => {
            let scope = if app.config().termination.include_children {
                "its threads and child processes"
            } else {
                "its threads"
            };
            let lines = [
                (format!("Terminate {name} ({pid}) with {scope}?"), TEXT),
                ("[y] yes   [n] no".to_string(), KEY),
            ];
            draw_box(buffer, " Confirm ", &lines);
        }
        Overlay::KillReport { name, report } => {
            let lines = report_lines(report, app.config().termination.escalate, body_rows);
            draw_box(buffer, &format!(" Terminate {name} ({}) ", report.target), &lines);
        }
    }
}

fn help_lines() -> Vec<(String, Style)> {
    [
        ("↑/↓", "Move selection"),
        ("PgUp/PgDn", "Page up/down"),
        ("Home/End", "First/last process"),
        ("t", "Show threads"),
        ("e", "Show executable path"),
        ("k", "Terminate process"),
        ("c m p n", "Sort by cpu/memory/pid/name"),
        ("r", "Reverse sort"),
        ("?, F1", "Toggle help"),
        ("Esc", "Close panel"),
        ("q, Ctrl+C", "Quit"),
    ]
    .iter()
    .map(|(key, desc)| (format!("{key:>10}  {desc}"), TEXT))
    .collect()
}

fn report_lines(report: &TerminationReport, escalate: bool, room: usize) -> Vec<(String, Style)> {
    let counts = report.counts();
    let mut lines = vec![(
        format!(
            "{} terminated, {} not found, {} denied, {} timed out",
            counts.terminated, counts.not_found, counts.access_denied, counts.timed_out
        ),
        TEXT,
    )];

    let mut notes = Vec::new();
    let denied = report
        .results
        .iter()
        .any(|r| r.outcome == Outcome::AccessDenied && r.error.is_none());
    if denied {
        notes.push((
            "Insufficient privileges: run as the process owner or root".to_string(),
            Style::fg(Color::YELLOW),
        ));
    }
    if counts.timed_out > 0 && !escalate {
        notes.push((
            "Still running: set termination.escalate or pass --escalate".to_string(),
            Style::fg(Color::YELLOW),
        ));
    }

    let available = room.saturating_sub(2 + notes.len());
    let shown = report.results.len().min(available);
    for result in &report.results[..shown] {
        let style = match result.outcome {
            Outcome::Terminated => Style::fg(Color::GREEN),
            Outcome::NotFound => DIMMED,
            Outcome::AccessDenied | Outcome::TimedOut => Style::fg(Color::RED),
        };
        let outcome = match &result.error {
            Some(error) => format!("failed: {error}"),
            None => result.outcome.label().to_string(),
        };
        lines.push((
            format!("{:<8}{:>10}  {}", result.kind.label(), result.pid, outcome),
            style,
        ));
    }
    if shown < report.results.len() {
        lines.push((
            format!("... {} more", report.results.len() - shown),
            DIMMED,
        ));
    }
    lines.extend(notes);
    lines.push(("Esc close".to_string(), DIMMED));
    lines
}

fn inspect_message(err: &InspectError) -> String {
    match err {
        InspectError::AccessDenied(_) => {
            "access denied: run as the process owner or root".to_string()
        }
        InspectError::NotFound(pid) => format!("process {pid} has exited"),
        InspectError::Unavailable(msg) => msg.clone(),
    }
}

/// Bordered box centred on screen; lines past the bottom are dropped.
fn draw_box(buffer: &mut CellBuffer, title: &str, lines: &[(String, Style)]) {
    let (w, h) = (buffer.width(), buffer.height());
    let content = lines.iter().map(|(l, _)| l.width()).max().unwrap_or(0);
    let box_w = (content.max(title.width()) as u16 + 4).min(w.saturating_sub(4));
    let box_h = (lines.len() as u16 + 2).min(h.saturating_sub(2));
    if box_w < 6 || box_h < 3 {
        return;
    }
    let x = (w - box_w) / 2;
    let y = (h - box_h) / 2;
    let inner = usize::from(box_w - 4);

    let top = format!("┌{}┐", "─".repeat(usize::from(box_w - 2)));
    let bottom = format!("└{}┘", "─".repeat(usize::from(box_w - 2)));
    buffer.put_str(x, y, &top, BOX);
    buffer.put_str(x + 2, y, &truncate(title, inner), BOX.with_modifiers(Modifiers::BOLD));
    for row in 1..box_h - 1 {
        buffer.put_str(x, y + row, "│", BOX);
        buffer.fill(x + 1, y + row, box_w - 2, Style::default());
        buffer.put_str(x + box_w - 1, y + row, "│", BOX);
    }
    buffer.put_str(x, y + box_h - 1, &bottom, BOX);

    for (i, (line, style)) in lines.iter().take(usize::from(box_h - 2)).enumerate() {
        buffer.put_str(x + 2, y + 1 + i as u16, &truncate(line, inner), *style);
    }
}

/// Cut `text` to at most `max` display columns, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let cw = c.width().unwrap_or(0);
        if used + cw > max - 1 {
            break;
        }
        out.push(c);
        used += cw;
    }
    out.push('…');
    out
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorMode;
    use crate::monitor::config::MonitorConfig;
    use crate::monitor::provider::{InMemoryProvider, RawProcess};
    use crate::monitor::table::SortKey;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn app_with(provider: InMemoryProvider) -> App<InMemoryProvider> {
        let mut config = MonitorConfig::default();
        config.sort = SortKey::Pid;
        config.sort_descending = false;
        let mut app = App::new(provider, config).with_color_mode(ColorMode::Mono);
        app.refresh().unwrap();
        app
    }

    fn render(app: &mut App<InMemoryProvider>, w: u16, h: u16) -> CellBuffer {
        let mut buffer = CellBuffer::new(w, h);
        app.set_page_size(page_size(h));
        draw(app, &mut buffer);
        buffer
    }

    fn screen(buffer: &CellBuffer) -> Vec<String> {
        (0..buffer.height()).map(|y| buffer.row_text(y)).collect()
    }

    fn many(n: u32) -> InMemoryProvider {
        let mut provider = InMemoryProvider::new();
        for pid in 1..=n {
            provider.insert(
                RawProcess::new(pid, format!("task{pid}"))
                    .with_cpu(1.0)
                    .with_memory(u64::from(pid) * 1024 * 1024),
            );
        }
        provider
    }

    #[test]
    fn test_page_size() {
        assert_eq!(page_size(24), 20);
        assert_eq!(page_size(3), 0);
    }

    #[test]
    fn test_layout_rows() {
        let mut app = app_with(many(3));
        let buffer = render(&mut app, 80, 24);
        let rows = screen(&buffer);
        assert!(rows[0].contains("proctop"));
        assert!(rows[0].contains("3 processes"));
        assert!(rows[0].contains("sort:PID▲"));
        assert!(rows[1].contains("PID"));
        assert!(rows[1].contains("NAME"));
        assert!(rows[1].contains("STATUS"));
        assert!(rows[2].contains("task1"));
        assert!(rows[4].contains("task3"));
        assert!(rows[4].contains("3.0M"));
        assert!(rows[5].is_empty());
        assert!(rows[22].starts_with('─'));
        assert!(rows[23].contains("[q]quit"));
        assert!(rows[23].ends_with("1/3"));
    }

    #[test]
    fn test_only_visible_slice_is_drawn() {
        let mut app = app_with(many(100));
        app.set_page_size(page_size(24));
        for _ in 0..30 {
            app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        }
        let buffer = render(&mut app, 80, 24);
        let rows = screen(&buffer);
        // index 30 at the bottom of a 20-row page
        assert!(rows[2].contains("task12"));
        assert!(rows[21].contains("task31"));
        assert!(!rows.iter().any(|r| r.contains("task11 ")));
        assert!(rows[23].ends_with("31/100"));
    }

    #[test]
    fn test_degraded_row_shows_unavailable() {
        let provider = many(2).deny_record(2);
        let mut app = app_with(provider);
        let buffer = render(&mut app, 80, 24);
        let rows = screen(&buffer);
        assert!(rows[0].contains("(1 restricted)"));
        let degraded = rows.iter().find(|r| r.contains("task2")).unwrap();
        assert!(degraded.contains("n/a"));
    }

    #[test]
    fn test_selected_row_is_reversed_in_mono() {
        let mut app = app_with(many(2));
        let buffer = render(&mut app, 80, 24);
        let cell = buffer.get(3, 2).unwrap();
        assert!(cell.style.modifiers.contains(Modifiers::REVERSE));
        let other = buffer.get(3, 3).unwrap();
        assert!(!other.style.modifiers.contains(Modifiers::REVERSE));
    }

    #[test]
    fn test_high_cpu_rows_colored() {
        let provider = InMemoryProvider::new()
            .with_process(RawProcess::new(1, "idle"))
            .with_process(RawProcess::new(2, "busy").with_cpu(60.0))
            .with_process(RawProcess::new(3, "hot").with_cpu(95.0));
        let mut app = app_with(provider);
        let buffer = render(&mut app, 80, 24);
        assert_eq!(buffer.get(10, 3).unwrap().style.fg, Color::YELLOW);
        assert_eq!(buffer.get(10, 4).unwrap().style.fg, Color::RED);
    }

    #[test]
    fn test_too_small_screen() {
        let mut app = app_with(many(5));
        let buffer = render(&mut app, 40, 10);
        let rows = screen(&buffer);
        assert!(rows.iter().any(|r| r.contains("Terminal too small")));
        assert!(rows.iter().any(|r| r.contains("40x10, need 80x20")));
        assert!(!rows.iter().any(|r| r.contains("task1")));
    }

    #[test]
    fn test_help_overlay_drawn_over_table() {
        let mut app = app_with(many(20));
        app.handle_key(KeyCode::Char('?'), KeyModifiers::NONE);
        let buffer = render(&mut app, 80, 24);
        let rows = screen(&buffer);
        assert!(rows.iter().any(|r| r.contains("Help")));
        assert!(rows.iter().any(|r| r.contains("Terminate process")));
    }

    #[test]
    fn test_threads_overlay_lists_threads() {
        let provider = InMemoryProvider::new()
            .with_process(RawProcess::new(7, "server").with_exe("/usr/bin/server"))
            .with_threads(7, &[(70, true), (71, true)]);
        let mut app = app_with(provider);
        app.handle_key(KeyCode::Char('t'), KeyModifiers::NONE);
        let buffer = render(&mut app, 80, 24);
        let text = screen(&buffer).join("\n");
        assert!(text.contains("Threads of server (7)"));
        assert!(text.contains("/usr/bin/server"));
        assert!(text.contains("3 thread(s)"));
        assert!(text.contains("71"));
    }

    #[test]
    fn test_access_denied_overlay_gives_guidance() {
        let provider = InMemoryProvider::new()
            .with_process(RawProcess::new(1, "secret").with_exe("/x"))
            .deny_exe(1);
        let mut app = app_with(provider);
        app.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        let text = screen(&render(&mut app, 80, 24)).join("\n");
        assert!(text.contains("access denied"));
        assert!(text.contains("owner or root"));
    }

    #[test]
    fn test_report_shows_provider_failure_without_privilege_hint() {
        use crate::monitor::terminate::{TerminationResult, VictimKind};

        let report = TerminationReport {
            target: 9,
            results: vec![TerminationResult {
                pid: 9,
                kind: VictimKind::Target,
                outcome: Outcome::AccessDenied,
                error: Some("not supported on this platform: signal".into()),
            }],
        };
        let text: Vec<String> = report_lines(&report, false, 10)
            .into_iter()
            .map(|(line, _)| line)
            .collect();
        assert!(text.iter().any(|l| l.contains("failed: not supported")));
        assert!(!text.iter().any(|l| l.contains("owner or root")));
    }

    #[test]
    fn test_confirm_overlay() {
        let mut app = app_with(many(1));
        app.handle_key(KeyCode::Char('k'), KeyModifiers::NONE);
        let text = screen(&render(&mut app, 80, 24)).join("\n");
        assert!(text.contains("Terminate task1 (1)"));
        assert!(text.contains("[y] yes"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
        assert_eq!(truncate("abc", 0), "");
        // wide characters count two columns
        assert_eq!(truncate("日本語テキスト", 5), "日本…");
        assert!(truncate("日本語テキスト", 5).width() <= 5);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0K");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0M");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0G");
    }
}
