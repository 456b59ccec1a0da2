//! Pagination: which slice of the table is on screen and which row is
//! selected.

use super::provider::Pid;
use super::table::ProcessTable;
use std::ops::Range;

/// Cursor movement requested by the user (or `Stay` after a refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Stay,
}

/// Result of a viewport computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct View {
    pub visible_start: usize,
    pub visible_end: usize,
    /// Selected index, `None` only when the list is empty.
    pub index: Option<usize>,
    pub scroll_offset: usize,
}

impl View {
    pub fn range(&self) -> Range<usize> {
        self.visible_start..self.visible_end
    }

    pub fn len(&self) -> usize {
        self.visible_end - self.visible_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Move the cursor and scroll so it stays visible.
///
/// The window never starts past the last full page, so shrinking lists pull
/// both the window and the cursor back into range.
pub fn compute_view(
    entry_count: usize,
    page_size: usize,
    current_index: usize,
    scroll_offset: usize,
    direction: Direction,
) -> View {
    if entry_count == 0 {
        return View::default();
    }

    let last = entry_count - 1;
    let current = current_index.min(last);
    let step = page_size.max(1);
    let index = match direction {
        Direction::Up => current.saturating_sub(1),
        Direction::Down => (current + 1).min(last),
        Direction::PageUp => current.saturating_sub(step),
        Direction::PageDown => current.saturating_add(step).min(last),
        Direction::Home => 0,
        Direction::End => last,
        Direction::Stay => current,
    };

    if page_size == 0 {
        return View {
            visible_start: index,
            visible_end: index,
            index: Some(index),
            scroll_offset: index,
        };
    }

    let mut start = scroll_offset.min(entry_count.saturating_sub(page_size));
    if index < start {
        start = index;
    } else if index >= start + page_size {
        start = index + 1 - page_size;
    }

    View {
        visible_start: start,
        visible_end: (start + page_size).min(entry_count),
        index: Some(index),
        scroll_offset: start,
    }
}

/// What happened to the selection after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The selected pid is still present.
    Kept,
    /// The selected pid vanished; the row at the old index took over.
    Reanchored { from: Option<Pid>, to: Pid },
    /// The list is empty.
    Cleared,
}

/// Selected pid plus scroll position, owned by the controller.
///
/// The selection follows the pid across reorders; `anchor` remembers the
/// last index so a vanished pid can be replaced by its neighbour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected_pid: Option<Pid>,
    pub scroll_offset: usize,
    anchor: usize,
}

impl Selection {
    fn current_index(&self, table: &ProcessTable) -> usize {
        self.selected_pid
            .and_then(|pid| table.position(pid))
            .unwrap_or(self.anchor)
    }

    /// Apply a movement and return the resulting view.
    pub fn navigate(&mut self, table: &ProcessTable, page_size: usize, direction: Direction) -> View {
        let view = compute_view(
            table.len(),
            page_size,
            self.current_index(table),
            self.scroll_offset,
            direction,
        );
        self.scroll_offset = view.scroll_offset;
        self.selected_pid = view.index.and_then(|i| table.get(i)).map(|e| e.pid);
        if let Some(index) = view.index {
            self.anchor = index;
        }
        view
    }

    /// The view for the current state without moving.
    pub fn view(&self, table: &ProcessTable, page_size: usize) -> View {
        compute_view(
            table.len(),
            page_size,
            self.current_index(table),
            self.scroll_offset,
            Direction::Stay,
        )
    }

    /// Bring the selection in line with a freshly refreshed table.
    pub fn reconcile(&mut self, table: &ProcessTable) -> Reconciled {
        if table.is_empty() {
            self.selected_pid = None;
            self.scroll_offset = 0;
            self.anchor = 0;
            return Reconciled::Cleared;
        }
        if let Some(index) = self.selected_pid.and_then(|pid| table.position(pid)) {
            self.anchor = index;
            return Reconciled::Kept;
        }

        let index = self.anchor.min(table.len() - 1);
        let from = self.selected_pid;
        let to = table.get(index).map_or(0, |e| e.pid);
        self.selected_pid = Some(to);
        self.anchor = index;
        Reconciled::Reanchored { from, to }
    }

    /// Drop the selected pid but keep the anchor index, so the next
    /// reconcile re-anchors at the same row.
    pub fn clear(&mut self) {
        self.selected_pid = None;
    }
}
