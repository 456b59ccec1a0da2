//! Differential renderer for terminal output.
//!
//! Only dirty cells are written, output is batched into one buffered write
//! per frame, and cursor moves and style changes are skipped when the
//! terminal is already in the right state.

use super::cell_buffer::{CellBuffer, Modifiers, Style};
use crate::color::ColorMode;
use crossterm::cursor::MoveTo;
use crossterm::style::{
    Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::{queue, QueueableCommand};
use std::io::{self, BufWriter, Write};

/// Differential renderer that minimizes terminal I/O.
#[derive(Debug)]
pub struct DiffRenderer {
    color_mode: ColorMode,
    /// Last known cursor position (`u16::MAX` = unknown).
    cursor_x: u16,
    cursor_y: u16,
    /// Style the terminal is currently in (`None` = unknown).
    last_style: Option<Style>,
    cells_written: usize,
    cursor_moves: usize,
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::with_color_mode(ColorMode::detect())
    }
}

impl DiffRenderer {
    #[must_use]
    pub const fn with_color_mode(color_mode: ColorMode) -> Self {
        Self {
            color_mode,
            cursor_x: u16::MAX,
            cursor_y: u16::MAX,
            last_style: None,
            cells_written: 0,
            cursor_moves: 0,
        }
    }

    #[must_use]
    pub const fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Forget cursor and style state (call after a resize or clear).
    pub fn reset(&mut self) {
        self.cursor_x = u16::MAX;
        self.cursor_y = u16::MAX;
        self.last_style = None;
    }

    /// Cells written in the last flush.
    #[must_use]
    pub const fn cells_written(&self) -> usize {
        self.cells_written
    }

    /// Cursor moves in the last flush.
    #[must_use]
    pub const fn cursor_moves(&self) -> usize {
        self.cursor_moves
    }

    /// Flush dirty cells to the writer and clear their dirty bits.
    ///
    /// Returns the number of cells written.
    pub fn flush<W: Write>(&mut self, buffer: &mut CellBuffer, writer: &mut W) -> io::Result<usize> {
        self.cells_written = 0;
        self.cursor_moves = 0;

        if buffer.is_empty() {
            return Ok(0);
        }

        let mut out = BufWriter::with_capacity(8192, writer);
        let width = buffer.width();

        for idx in buffer.iter_dirty() {
            let cell = &buffer.cells()[idx];
            if cell.is_continuation() {
                continue;
            }

            let (x, y) = buffer.coords(idx);
            if self.cursor_x != x || self.cursor_y != y {
                queue!(out, MoveTo(x, y))?;
                self.cursor_x = x;
                self.cursor_y = y;
                self.cursor_moves += 1;
            }

            if self.last_style != Some(cell.style) {
                self.apply_style(&mut out, cell.style)?;
                self.last_style = Some(cell.style);
            }

            queue!(out, Print(&cell.symbol))?;

            self.cursor_x = self.cursor_x.saturating_add(u16::from(cell.width()));
            if self.cursor_x >= width {
                // Unknown after wrap
                self.cursor_x = u16::MAX;
            }
            self.cells_written += 1;
        }

        buffer.clear_dirty();
        out.flush()?;
        Ok(self.cells_written)
    }

    fn apply_style<W: Write>(&self, writer: &mut W, style: Style) -> io::Result<()> {
        // Attributes reset first, it also clears colors on most terminals
        writer.queue(SetAttribute(Attribute::Reset))?;
        writer.queue(ResetColor)?;

        if self.color_mode.has_color() {
            writer.queue(SetForegroundColor(self.color_mode.to_crossterm(style.fg)))?;
            writer.queue(SetBackgroundColor(self.color_mode.to_crossterm(style.bg)))?;
        }

        let m = style.modifiers;
        if m.contains(Modifiers::BOLD) {
            writer.queue(SetAttribute(Attribute::Bold))?;
        }
        if m.contains(Modifiers::UNDERLINE) {
            writer.queue(SetAttribute(Attribute::Underlined))?;
        }
        if m.contains(Modifiers::DIM) {
            writer.queue(SetAttribute(Attribute::Dim))?;
        }
        if m.contains(Modifiers::REVERSE) {
            writer.queue(SetAttribute(Attribute::Reverse))?;
        }
        Ok(())
    }

    /// Render a full frame (marks all dirty then flushes).
    pub fn render_full<W: Write>(
        &mut self,
        buffer: &mut CellBuffer,
        writer: &mut W,
    ) -> io::Result<usize> {
        buffer.mark_all_dirty();
        self.flush(buffer, writer)
    }
}
