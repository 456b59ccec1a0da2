//! Cell buffer with zero-allocation steady state.
//!
//! Uses `CompactString` to inline small strings (≤24 bytes), so redrawing
//! the process table every frame does not touch the heap.

use crate::color::Color;
use bitvec::prelude::*;
use compact_str::CompactString;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Text modifiers for terminal cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const BOLD: Self = Self(1 << 0);
    pub const UNDERLINE: Self = Self(1 << 1);
    pub const DIM: Self = Self(1 << 2);
    pub const REVERSE: Self = Self(1 << 3);

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if a specific modifier is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Foreground, background and modifiers applied to a run of text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub modifiers: Modifiers,
}

impl Style {
    #[must_use]
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub const fn fg(fg: Color) -> Self {
        Self::new(fg, Color::Default)
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = self.modifiers.with(modifiers);
        self
    }
}

/// A single terminal cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// The grapheme displayed in this cell.
    pub symbol: CompactString,
    pub style: Style,
    /// Display width of the symbol (1 normal, 2 wide, 0 continuation).
    width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            symbol: CompactString::const_new(" "),
            style: Style::default(),
            width: 1,
        }
    }
}

impl Cell {
    /// Update the cell content (zero-allocation for small strings).
    pub fn update(&mut self, symbol: &str, style: Style) {
        self.symbol.clear();
        self.symbol.push_str(symbol);
        self.style = style;
        self.width = UnicodeWidthStr::width(symbol).clamp(1, 2) as u8;
    }

    /// Mark this cell as the trailing half of a wide character.
    fn make_continuation(&mut self, style: Style) {
        self.symbol.clear();
        self.style = style;
        self.width = 0;
    }

    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.width == 0
    }

    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    fn reset(&mut self) {
        self.symbol.clear();
        self.symbol.push(' ');
        self.style = Style::default();
        self.width = 1;
    }
}

/// Buffer of terminal cells with dirty tracking.
#[derive(Debug)]
pub struct CellBuffer {
    cells: Vec<Cell>,
    width: u16,
    height: u16,
    /// Dirty bit per cell.
    dirty: BitVec,
}

impl CellBuffer {
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let size = (width as usize) * (height as usize);
        Self {
            cells: vec![Cell::default(); size],
            width,
            height,
            dirty: bitvec![0; size],
        }
    }

    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Convert linear index to (x, y).
    #[must_use]
    pub fn coords(&self, idx: usize) -> (u16, u16) {
        let x = (idx % (self.width as usize)) as u16;
        let y = (idx / (self.width as usize)) as u16;
        (x, y)
    }

    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// Write `symbol` into one cell if it differs from what is there.
    ///
    /// Unchanged cells stay clean so the renderer skips them.
    fn put_cell(&mut self, x: u16, y: u16, symbol: &str, style: Style) {
        let idx = self.index(x, y);
        let cell = &mut self.cells[idx];
        if cell.symbol == symbol && cell.style == style && !cell.is_continuation() {
            return;
        }
        cell.update(symbol, style);
        self.dirty.set(idx, true);
    }

    /// Write text at (x, y), clipped to the buffer width.
    ///
    /// Wide graphemes occupy two cells; one that would straddle the right
    /// edge is replaced by a space. Returns the number of columns written.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        if y >= self.height {
            return 0;
        }
        let mut cx = x;
        for grapheme in text.graphemes(true) {
            if cx >= self.width {
                break;
            }
            let w = UnicodeWidthStr::width(grapheme) as u16;
            if w == 0 {
                continue;
            }
            if w == 2 {
                if cx + 1 >= self.width {
                    self.put_cell(cx, y, " ", style);
                    cx += 1;
                    break;
                }
                self.put_cell(cx, y, grapheme, style);
                let idx = self.index(cx + 1, y);
                self.cells[idx].make_continuation(style);
                self.dirty.set(idx, true);
            } else {
                self.put_cell(cx, y, grapheme, style);
            }
            cx += w;
        }
        cx - x
    }

    /// Paint `width` blank cells starting at (x, y).
    pub fn fill(&mut self, x: u16, y: u16, width: u16, style: Style) {
        if y >= self.height {
            return;
        }
        let end = x.saturating_add(width).min(self.width);
        for cx in x..end {
            self.put_cell(cx, y, " ", style);
        }
    }

    /// Paint a whole row blank.
    pub fn fill_row(&mut self, y: u16, style: Style) {
        self.fill(0, y, self.width, style);
    }

    /// Plain text of a row with trailing blanks trimmed.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.height {
            return String::new();
        }
        let start = self.index(0, y);
        let end = start + self.width as usize;
        let text: String = self.cells[start..end]
            .iter()
            .map(|c| c.symbol.as_str())
            .collect();
        text.trim_end().to_string()
    }

    /// Mark all cells as dirty (for full redraw).
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.fill(false);
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.count_ones()
    }

    pub fn iter_dirty(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter_ones()
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Resize the buffer (clears all content).
    pub fn resize(&mut self, width: u16, height: u16) {
        let size = (width as usize) * (height as usize);
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(size, Cell::default());
        self.dirty = bitvec![1; size];
    }

    /// Reset every cell to a blank default-styled space.
    pub fn clear(&mut self) {
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            if *cell != Cell::default() {
                cell.reset();
                self.dirty.set(idx, true);
            }
        }
    }
}
