//! Direct terminal backend.
//!
//! Frames are drawn into a [`CellBuffer`] and pushed to crossterm by the
//! [`DiffRenderer`], which only emits the cells that changed.
//!
//! ```text
//! ui::draw → CellBuffer → DiffRenderer → crossterm
//! ```

mod cell_buffer;
mod diff_renderer;

pub use cell_buffer::{Cell, CellBuffer, Modifiers, Style};
pub use diff_renderer::DiffRenderer;
