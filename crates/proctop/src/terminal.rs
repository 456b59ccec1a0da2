//! Terminal abstraction: raw mode, alternate screen, input polling and
//! frame output behind a trait so the event loop runs against a scripted
//! backend in tests.

use crate::direct::{CellBuffer, DiffRenderer};
use crate::error::MonitorError;
use crossterm::{
    cursor,
    event::{self, Event},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::Duration;

/// Terminal abstraction used by the event loop.
pub trait Terminal {
    /// Enter raw mode and alternate screen.
    fn enter(&mut self) -> Result<(), MonitorError>;
    /// Leave alternate screen and raw mode. Must be safe to call twice.
    fn leave(&mut self) -> Result<(), MonitorError>;
    /// Terminal size (width, height).
    fn size(&self) -> Result<(u16, u16), MonitorError>;
    /// Wait up to `timeout` for an input event.
    fn poll(&self, timeout: Duration) -> Result<bool, MonitorError>;
    fn read_event(&self) -> Result<Event, MonitorError>;
    /// Push the dirty part of `buffer` to the screen.
    fn flush(
        &mut self,
        buffer: &mut CellBuffer,
        renderer: &mut DiffRenderer,
    ) -> Result<(), MonitorError>;
}

/// Raw terminal operations. This layer exists purely for testability.
pub trait TerminalBackend {
    fn enable_raw_mode(&mut self) -> Result<(), MonitorError>;
    fn disable_raw_mode(&mut self) -> Result<(), MonitorError>;
    fn enter_alternate_screen(&mut self) -> Result<(), MonitorError>;
    fn leave_alternate_screen(&mut self) -> Result<(), MonitorError>;
    fn hide_cursor(&mut self) -> Result<(), MonitorError>;
    fn show_cursor(&mut self) -> Result<(), MonitorError>;
    fn size(&self) -> Result<(u16, u16), MonitorError>;
    fn poll(&self, timeout: Duration) -> Result<bool, MonitorError>;
    fn read_event(&self) -> Result<Event, MonitorError>;
    fn write_flush(
        &mut self,
        buffer: &mut CellBuffer,
        renderer: &mut DiffRenderer,
    ) -> Result<(), MonitorError>;
}

/// Real crossterm backend on stdout.
pub struct CrosstermBackend {
    stdout: Stdout,
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enable_raw_mode(&mut self) -> Result<(), MonitorError> {
        enable_raw_mode()?;
        Ok(())
    }
    fn disable_raw_mode(&mut self) -> Result<(), MonitorError> {
        let _ = disable_raw_mode();
        Ok(())
    }
    fn enter_alternate_screen(&mut self) -> Result<(), MonitorError> {
        execute!(self.stdout, EnterAlternateScreen, Clear(ClearType::All))?;
        Ok(())
    }
    fn leave_alternate_screen(&mut self) -> Result<(), MonitorError> {
        let _ = execute!(self.stdout, LeaveAlternateScreen);
        Ok(())
    }
    fn hide_cursor(&mut self) -> Result<(), MonitorError> {
        execute!(self.stdout, cursor::Hide)?;
        Ok(())
    }
    fn show_cursor(&mut self) -> Result<(), MonitorError> {
        let _ = execute!(self.stdout, cursor::Show);
        Ok(())
    }
    fn size(&self) -> Result<(u16, u16), MonitorError> {
        Ok(crossterm::terminal::size()?)
    }
    fn poll(&self, timeout: Duration) -> Result<bool, MonitorError> {
        Ok(event::poll(timeout)?)
    }
    fn read_event(&self) -> Result<Event, MonitorError> {
        Ok(event::read()?)
    }
    fn write_flush(
        &mut self,
        buffer: &mut CellBuffer,
        renderer: &mut DiffRenderer,
    ) -> Result<(), MonitorError> {
        renderer.flush(buffer, &mut self.stdout)?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// Scripted backend with a generic writer for capturing escape sequences.
///
/// `poll` reports an event whenever one is queued; `Event::Resize` changes
/// the reported size when it is read.
pub struct TestableBackend<W: Write> {
    writer: W,
    size: Cell<(u16, u16)>,
    raw_mode: bool,
    alternate_screen: bool,
    events: RefCell<VecDeque<Event>>,
    frames: usize,
}

impl<W: Write> TestableBackend<W> {
    pub fn new(writer: W, width: u16, height: u16) -> Self {
        Self {
            writer,
            size: Cell::new((width, height)),
            raw_mode: false,
            alternate_screen: false,
            events: RefCell::new(VecDeque::new()),
            frames: 0,
        }
    }

    /// Queue events to be returned by `read_event`.
    pub fn with_events(self, events: Vec<Event>) -> Self {
        *self.events.borrow_mut() = events.into_iter().collect();
        self
    }

    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.alternate_screen
    }

    /// Number of frames flushed so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> TerminalBackend for TestableBackend<W> {
    fn enable_raw_mode(&mut self) -> Result<(), MonitorError> {
        self.raw_mode = true;
        Ok(())
    }

    fn disable_raw_mode(&mut self) -> Result<(), MonitorError> {
        self.raw_mode = false;
        Ok(())
    }

    fn enter_alternate_screen(&mut self) -> Result<(), MonitorError> {
        self.alternate_screen = true;
        execute!(self.writer, EnterAlternateScreen)?;
        Ok(())
    }

    fn leave_alternate_screen(&mut self) -> Result<(), MonitorError> {
        if self.alternate_screen {
            self.alternate_screen = false;
            let _ = execute!(self.writer, LeaveAlternateScreen);
        }
        Ok(())
    }

    fn hide_cursor(&mut self) -> Result<(), MonitorError> {
        execute!(self.writer, cursor::Hide)?;
        Ok(())
    }

    fn show_cursor(&mut self) -> Result<(), MonitorError> {
        let _ = execute!(self.writer, cursor::Show);
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16), MonitorError> {
        Ok(self.size.get())
    }

    fn poll(&self, _timeout: Duration) -> Result<bool, MonitorError> {
        Ok(!self.events.borrow().is_empty())
    }

    fn read_event(&self) -> Result<Event, MonitorError> {
        let event = self
            .events
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no events"))?;
        if let Event::Resize(w, h) = event {
            self.size.set((w, h));
        }
        Ok(event)
    }

    fn write_flush(
        &mut self,
        buffer: &mut CellBuffer,
        renderer: &mut DiffRenderer,
    ) -> Result<(), MonitorError> {
        renderer.flush(buffer, &mut self.writer)?;
        self.writer.flush()?;
        self.frames += 1;
        Ok(())
    }
}

/// Terminal implementation over a backend.
pub struct GenericTerminal<B: TerminalBackend> {
    backend: B,
}

impl<B: TerminalBackend> GenericTerminal<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: TerminalBackend> Terminal for GenericTerminal<B> {
    fn enter(&mut self) -> Result<(), MonitorError> {
        self.backend.enable_raw_mode()?;
        self.backend.enter_alternate_screen()?;
        self.backend.hide_cursor()?;
        Ok(())
    }

    fn leave(&mut self) -> Result<(), MonitorError> {
        self.backend.show_cursor()?;
        self.backend.leave_alternate_screen()?;
        self.backend.disable_raw_mode()?;
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16), MonitorError> {
        self.backend.size()
    }

    fn poll(&self, timeout: Duration) -> Result<bool, MonitorError> {
        self.backend.poll(timeout)
    }

    fn read_event(&self) -> Result<Event, MonitorError> {
        self.backend.read_event()
    }

    fn flush(
        &mut self,
        buffer: &mut CellBuffer,
        renderer: &mut DiffRenderer,
    ) -> Result<(), MonitorError> {
        self.backend.write_flush(buffer, renderer)
    }
}

/// Crossterm-backed terminal on stdout.
pub type CrosstermTerminal = GenericTerminal<CrosstermBackend>;
