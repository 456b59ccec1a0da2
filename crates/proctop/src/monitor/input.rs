//! Keyboard mapping for the process list.
//!
//! Modal overlays read raw keys themselves; [`map_key`] covers the list view.

use super::table::SortKey;
use super::viewport::Direction;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Action requested from the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Threads,
    Kill,
    ExecutablePath,
    SortBy(SortKey),
    ReverseSort,
    Help,
    /// Close whatever overlay is open.
    Dismiss,
    Quit,
}

/// Map a key in the list view to a command.
pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c' | 'C') => Some(Command::Quit),
            _ => None,
        };
    }

    let command = match code {
        KeyCode::Up => Command::Move(Direction::Up),
        KeyCode::Down => Command::Move(Direction::Down),
        KeyCode::PageUp => Command::Move(Direction::PageUp),
        KeyCode::PageDown => Command::Move(Direction::PageDown),
        KeyCode::Home => Command::Move(Direction::Home),
        KeyCode::End => Command::Move(Direction::End),
        KeyCode::Char('t' | 'T') => Command::Threads,
        KeyCode::Char('k' | 'K') => Command::Kill,
        KeyCode::Char('e' | 'E') => Command::ExecutablePath,
        KeyCode::Char('q' | 'Q') => Command::Quit,
        KeyCode::Char('c') => Command::SortBy(SortKey::Cpu),
        KeyCode::Char('m') => Command::SortBy(SortKey::Memory),
        KeyCode::Char('p') => Command::SortBy(SortKey::Pid),
        KeyCode::Char('n') => Command::SortBy(SortKey::Name),
        KeyCode::Char('r') => Command::ReverseSort,
        KeyCode::Char('?') | KeyCode::F(1) => Command::Help,
        KeyCode::Esc => Command::Dismiss,
        _ => return None,
    };
    Some(command)
}

/// Key presses only; releases and repeats reported by some terminals are
/// dropped.
pub fn key_press(event: &Event) -> Option<KeyEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(*key),
        _ => None,
    }
}

/// Ctrl+C, which quits from every mode.
pub fn is_interrupt(code: KeyCode, modifiers: KeyModifiers) -> bool {
    modifiers.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c' | 'C'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn plain(code: KeyCode) -> Option<Command> {
        map_key(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(plain(KeyCode::Up), Some(Command::Move(Direction::Up)));
        assert_eq!(plain(KeyCode::Down), Some(Command::Move(Direction::Down)));
        assert_eq!(
            plain(KeyCode::PageDown),
            Some(Command::Move(Direction::PageDown))
        );
        assert_eq!(plain(KeyCode::Home), Some(Command::Move(Direction::Home)));
        assert_eq!(plain(KeyCode::End), Some(Command::Move(Direction::End)));
    }

    #[test]
    fn test_action_keys_either_case() {
        for (lower, upper, command) in [
            ('t', 'T', Command::Threads),
            ('k', 'K', Command::Kill),
            ('e', 'E', Command::ExecutablePath),
            ('q', 'Q', Command::Quit),
        ] {
            assert_eq!(plain(KeyCode::Char(lower)), Some(command));
            assert_eq!(plain(KeyCode::Char(upper)), Some(command));
        }
    }

    #[test]
    fn test_sort_keys() {
        assert_eq!(
            plain(KeyCode::Char('m')),
            Some(Command::SortBy(SortKey::Memory))
        );
        assert_eq!(
            plain(KeyCode::Char('n')),
            Some(Command::SortBy(SortKey::Name))
        );
        assert_eq!(plain(KeyCode::Char('r')), Some(Command::ReverseSort));
    }

    #[test]
    fn test_ctrl_c_quits_plain_c_sorts() {
        assert_eq!(
            map_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Command::Quit)
        );
        assert_eq!(plain(KeyCode::Char('c')), Some(Command::SortBy(SortKey::Cpu)));
        assert_eq!(map_key(KeyCode::Char('k'), KeyModifiers::CONTROL), None);
        assert!(is_interrupt(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!is_interrupt(KeyCode::Char('c'), KeyModifiers::NONE));
    }

    #[test]
    fn test_help_and_unknown() {
        assert_eq!(plain(KeyCode::Char('?')), Some(Command::Help));
        assert_eq!(plain(KeyCode::F(1)), Some(Command::Help));
        assert_eq!(plain(KeyCode::Char('z')), None);
        assert_eq!(plain(KeyCode::Tab), None);
    }

    #[test]
    fn test_key_press_filters_releases() {
        let press = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(key_press(&press).is_some());

        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert!(key_press(&release).is_none());
        assert!(key_press(&Event::Resize(80, 24)).is_none());
    }
}
