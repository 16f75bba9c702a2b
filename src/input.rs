use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::drag::{KeyCommand, PointerButton};
use crate::geometry::Point;

/// Device-independent pixels per terminal cell.
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;

/// The terminal has a single mouse.
pub const MOUSE_POINTER_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub phase: PointerPhase,
    pub button: PointerButton,
    pub column: u16,
    pub row: u16,
}

impl PointerInput {
    pub fn position(&self) -> Point {
        cell_center(self.column, self.row)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerInput),
    /// The terminal lost focus mid-gesture.
    PointerCancel,
    Resize(u16, u16),
}

/// Board-level shortcuts outside the drag keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKey {
    Quit,
    ToggleView,
    NewTask,
    RenameTask,
    DeleteTask,
    Refresh,
    EarlierRange,
    LaterRange,
}

pub fn event_to_input(event: Event) -> Option<InputEvent> {
    match event {
        Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
            Some(InputEvent::Key(key_event))
        }
        Event::Mouse(mouse_event) => mouse_to_pointer(mouse_event).map(InputEvent::Pointer),
        Event::FocusLost => Some(InputEvent::PointerCancel),
        Event::Resize(width, height) => Some(InputEvent::Resize(width, height)),
        _ => None,
    }
}

fn mouse_to_pointer(event: MouseEvent) -> Option<PointerInput> {
    let (phase, button) = match event.kind {
        MouseEventKind::Down(button) => (PointerPhase::Down, map_button(button)),
        MouseEventKind::Drag(button) => (PointerPhase::Move, map_button(button)),
        MouseEventKind::Up(button) => (PointerPhase::Up, map_button(button)),
        MouseEventKind::Moved => (PointerPhase::Move, PointerButton::Primary),
        _ => return None,
    };
    Some(PointerInput {
        phase,
        button,
        column: event.column,
        row: event.row,
    })
}

fn map_button(button: MouseButton) -> PointerButton {
    match button {
        MouseButton::Left => PointerButton::Primary,
        MouseButton::Right => PointerButton::Secondary,
        MouseButton::Middle => PointerButton::Middle,
    }
}

pub fn cell_center(column: u16, row: u16) -> Point {
    Point::new(
        (f64::from(column) + 0.5) * CELL_WIDTH_PX,
        (f64::from(row) + 0.5) * CELL_HEIGHT_PX,
    )
}

pub fn key_command(key: &KeyEvent) -> Option<KeyCommand> {
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => Some(KeyCommand::Activate),
        KeyCode::Esc => Some(KeyCommand::Cancel),
        KeyCode::Left | KeyCode::Char('h') => Some(KeyCommand::Left),
        KeyCode::Right | KeyCode::Char('l') => Some(KeyCommand::Right),
        KeyCode::Up | KeyCode::Char('k') => Some(KeyCommand::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(KeyCommand::Down),
        _ => None,
    }
}

pub fn app_key(key: &KeyEvent) -> Option<AppKey> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(AppKey::Quit);
    }
    match key.code {
        KeyCode::Char('q') => Some(AppKey::Quit),
        KeyCode::Char('v') | KeyCode::Tab => Some(AppKey::ToggleView),
        KeyCode::Char('n') => Some(AppKey::NewTask),
        KeyCode::Char('e') => Some(AppKey::RenameTask),
        KeyCode::Char('d') | KeyCode::Delete => Some(AppKey::DeleteTask),
        KeyCode::Char('r') => Some(AppKey::Refresh),
        KeyCode::Char('[') => Some(AppKey::EarlierRange),
        KeyCode::Char(']') => Some(AppKey::LaterRange),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::empty(),
        })
    }

    #[test]
    fn test_mouse_events_become_pointer_input() {
        let down = event_to_input(mouse(MouseEventKind::Down(MouseButton::Left), 10, 3));
        assert_eq!(
            down,
            Some(InputEvent::Pointer(PointerInput {
                phase: PointerPhase::Down,
                button: PointerButton::Primary,
                column: 10,
                row: 3,
            }))
        );

        let drag = event_to_input(mouse(MouseEventKind::Drag(MouseButton::Left), 11, 3));
        assert!(matches!(
            drag,
            Some(InputEvent::Pointer(PointerInput {
                phase: PointerPhase::Move,
                ..
            }))
        ));
        assert_eq!(
            event_to_input(mouse(MouseEventKind::ScrollDown, 0, 0)),
            None
        );
    }

    #[test]
    fn test_cell_center_uses_cell_size() {
        assert_eq!(cell_center(0, 0), Point::new(4.0, 8.0));
        assert_eq!(cell_center(2, 1), Point::new(20.0, 24.0));
    }

    #[test]
    fn test_key_mapping() {
        let space = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::empty());
        assert_eq!(key_command(&space), Some(KeyCommand::Activate));
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::empty());
        assert_eq!(key_command(&esc), Some(KeyCommand::Cancel));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app_key(&ctrl_c), Some(AppKey::Quit));
        let n = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::empty());
        assert_eq!(app_key(&n), Some(AppKey::NewTask));
    }

    #[test]
    fn test_focus_lost_cancels_pointer_and_resize_passes_through() {
        assert_eq!(event_to_input(Event::FocusLost), Some(InputEvent::PointerCancel));
        assert_eq!(event_to_input(Event::Resize(80, 24)), Some(InputEvent::Resize(80, 24)));
        assert_eq!(event_to_input(Event::FocusGained), None);
    }
}
