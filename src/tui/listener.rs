//! Terminal input through the tui-realm event listener.
//!
//! The board draws itself, so the mounted component never renders. It only turns
//! realm events back into crossterm events and hands them to `event_to_input`.

use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    Event as CrosstermEvent, KeyCode as CrosstermKeyCode, KeyEvent as CrosstermKeyEvent,
    KeyModifiers as CrosstermKeyModifiers, MouseButton as CrosstermMouseButton,
    MouseEvent as CrosstermMouseEvent, MouseEventKind as CrosstermMouseEventKind,
};
use tuirealm::{
    Application, AttrValue, Attribute, Component, Event, EventListenerCfg, Frame, MockComponent,
    NoUserEvent, PollStrategy, Props, State,
    command::{Cmd, CmdResult},
    event::{
        Key as RealmKey, KeyEvent as RealmKeyEvent, KeyModifiers as RealmKeyModifiers,
        MouseButton as RealmMouseButton, MouseEvent as RealmMouseEvent,
        MouseEventKind as RealmMouseEventKind,
    },
    ratatui::layout::Rect,
};

use crate::input::{InputEvent, event_to_input};

/// Most events drained per frame.
const EVENTS_PER_FRAME: usize = 16;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum ListenerId {
    Input,
}

pub struct InputListener {
    application: Application<ListenerId, InputEvent, NoUserEvent>,
}

impl InputListener {
    pub fn new() -> Result<Self> {
        let mut application: Application<ListenerId, InputEvent, NoUserEvent> =
            Application::init(
                EventListenerCfg::default()
                    .crossterm_input_listener(Duration::from_millis(20), 3)
                    .poll_timeout(Duration::from_millis(1)),
            );

        application
            .mount(ListenerId::Input, Box::new(InputSink::default()), Vec::new())
            .context("failed to mount input component")?;
        application
            .active(&ListenerId::Input)
            .context("failed to activate input component")?;

        Ok(Self { application })
    }

    /// Returns the input that arrived since the last call without waiting for more.
    pub fn drain(&mut self) -> Result<Vec<InputEvent>> {
        self.application
            .tick(PollStrategy::UpTo(EVENTS_PER_FRAME))
            .context("failed to read terminal input")
    }
}

#[derive(Default)]
struct InputSink {
    props: Props,
}

impl MockComponent for InputSink {
    fn view(&mut self, _frame: &mut Frame, _area: Rect) {}

    fn query(&self, attr: Attribute) -> Option<AttrValue> {
        self.props.get(attr)
    }

    fn attr(&mut self, attr: Attribute, value: AttrValue) {
        self.props.set(attr, value);
    }

    fn state(&self) -> State {
        State::None
    }

    fn perform(&mut self, _cmd: Cmd) -> CmdResult {
        CmdResult::None
    }
}

impl Component<InputEvent, NoUserEvent> for InputSink {
    fn on(&mut self, ev: Event<NoUserEvent>) -> Option<InputEvent> {
        convert_event(ev).and_then(event_to_input)
    }
}

fn convert_event(ev: Event<NoUserEvent>) -> Option<CrosstermEvent> {
    match ev {
        Event::Keyboard(key) => Some(CrosstermEvent::Key(convert_key_event(key))),
        Event::Mouse(mouse) => Some(CrosstermEvent::Mouse(convert_mouse_event(mouse))),
        Event::WindowResize(width, height) => Some(CrosstermEvent::Resize(width, height)),
        Event::FocusLost => Some(CrosstermEvent::FocusLost),
        _ => None,
    }
}

fn convert_key_event(key: RealmKeyEvent) -> CrosstermKeyEvent {
    CrosstermKeyEvent::new(
        convert_key_code(key.code),
        convert_key_modifiers(key.modifiers),
    )
}

// Only the keys the board binds; everything else reaches the board as Null.
fn convert_key_code(key: RealmKey) -> CrosstermKeyCode {
    match key {
        RealmKey::Backspace => CrosstermKeyCode::Backspace,
        RealmKey::Enter => CrosstermKeyCode::Enter,
        RealmKey::Left => CrosstermKeyCode::Left,
        RealmKey::Right => CrosstermKeyCode::Right,
        RealmKey::Up => CrosstermKeyCode::Up,
        RealmKey::Down => CrosstermKeyCode::Down,
        RealmKey::Home => CrosstermKeyCode::Home,
        RealmKey::End => CrosstermKeyCode::End,
        RealmKey::PageUp => CrosstermKeyCode::PageUp,
        RealmKey::PageDown => CrosstermKeyCode::PageDown,
        RealmKey::Tab => CrosstermKeyCode::Tab,
        RealmKey::BackTab => CrosstermKeyCode::BackTab,
        RealmKey::Delete => CrosstermKeyCode::Delete,
        RealmKey::Char(ch) => CrosstermKeyCode::Char(ch),
        RealmKey::Esc => CrosstermKeyCode::Esc,
        _ => CrosstermKeyCode::Null,
    }
}

fn convert_key_modifiers(modifiers: RealmKeyModifiers) -> CrosstermKeyModifiers {
    let mut converted = CrosstermKeyModifiers::empty();
    for (realm, crossterm) in [
        (RealmKeyModifiers::SHIFT, CrosstermKeyModifiers::SHIFT),
        (RealmKeyModifiers::CONTROL, CrosstermKeyModifiers::CONTROL),
        (RealmKeyModifiers::ALT, CrosstermKeyModifiers::ALT),
    ] {
        if modifiers.contains(realm) {
            converted.insert(crossterm);
        }
    }
    converted
}

fn convert_mouse_event(mouse: RealmMouseEvent) -> CrosstermMouseEvent {
    CrosstermMouseEvent {
        kind: convert_mouse_kind(mouse.kind),
        column: mouse.column,
        row: mouse.row,
        modifiers: convert_key_modifiers(mouse.modifiers),
    }
}

fn convert_mouse_kind(kind: RealmMouseEventKind) -> CrosstermMouseEventKind {
    match kind {
        RealmMouseEventKind::Down(button) => CrosstermMouseEventKind::Down(convert_button(button)),
        RealmMouseEventKind::Up(button) => CrosstermMouseEventKind::Up(convert_button(button)),
        RealmMouseEventKind::Drag(button) => CrosstermMouseEventKind::Drag(convert_button(button)),
        RealmMouseEventKind::Moved => CrosstermMouseEventKind::Moved,
        RealmMouseEventKind::ScrollDown => CrosstermMouseEventKind::ScrollDown,
        RealmMouseEventKind::ScrollUp => CrosstermMouseEventKind::ScrollUp,
        RealmMouseEventKind::ScrollLeft => CrosstermMouseEventKind::ScrollLeft,
        RealmMouseEventKind::ScrollRight => CrosstermMouseEventKind::ScrollRight,
    }
}

fn convert_button(button: RealmMouseButton) -> CrosstermMouseButton {
    match button {
        RealmMouseButton::Left => CrosstermMouseButton::Left,
        RealmMouseButton::Right => CrosstermMouseButton::Right,
        RealmMouseButton::Middle => CrosstermMouseButton::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerPhase, PointerInput};
    use crate::drag::PointerButton;

    fn realm_mouse(kind: RealmMouseEventKind) -> Event<NoUserEvent> {
        Event::Mouse(RealmMouseEvent {
            kind,
            column: 12,
            row: 4,
            modifiers: RealmKeyModifiers::empty(),
        })
    }

    #[test]
    fn test_drag_keys_reach_the_board() {
        let mut sink = InputSink::default();
        for (realm, crossterm) in [
            (RealmKey::Char(' '), CrosstermKeyCode::Char(' ')),
            (RealmKey::Enter, CrosstermKeyCode::Enter),
            (RealmKey::Esc, CrosstermKeyCode::Esc),
            (RealmKey::Left, CrosstermKeyCode::Left),
            (RealmKey::Down, CrosstermKeyCode::Down),
        ] {
            let input = sink.on(Event::Keyboard(RealmKeyEvent::new(
                realm,
                RealmKeyModifiers::empty(),
            )));
            assert_eq!(
                input,
                Some(InputEvent::Key(CrosstermKeyEvent::new(
                    crossterm,
                    CrosstermKeyModifiers::empty()
                )))
            );
        }
    }

    #[test]
    fn test_mouse_press_drag_release_become_pointer_phases() {
        let mut sink = InputSink::default();
        let phases: Vec<Option<PointerPhase>> = [
            RealmMouseEventKind::Down(RealmMouseButton::Left),
            RealmMouseEventKind::Drag(RealmMouseButton::Left),
            RealmMouseEventKind::Up(RealmMouseButton::Left),
        ]
        .into_iter()
        .map(|kind| match sink.on(realm_mouse(kind)) {
            Some(InputEvent::Pointer(PointerInput {
                phase,
                button,
                column,
                row,
            })) => {
                assert_eq!(button, PointerButton::Primary);
                assert_eq!((column, row), (12, 4));
                Some(phase)
            }
            _ => None,
        })
        .collect();

        assert_eq!(
            phases,
            vec![
                Some(PointerPhase::Down),
                Some(PointerPhase::Move),
                Some(PointerPhase::Up)
            ]
        );
    }

    #[test]
    fn test_focus_loss_cancels_pointer_and_resize_passes_through() {
        let mut sink = InputSink::default();
        assert_eq!(sink.on(Event::FocusLost), Some(InputEvent::PointerCancel));
        assert_eq!(
            sink.on(Event::WindowResize(120, 40)),
            Some(InputEvent::Resize(120, 40))
        );
        assert_eq!(sink.on(Event::FocusGained), None);
        assert_eq!(sink.on(Event::Tick), None);
    }

    #[test]
    fn test_convert_key_modifiers() {
        let combined = RealmKeyModifiers::SHIFT | RealmKeyModifiers::CONTROL;
        let converted = convert_key_modifiers(combined);
        assert!(converted.contains(CrosstermKeyModifiers::SHIFT));
        assert!(converted.contains(CrosstermKeyModifiers::CONTROL));
        assert!(!converted.contains(CrosstermKeyModifiers::ALT));
        assert_eq!(
            convert_key_modifiers(RealmKeyModifiers::empty()),
            CrosstermKeyModifiers::empty()
        );
    }
}
