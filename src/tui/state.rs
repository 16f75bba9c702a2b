//! Front-end state: which view is shown, the two panes, the text prompt and the
//! status line. Input handling is synchronous and returns `Action`s for the run
//! loop to carry out against `BoardSync`.

use chrono::{Days, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tuirealm::ratatui::layout::Rect as TermRect;

use crate::drag::{
    DragConfig, KanbanAdapter, KeyCommand, KeyboardOutcome, MovePlan, PointerEvent,
    PointerOutcome, PointerTarget, TimelineAdapter,
};
use crate::input::{
    AppKey, InputEvent, MOUSE_POINTER_ID, PointerInput, PointerPhase, app_key, key_command,
};
use crate::notification::Notice;
use crate::ordering::ColumnMap;
use crate::settings::Settings;
use crate::types::{ColumnId, TaskId, normalize_title};

use super::pane::{FocusStep, Pane, PaneAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Board,
    Timeline,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Board => "board",
            ViewMode::Timeline => "timeline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    NewTask {
        column: ColumnId,
        due_date: Option<NaiveDate>,
        input: String,
    },
    Rename {
        task_id: TaskId,
        input: String,
    },
    ConfirmDelete {
        task_id: TaskId,
        title: String,
    },
}

impl Prompt {
    pub fn label(&self) -> String {
        match self {
            Prompt::NewTask { column, .. } => format!("New task in {}", column.label()),
            Prompt::Rename { .. } => "Rename task".to_string(),
            Prompt::ConfirmDelete { title, .. } => format!("Delete \"{title}\"? (y/n)"),
        }
    }

    pub fn input(&self) -> Option<&str> {
        match self {
            Prompt::NewTask { input, .. } | Prompt::Rename { input, .. } => Some(input),
            Prompt::ConfirmDelete { .. } => None,
        }
    }

    fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Prompt::NewTask { input, .. } | Prompt::Rename { input, .. } => Some(input),
            Prompt::ConfirmDelete { .. } => None,
        }
    }
}

/// Work the run loop performs against the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(MovePlan),
    Create {
        title: String,
        column: ColumnId,
        due_date: Option<NaiveDate>,
    },
    Rename {
        task_id: TaskId,
        title: String,
    },
    Delete(TaskId),
    Refresh,
}

pub struct AppState {
    pub mode: ViewMode,
    pub board: Pane<KanbanAdapter>,
    pub timeline: Pane<TimelineAdapter>,
    pub prompt: Option<Prompt>,
    /// Screen-reader style description of the last keyboard drag step.
    pub announcement: Option<String>,
    pub notice: Option<Notice>,
    timeline_days: u32,
    last_pointer: Option<PointerInput>,
    /// Scroll the focused card into view once the next snapshot is laid out.
    reveal_pending: bool,
    quit: bool,
}

impl AppState {
    pub fn new(settings: &Settings, today: NaiveDate) -> Self {
        let config: DragConfig = settings.drag_config();
        let mode = if settings.starts_in_timeline() {
            ViewMode::Timeline
        } else {
            ViewMode::Board
        };
        Self {
            mode,
            board: Pane::new(KanbanAdapter, config),
            timeline: Pane::new(TimelineAdapter::new(today, settings.timeline_days), config),
            prompt: None,
            announcement: None,
            notice: None,
            timeline_days: settings.timeline_days,
            last_pointer: None,
            reveal_pending: false,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn relayout(&mut self, board_area: TermRect, timeline_area: TermRect, model: &ColumnMap) {
        self.board.relayout(board_area, model);
        self.timeline.relayout(timeline_area, model);
    }

    /// A new snapshot was published.
    pub fn on_snapshot(&mut self, model: &ColumnMap) {
        self.board.retain_focus(model);
        self.timeline.retain_focus(model);
        let (board_area, timeline_area) = (self.board.area(), self.timeline.area());
        self.relayout(board_area, timeline_area, model);
        if std::mem::take(&mut self.reveal_pending) {
            match self.mode {
                ViewMode::Board => self.board.reveal_focused(model),
                ViewMode::Timeline => self.timeline.reveal_focused(model),
            }
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Per-frame work. Returns whether a redraw is needed.
    pub fn tick(&mut self, model: &ColumnMap) -> bool {
        match self.mode {
            ViewMode::Board => self.board.tick_autoscroll(model),
            ViewMode::Timeline => self.timeline.tick_autoscroll(model),
        }
    }

    pub fn handle_input(&mut self, input: InputEvent, model: &ColumnMap) -> Vec<Action> {
        match input {
            InputEvent::Key(key) => self.handle_key(key, model),
            InputEvent::Pointer(pointer) => {
                self.last_pointer = Some(pointer);
                let prompt = &mut self.prompt;
                match self.mode {
                    ViewMode::Board => handle_pointer(&mut self.board, pointer, model, prompt),
                    ViewMode::Timeline => handle_pointer(&mut self.timeline, pointer, model, prompt),
                }
            }
            InputEvent::PointerCancel => {
                let position = self
                    .last_pointer
                    .map(|pointer| pointer.position())
                    .unwrap_or_default();
                let event =
                    PointerEvent::primary(MOUSE_POINTER_ID, position, PointerTarget::Empty);
                let outcome = match self.mode {
                    ViewMode::Board => self.board.controller.pointer_cancel(event, model),
                    ViewMode::Timeline => self.timeline.controller.pointer_cancel(event, model),
                };
                match outcome {
                    PointerOutcome::Drop(plan) => vec![Action::Move(plan)],
                    _ => Vec::new(),
                }
            }
            InputEvent::Resize(_, _) => Vec::new(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, model: &ColumnMap) -> Vec<Action> {
        if self.prompt.is_some() {
            return self.handle_prompt_key(key).into_iter().collect();
        }

        let lifted = match self.mode {
            ViewMode::Board => self.board.controller.lifted_task().is_some(),
            ViewMode::Timeline => self.timeline.controller.lifted_task().is_some(),
        };
        let pointer_active = match self.mode {
            ViewMode::Board => self.board.controller.captured_pointer().is_some(),
            ViewMode::Timeline => self.timeline.controller.captured_pointer().is_some(),
        };

        if pointer_active && key.code == KeyCode::Esc {
            self.active_abort();
            return Vec::new();
        }

        if let Some(command) = key_command(&key)
            && (lifted || command == KeyCommand::Activate)
        {
            let outcome = match self.mode {
                ViewMode::Board => keyboard_drag(&mut self.board, command, model),
                ViewMode::Timeline => keyboard_drag(&mut self.timeline, command, model),
            };
            if outcome != KeyboardOutcome::Ignored {
                self.reveal_pending |= outcome.refocus().is_some();
                if let Some(text) = outcome.announcement() {
                    self.announcement = Some(text.to_string());
                }
                return outcome.plan().cloned().map(Action::Move).into_iter().collect();
            }
        }

        // A lifted card only answers to the drag keys, quit and view switching.
        if lifted && !matches!(app_key(&key), Some(AppKey::Quit | AppKey::ToggleView)) {
            return Vec::new();
        }

        if let Some(command) = key_command(&key) {
            let step = match command {
                KeyCommand::Left => Some(FocusStep::Left),
                KeyCommand::Right => Some(FocusStep::Right),
                KeyCommand::Up => Some(FocusStep::Up),
                KeyCommand::Down => Some(FocusStep::Down),
                KeyCommand::Cancel => {
                    self.announcement = None;
                    self.notice = None;
                    None
                }
                KeyCommand::Activate => None,
            };
            if let Some(step) = step {
                match self.mode {
                    ViewMode::Board => {
                        self.board.move_focus(step, model);
                        self.board.reveal_focused(model);
                    }
                    ViewMode::Timeline => {
                        self.timeline.move_focus(step, model);
                        self.timeline.reveal_focused(model);
                    }
                }
            }
            return Vec::new();
        }

        match app_key(&key) {
            Some(AppKey::Quit) => {
                self.active_abort();
                self.quit = true;
                Vec::new()
            }
            Some(AppKey::ToggleView) => {
                self.active_abort();
                self.mode = match self.mode {
                    ViewMode::Board => ViewMode::Timeline,
                    ViewMode::Timeline => ViewMode::Board,
                };
                self.announcement = None;
                Vec::new()
            }
            Some(AppKey::NewTask) => {
                self.prompt = Some(self.new_task_prompt(model));
                Vec::new()
            }
            Some(AppKey::RenameTask) => {
                if let Some(task) = self.focused().and_then(|task_id| model.task(task_id)) {
                    self.prompt = Some(Prompt::Rename {
                        task_id: task.id,
                        input: task.title.clone(),
                    });
                }
                Vec::new()
            }
            Some(AppKey::DeleteTask) => {
                if let Some(task) = self.focused().and_then(|task_id| model.task(task_id)) {
                    self.prompt = Some(Prompt::ConfirmDelete {
                        task_id: task.id,
                        title: task.title.clone(),
                    });
                }
                Vec::new()
            }
            Some(AppKey::Refresh) => vec![Action::Refresh],
            Some(AppKey::EarlierRange) => {
                self.shift_range(false);
                Vec::new()
            }
            Some(AppKey::LaterRange) => {
                self.shift_range(true);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Option<Action> {
        let prompt = self.prompt.as_mut()?;

        if let Prompt::ConfirmDelete { task_id, .. } = prompt {
            let task_id = *task_id;
            self.prompt = None;
            return matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'))
                .then_some(Action::Delete(task_id));
        }

        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                None
            }
            KeyCode::Enter => {
                let prompt = self.prompt.take()?;
                let title = normalize_title(prompt.input().unwrap_or_default())?;
                match prompt {
                    Prompt::NewTask {
                        column, due_date, ..
                    } => Some(Action::Create {
                        title,
                        column,
                        due_date,
                    }),
                    Prompt::Rename { task_id, .. } => Some(Action::Rename { task_id, title }),
                    Prompt::ConfirmDelete { .. } => None,
                }
            }
            KeyCode::Backspace => {
                prompt.input_mut()?.pop();
                None
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                prompt.input_mut()?.push(ch);
                None
            }
            _ => None,
        }
    }

    pub fn focused(&self) -> Option<TaskId> {
        match self.mode {
            ViewMode::Board => self.board.focused,
            ViewMode::Timeline => self.timeline.focused,
        }
    }

    fn new_task_prompt(&self, model: &ColumnMap) -> Prompt {
        let (column, due_date) = match self.mode {
            ViewMode::Board => (
                self.board.focused_container(model).unwrap_or(ColumnId::Todo),
                None,
            ),
            ViewMode::Timeline => (ColumnId::Todo, self.timeline.focused_container(model)),
        };
        Prompt::NewTask {
            column,
            due_date,
            input: String::new(),
        }
    }

    fn shift_range(&mut self, later: bool) {
        let adapter = *self.timeline.adapter();
        let days = Days::new(u64::from(self.timeline_days));
        let first_day = if later {
            adapter.first_day.checked_add_days(days)
        } else {
            adapter.first_day.checked_sub_days(days)
        };
        if let Some(first_day) = first_day {
            self.timeline
                .controller
                .set_adapter(TimelineAdapter::new(first_day, self.timeline_days));
        }
    }

    /// Tears down whatever session the visible view has in progress.
    fn active_abort(&mut self) {
        match self.mode {
            ViewMode::Board => self.board.controller.abort(),
            ViewMode::Timeline => self.timeline.controller.abort(),
        }
    }
}

fn keyboard_drag<A: PaneAdapter>(
    pane: &mut Pane<A>,
    command: KeyCommand,
    model: &ColumnMap,
) -> KeyboardOutcome {
    let outcome = pane.controller.handle_key(command, pane.focused, model);
    if let KeyboardOutcome::Lifted { task_id, .. } = &outcome {
        pane.focused = Some(*task_id);
    }
    // Focus comes back to the moved card once the plan is applied and re-rendered.
    if let Some(task_id) = outcome.refocus() {
        pane.focused = Some(task_id);
    }
    outcome
}

fn handle_pointer<A: PaneAdapter>(
    pane: &mut Pane<A>,
    pointer: PointerInput,
    model: &ColumnMap,
    prompt: &mut Option<Prompt>,
) -> Vec<Action> {
    if prompt.is_some() {
        return Vec::new();
    }
    let position = pointer.position();
    let target = pane.target_at(position);
    let event = PointerEvent {
        pointer_id: MOUSE_POINTER_ID,
        button: pointer.button,
        position,
        target,
    };

    match pointer.phase {
        PointerPhase::Down => {
            if let PointerTarget::Control(task_id) = target
                && pane.controller.is_idle()
                && let Some(task) = model.task(task_id)
            {
                *prompt = Some(Prompt::ConfirmDelete {
                    task_id,
                    title: task.title.clone(),
                });
                return Vec::new();
            }
            let layout = pane.layout.clone();
            if pane.controller.pointer_down(event, model, &layout) == PointerOutcome::Pressed
                && let PointerTarget::Task(task_id) = target
            {
                pane.focused = Some(task_id);
            }
            Vec::new()
        }
        PointerPhase::Move => {
            let layout = pane.layout.clone();
            pane.controller.pointer_move(event, &layout);
            Vec::new()
        }
        PointerPhase::Up => match pane.controller.pointer_up(event, model) {
            PointerOutcome::Drop(plan) => vec![Action::Move(plan)],
            PointerOutcome::OpenEdit(task_id) => {
                if let Some(task) = model.task(task_id) {
                    *prompt = Some(Prompt::Rename {
                        task_id,
                        input: task.title.clone(),
                    });
                }
                Vec::new()
            }
            _ => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::{ColumnMove, PointerButton};
    use crate::input::cell_center;
    use crate::ordering::tests::task;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code, KeyModifiers::empty()))
    }

    fn mouse(phase: PointerPhase, column: u16, row: u16) -> InputEvent {
        InputEvent::Pointer(PointerInput {
            phase,
            button: PointerButton::Primary,
            column,
            row,
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
    }

    fn state_with(model: &ColumnMap) -> AppState {
        let mut state = AppState::new(&Settings::default(), today());
        state.relayout(TermRect::new(0, 1, 90, 20), TermRect::new(0, 1, 140, 20), model);
        state
    }

    fn sample() -> ColumnMap {
        ColumnMap::from_tasks(vec![
            task("a", ColumnId::Todo, 0),
            task("b", ColumnId::Todo, 1),
            task("c", ColumnId::InProgress, 0),
        ])
    }

    #[test]
    fn test_space_lifts_and_arrow_moves_focused_card() {
        let model = sample();
        let mut state = state_with(&model);
        let a = model.column(ColumnId::Todo)[0].id;

        state.handle_input(key(KeyCode::Down), &model);
        assert_eq!(state.focused(), Some(a));

        assert!(state.handle_input(key(KeyCode::Char(' ')), &model).is_empty());
        assert!(
            state
                .announcement
                .as_deref()
                .is_some_and(|text| text.starts_with("Lifted a."))
        );

        let actions = state.handle_input(key(KeyCode::Right), &model);
        assert_eq!(
            actions,
            vec![Action::Move(MovePlan::column_move(
                a,
                ColumnId::Todo,
                ColumnId::InProgress,
                1
            ))]
        );
        assert_eq!(state.focused(), Some(a));
    }

    #[test]
    fn test_keyboard_move_to_long_column_scrolls_card_into_view() {
        let mut tasks: Vec<_> = (0..10)
            .map(|order| task(&format!("t{order}"), ColumnId::Todo, order))
            .collect();
        tasks.push(task("x", ColumnId::InProgress, 0));
        let model = ColumnMap::from_tasks(tasks);
        let x = model.column(ColumnId::InProgress)[0].id;
        let mut state = state_with(&model);

        state.handle_input(key(KeyCode::Down), &model);
        state.handle_input(key(KeyCode::Right), &model);
        assert_eq!(state.focused(), Some(x));
        state.handle_input(key(KeyCode::Char(' ')), &model);
        let actions = state.handle_input(key(KeyCode::Left), &model);
        let [Action::Move(plan)] = actions.as_slice() else {
            panic!("expected one move, got {actions:?}");
        };
        assert_eq!(
            plan.column_move,
            Some(ColumnMove {
                source: ColumnId::InProgress,
                target: ColumnId::Todo,
                index: 10
            })
        );

        let moved = model
            .with_moved(x, ColumnId::InProgress, ColumnId::Todo, 10)
            .expect("move is valid")
            .expect("move changes the board")
            .snapshot;
        state.on_snapshot(&moved);

        let bounds = state.board.layout.item_bounds(x).expect("card is laid out");
        let viewport = state
            .board
            .layout
            .containers
            .iter()
            .find(|container| container.id == ColumnId::Todo)
            .expect("todo column is laid out")
            .viewport;
        assert!(crate::tui::pane::is_visible(bounds, viewport));
        assert_eq!(state.focused(), Some(x));
    }

    #[test]
    fn test_dragging_undated_task_onto_a_day_schedules_it() {
        let model = sample();
        let b = model.column(ColumnId::Todo)[1].id;
        let mut state = state_with(&model);
        state.mode = ViewMode::Timeline;
        let tomorrow = today().succ_opt().expect("valid date");

        // The tray lists a, b and c; b sits in the second slot.
        state.handle_input(mouse(PointerPhase::Down, 20, 19), &model);
        assert_eq!(state.focused(), Some(b));
        state.handle_input(mouse(PointerPhase::Move, 25, 12), &model);
        state.handle_input(mouse(PointerPhase::Move, 30, 5), &model);
        assert_eq!(
            state.timeline.controller.candidate_container(),
            Some(&tomorrow)
        );
        let actions = state.handle_input(mouse(PointerPhase::Up, 30, 5), &model);

        assert_eq!(
            actions,
            vec![Action::Move(MovePlan {
                task_id: b,
                column_move: None,
                reschedule: Some(tomorrow),
            })]
        );
        assert!(state.timeline.controller.is_idle());
    }

    #[test]
    fn test_click_without_drag_opens_rename_prompt() {
        let model = sample();
        let mut state = state_with(&model);
        let a = model.column(ColumnId::Todo)[0].id;

        state.handle_input(mouse(PointerPhase::Down, 5, 2), &model);
        let actions = state.handle_input(mouse(PointerPhase::Up, 5, 2), &model);

        assert!(actions.is_empty());
        assert_eq!(
            state.prompt,
            Some(Prompt::Rename {
                task_id: a,
                input: "a".to_string()
            })
        );
    }

    #[test]
    fn test_pointer_drag_to_next_column_yields_move() {
        let model = sample();
        let mut state = state_with(&model);
        let a = model.column(ColumnId::Todo)[0].id;

        state.handle_input(mouse(PointerPhase::Down, 5, 2), &model);
        state.handle_input(mouse(PointerPhase::Move, 20, 2), &model);
        state.handle_input(mouse(PointerPhase::Move, 40, 9), &model);
        assert_eq!(
            state.board.controller.candidate_container(),
            Some(&ColumnId::InProgress)
        );
        let actions = state.handle_input(mouse(PointerPhase::Up, 40, 9), &model);

        assert_eq!(actions.len(), 1);
        let Action::Move(plan) = &actions[0] else {
            panic!("expected a move, got {actions:?}");
        };
        assert_eq!(plan.task_id, a);
        assert_eq!(
            plan.column_move,
            Some(ColumnMove {
                source: ColumnId::Todo,
                target: ColumnId::InProgress,
                index: 1,
            })
        );
        assert!(state.board.controller.is_idle());
    }

    #[test]
    fn test_delete_control_asks_for_confirmation() {
        let model = sample();
        let mut state = state_with(&model);
        let a = model.column(ColumnId::Todo)[0].id;

        state.handle_input(mouse(PointerPhase::Down, 28, 2), &model);
        assert!(matches!(state.prompt, Some(Prompt::ConfirmDelete { task_id, .. }) if task_id == a));

        let actions = state.handle_input(key(KeyCode::Char('y')), &model);
        assert_eq!(actions, vec![Action::Delete(a)]);
        assert_eq!(state.prompt, None);
    }

    #[test]
    fn test_new_task_prompt_collects_title() {
        let model = sample();
        let mut state = state_with(&model);

        state.handle_input(key(KeyCode::Char('n')), &model);
        for ch in "  Write report ".chars() {
            state.handle_input(key(KeyCode::Char(ch)), &model);
        }
        let actions = state.handle_input(key(KeyCode::Enter), &model);

        assert_eq!(
            actions,
            vec![Action::Create {
                title: "Write report".to_string(),
                column: ColumnId::Todo,
                due_date: None,
            }]
        );
    }

    #[test]
    fn test_toggle_view_aborts_keyboard_session() {
        let model = sample();
        let mut state = state_with(&model);
        state.handle_input(key(KeyCode::Down), &model);
        state.handle_input(key(KeyCode::Enter), &model);
        assert!(state.board.controller.lifted_task().is_some());

        state.handle_input(key(KeyCode::Tab), &model);

        assert_eq!(state.mode, ViewMode::Timeline);
        assert!(state.board.controller.is_idle());
    }

    #[test]
    fn test_range_shift_moves_timeline_window() {
        let model = sample();
        let mut state = state_with(&model);

        state.handle_input(key(KeyCode::Char(']')), &model);
        assert_eq!(
            state.timeline.adapter().first_day,
            today().checked_add_days(Days::new(7)).expect("valid date")
        );
        state.handle_input(key(KeyCode::Char('[')), &model);
        state.handle_input(key(KeyCode::Char('[')), &model);
        assert_eq!(
            state.timeline.adapter().first_day,
            today().checked_sub_days(Days::new(7)).expect("valid date")
        );
    }

    #[test]
    fn test_focus_lost_mid_drag_drops_at_candidate() {
        let model = sample();
        let mut state = state_with(&model);

        state.handle_input(mouse(PointerPhase::Down, 5, 2), &model);
        state.handle_input(mouse(PointerPhase::Move, 40, 9), &model);
        let actions = state.handle_input(InputEvent::PointerCancel, &model);

        assert!(matches!(actions.as_slice(), [Action::Move(_)]));
        assert!(state.board.controller.is_idle());
        assert_eq!(cell_center(40, 9), state.last_pointer.expect("pointer seen").position());
    }
}
