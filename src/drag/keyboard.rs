//! Keyboard path: lift, step, drop, cancel.
//!
//! Steps apply eagerly. Every step that changes the task's position yields a
//! `MovePlan` for the host to apply right away, and the host re-focuses the task
//! once the next snapshot shows it in its new place.

use crate::ordering::ColumnMap;
use crate::types::TaskId;

use super::{
    ColumnMove, ContainerAdapter, DragController, DragSession, LiftState, MovePlan, Step,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Space or Enter.
    Activate,
    /// Escape.
    Cancel,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardOutcome {
    Ignored,
    Lifted {
        task_id: TaskId,
        announcement: String,
    },
    Moved {
        plan: MovePlan,
        announcement: String,
    },
    /// Lifted, but the step leads nowhere (board edge, first/last slot).
    Blocked,
    Dropped {
        task_id: TaskId,
        announcement: String,
    },
    Cancelled {
        plan: Option<MovePlan>,
        announcement: String,
    },
}

impl KeyboardOutcome {
    pub fn announcement(&self) -> Option<&str> {
        match self {
            KeyboardOutcome::Lifted { announcement, .. }
            | KeyboardOutcome::Moved { announcement, .. }
            | KeyboardOutcome::Dropped { announcement, .. }
            | KeyboardOutcome::Cancelled { announcement, .. } => Some(announcement),
            KeyboardOutcome::Ignored | KeyboardOutcome::Blocked => None,
        }
    }

    pub fn plan(&self) -> Option<&MovePlan> {
        match self {
            KeyboardOutcome::Moved { plan, .. } => Some(plan),
            KeyboardOutcome::Cancelled { plan, .. } => plan.as_ref(),
            _ => None,
        }
    }

    /// Task the host should focus again after applying the plan.
    pub fn refocus(&self) -> Option<TaskId> {
        self.plan().map(|plan| plan.task_id)
    }
}

impl<A: ContainerAdapter> DragController<A> {
    pub fn handle_key(
        &mut self,
        command: KeyCommand,
        focused: Option<TaskId>,
        model: &ColumnMap,
    ) -> KeyboardOutcome {
        let lift = match &self.session {
            DragSession::Idle => return self.lift(command, focused, model),
            DragSession::Lifted(lift) => lift.clone(),
            _ => return KeyboardOutcome::Ignored,
        };

        match command {
            KeyCommand::Activate => {
                self.teardown();
                let announcement = match self.adapter.position_of(model, lift.task_id) {
                    Some((container, index)) => format!(
                        "Dropped at position {} in {}.",
                        index + 1,
                        self.adapter.describe(&container)
                    ),
                    None => "Dropped.".to_string(),
                };
                KeyboardOutcome::Dropped {
                    task_id: lift.task_id,
                    announcement,
                }
            }
            KeyCommand::Cancel => {
                self.teardown();
                let (container, index) = &lift.origin;
                let plan = self.restore_plan(model, &lift);
                KeyboardOutcome::Cancelled {
                    plan,
                    announcement: format!(
                        "Move cancelled. Returned to position {} in {}.",
                        index + 1,
                        self.adapter.describe(container)
                    ),
                }
            }
            KeyCommand::Left | KeyCommand::Right | KeyCommand::Up | KeyCommand::Down => {
                self.step(command, lift.task_id, model)
            }
        }
    }

    fn lift(
        &mut self,
        command: KeyCommand,
        focused: Option<TaskId>,
        model: &ColumnMap,
    ) -> KeyboardOutcome {
        if command != KeyCommand::Activate {
            return KeyboardOutcome::Ignored;
        }
        let Some(task_id) = focused else {
            return KeyboardOutcome::Ignored;
        };
        let Some(origin) = self.adapter.position_of(model, task_id) else {
            return KeyboardOutcome::Ignored;
        };

        let title = model
            .task(task_id)
            .map(|task| task.title.as_str())
            .unwrap_or_default();
        let announcement = format!(
            "Lifted {title}. Position {} of {} in {}. Use the arrow keys to move, Space to drop, Escape to cancel.",
            origin.1 + 1,
            self.adapter.len(model, &origin.0),
            self.adapter.describe(&origin.0)
        );
        tracing::debug!(task_id = %task_id, "task lifted with keyboard");
        self.session = DragSession::Lifted(LiftState {
            task_id,
            origin,
            board_origin: model.locate(task_id),
        });
        KeyboardOutcome::Lifted {
            task_id,
            announcement,
        }
    }

    /// Plan putting the lifted task back where it was: the adapter's origin slot and
    /// the exact board position it held at lift time.
    fn restore_plan(&self, model: &ColumnMap, lift: &LiftState<A::Container>) -> Option<MovePlan> {
        let (container, index) = &lift.origin;
        let mut plan = self
            .adapter
            .plan_move(model, lift.task_id, container, *index)
            .unwrap_or(MovePlan {
                task_id: lift.task_id,
                column_move: None,
                reschedule: None,
            });
        if let Some((column, column_index)) = lift.board_origin
            && let Some(current) = model.locate(lift.task_id)
        {
            plan.column_move = (current != (column, column_index)).then_some(ColumnMove {
                source: current.0,
                target: column,
                index: column_index,
            });
        }
        (!plan.is_empty()).then_some(plan)
    }

    fn step(&mut self, command: KeyCommand, task_id: TaskId, model: &ColumnMap) -> KeyboardOutcome {
        let Some((container, index)) = self.adapter.position_of(model, task_id) else {
            // The task vanished under the session, e.g. deleted by a refetch.
            tracing::debug!(task_id = %task_id, "lifted task no longer in the model");
            self.teardown();
            return KeyboardOutcome::Cancelled {
                plan: None,
                announcement: "Task is no longer on the board.".to_string(),
            };
        };

        let target = match command {
            KeyCommand::Left | KeyCommand::Right => {
                let step = if command == KeyCommand::Left {
                    Step::Previous
                } else {
                    Step::Next
                };
                self.adapter
                    .adjacent(&container, step)
                    .map(|next| {
                        let end = self.adapter.len(model, &next);
                        (next, end)
                    })
            }
            KeyCommand::Up => index.checked_sub(1).map(|up| (container.clone(), up)),
            KeyCommand::Down => {
                let len = self.adapter.len(model, &container);
                (index + 1 < len).then(|| (container.clone(), index + 1))
            }
            KeyCommand::Activate | KeyCommand::Cancel => None,
        };
        let Some((target, target_index)) = target else {
            return KeyboardOutcome::Blocked;
        };

        match self.adapter.plan_move(model, task_id, &target, target_index) {
            Some(plan) => KeyboardOutcome::Moved {
                plan,
                announcement: format!(
                    "Moved to position {} in {}.",
                    target_index + 1,
                    self.adapter.describe(&target)
                ),
            },
            None => KeyboardOutcome::Blocked,
        }
    }
}
