//! Pointer path: press, threshold promotion, continuous tracking, drop.

use crate::geometry::{Point, exceeds_threshold};
use crate::ordering::ColumnMap;
use crate::types::TaskId;

use super::{
    ContainerAdapter, DragController, DragSession, DragState, Layout, MovePlan, Placeholder,
    PressState, Proxy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Element under the pointer as reported by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// The body of a draggable task.
    Task(TaskId),
    /// An interactive child (link, button) inside a task.
    Control(TaskId),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub button: PointerButton,
    pub position: Point,
    pub target: PointerTarget,
}

impl PointerEvent {
    pub fn primary(pointer_id: u32, position: Point, target: PointerTarget) -> Self {
        Self {
            pointer_id,
            button: PointerButton::Primary,
            position,
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    /// Not for this session; the view may handle it.
    Ignored,
    /// Press recorded and pointer captured, nothing visible yet.
    Pressed,
    DragStarted,
    Tracking,
    /// Released without crossing the threshold on a task body.
    OpenEdit(TaskId),
    /// Released over a container; the plan is ready for the reconciliation layer.
    Drop(MovePlan),
    /// Session ended without a move.
    Released,
}

impl<A: ContainerAdapter> DragController<A> {
    pub fn pointer_down(
        &mut self,
        event: PointerEvent,
        model: &ColumnMap,
        layout: &Layout<A::Container>,
    ) -> PointerOutcome {
        if !self.is_idle() || event.button != PointerButton::Primary {
            return PointerOutcome::Ignored;
        }
        let PointerTarget::Task(task_id) = event.target else {
            return PointerOutcome::Ignored;
        };
        let Some(source_bounds) = layout.item_bounds(task_id) else {
            tracing::debug!(task_id = %task_id, "pointer down on a task missing from the layout");
            return PointerOutcome::Ignored;
        };

        self.session = DragSession::Pressed(PressState {
            task_id,
            pointer_id: event.pointer_id,
            start: event.position,
            source_bounds,
            origin: self.adapter.position_of(model, task_id),
        });
        PointerOutcome::Pressed
    }

    pub fn pointer_move(
        &mut self,
        event: PointerEvent,
        layout: &Layout<A::Container>,
    ) -> PointerOutcome {
        if self.captured_pointer() != Some(event.pointer_id) {
            return PointerOutcome::Ignored;
        }

        let started = match &self.session {
            DragSession::Pressed(press) => {
                if !exceeds_threshold(press.start, event.position, self.config.threshold_px) {
                    return PointerOutcome::Tracking;
                }
                let press = press.clone();
                tracing::debug!(task_id = %press.task_id, "press promoted to drag");
                self.session = DragSession::Dragging(DragState {
                    task_id: press.task_id,
                    pointer_id: press.pointer_id,
                    origin: press.origin,
                    last_point: event.position,
                    proxy: Proxy {
                        bounds: press.source_bounds.centered_on(event.position),
                        rotation_deg: self.config.proxy_rotation_deg,
                    },
                    placeholder: None,
                    autoscroll: None,
                });
                true
            }
            DragSession::Dragging(_) => false,
            _ => return PointerOutcome::Ignored,
        };

        self.track(event.position, layout);
        if started {
            PointerOutcome::DragStarted
        } else {
            PointerOutcome::Tracking
        }
    }

    /// Recomputes the drop candidate at the last pointer position, e.g. after the
    /// view scrolled under a stationary pointer.
    pub fn relayout(&mut self, layout: &Layout<A::Container>) {
        if let DragSession::Dragging(drag) = &self.session {
            let point = drag.last_point;
            self.track(point, layout);
        }
    }

    fn track(&mut self, point: Point, layout: &Layout<A::Container>) {
        let DragSession::Dragging(drag) = &self.session else {
            return;
        };
        let task_id = drag.task_id;
        let size = (drag.proxy.bounds.width, drag.proxy.bounds.height);
        let previous_scroll = drag.autoscroll.clone();

        let found = self.adapter.locate_container(layout, point);
        let placeholder = found.map(|container| Placeholder {
            container: container.id.clone(),
            index: self.adapter.compute_index(point, container, task_id),
            width: size.0,
            height: size.1,
        });
        let autoscroll = self.update_autoscroll(
            previous_scroll,
            found.map(|container| (&container.id, container.viewport)),
            point.y,
        );

        if let DragSession::Dragging(drag) = &mut self.session {
            drag.last_point = point;
            drag.proxy.bounds = drag.proxy.bounds.centered_on(point);
            drag.placeholder = placeholder;
            drag.autoscroll = autoscroll;
        }
    }

    pub fn pointer_up(&mut self, event: PointerEvent, model: &ColumnMap) -> PointerOutcome {
        self.finish(event, model, false)
    }

    pub fn pointer_cancel(&mut self, event: PointerEvent, model: &ColumnMap) -> PointerOutcome {
        self.finish(event, model, true)
    }

    fn finish(&mut self, event: PointerEvent, model: &ColumnMap, cancelled: bool) -> PointerOutcome {
        if self.captured_pointer() != Some(event.pointer_id) {
            return PointerOutcome::Ignored;
        }

        let outcome = match &self.session {
            DragSession::Pressed(_) if cancelled => PointerOutcome::Released,
            DragSession::Pressed(_) => match event.target {
                PointerTarget::Task(task_id) => PointerOutcome::OpenEdit(task_id),
                _ => PointerOutcome::Released,
            },
            DragSession::Dragging(drag) => match &drag.placeholder {
                Some(placeholder) => self
                    .adapter
                    .plan_move(model, drag.task_id, &placeholder.container, placeholder.index)
                    .map(PointerOutcome::Drop)
                    .unwrap_or(PointerOutcome::Released),
                None => {
                    tracing::debug!(task_id = %drag.task_id, "drag ended outside any container");
                    PointerOutcome::Released
                }
            },
            _ => PointerOutcome::Ignored,
        };

        self.teardown();
        outcome
    }
}
