//! Drag-and-drop session shared by the board and the timeline.
//!
//! A `DragController` owns the single drag session of a view and is driven by two
//! input paths: pointer gestures (`pointer.rs`) and keyboard lift/move/drop
//! (`keyboard.rs`). Views plug in through `ContainerAdapter`, which knows how to
//! find containers, compute indices and turn a drop into a `MovePlan`.

pub mod autoscroll;
pub mod kanban;
pub mod keyboard;
pub mod layout;
pub mod pointer;
pub mod timeline;

use std::fmt;

use chrono::NaiveDate;

use crate::geometry::{Point, Rect, compute_insertion_index};
use crate::ordering::ColumnMap;
use crate::types::{ColumnId, TaskId};

pub use autoscroll::{AutoScroll, ScrollRequest};
pub use kanban::KanbanAdapter;
pub use keyboard::{KeyCommand, KeyboardOutcome};
pub use layout::{ContainerLayout, ItemLayout, Layout};
pub use pointer::{PointerButton, PointerEvent, PointerOutcome, PointerTarget};
pub use timeline::TimelineAdapter;

pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 10.0;
pub const DEFAULT_AUTOSCROLL_MARGIN_PX: f64 = 60.0;
pub const DEFAULT_AUTOSCROLL_STEP_PX: f64 = 12.0;
pub const DEFAULT_PROXY_ROTATION_DEG: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    pub threshold_px: f64,
    pub autoscroll_margin_px: f64,
    pub autoscroll_step_px: f64,
    pub proxy_rotation_deg: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            autoscroll_margin_px: DEFAULT_AUTOSCROLL_MARGIN_PX,
            autoscroll_step_px: DEFAULT_AUTOSCROLL_STEP_PX,
            proxy_rotation_deg: DEFAULT_PROXY_ROTATION_DEG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMove {
    pub source: ColumnId,
    pub target: ColumnId,
    pub index: usize,
}

/// What a drop means for the ordering model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub task_id: TaskId,
    pub column_move: Option<ColumnMove>,
    /// New timeline day for the task.
    pub reschedule: Option<NaiveDate>,
}

impl MovePlan {
    pub fn column_move(task_id: TaskId, source: ColumnId, target: ColumnId, index: usize) -> Self {
        Self {
            task_id,
            column_move: Some(ColumnMove {
                source,
                target,
                index,
            }),
            reschedule: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.column_move.is_none() && self.reschedule.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// View-specific capabilities the drag session needs.
pub trait ContainerAdapter {
    type Container: Clone + PartialEq + fmt::Debug;

    /// Eligible drop container under `point`.
    fn locate_container<'a>(
        &self,
        layout: &'a Layout<Self::Container>,
        point: Point,
    ) -> Option<&'a ContainerLayout<Self::Container>> {
        layout.container_at(point)
    }

    /// Insertion index for `point` among the container's items, `dragged` excluded.
    fn compute_index(
        &self,
        point: Point,
        container: &ContainerLayout<Self::Container>,
        dragged: TaskId,
    ) -> usize {
        compute_insertion_index(point.y, &container.item_bounds_excluding(dragged))
    }

    /// Logical (container, index) of a task in the ordering model.
    fn position_of(&self, model: &ColumnMap, task_id: TaskId) -> Option<(Self::Container, usize)>;

    /// Number of tasks the container currently shows.
    fn len(&self, model: &ColumnMap, container: &Self::Container) -> usize;

    fn adjacent(&self, container: &Self::Container, step: Step) -> Option<Self::Container>;

    /// Translates "put `task_id` at `index` of `target`" into a plan. `None` when the
    /// task is unknown or the drop changes nothing.
    fn plan_move(
        &self,
        model: &ColumnMap,
        task_id: TaskId,
        target: &Self::Container,
        index: usize,
    ) -> Option<MovePlan>;

    fn describe(&self, container: &Self::Container) -> String;
}

/// Floating visual copy of the dragged task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proxy {
    pub bounds: Rect,
    pub rotation_deg: f64,
}

/// Reserved space showing where the task lands if dropped now.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder<C> {
    pub container: C,
    pub index: usize,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PressState<C> {
    pub task_id: TaskId,
    pub pointer_id: u32,
    pub start: Point,
    pub source_bounds: Rect,
    pub origin: Option<(C, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState<C> {
    pub task_id: TaskId,
    pub pointer_id: u32,
    pub origin: Option<(C, usize)>,
    pub last_point: Point,
    pub proxy: Proxy,
    pub placeholder: Option<Placeholder<C>>,
    pub autoscroll: Option<AutoScroll<C>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiftState<C> {
    pub task_id: TaskId,
    pub origin: (C, usize),
    /// Column and index on the board at lift time. Timeline steps can reorder the
    /// task inside its column, so cancelling restores this too.
    pub board_origin: Option<(ColumnId, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragSession<C> {
    Idle,
    Pressed(PressState<C>),
    Dragging(DragState<C>),
    Lifted(LiftState<C>),
}

pub struct DragController<A: ContainerAdapter> {
    adapter: A,
    config: DragConfig,
    session: DragSession<A::Container>,
}

impl<A: ContainerAdapter> DragController<A> {
    pub fn new(adapter: A, config: DragConfig) -> Self {
        Self {
            adapter,
            config,
            session: DragSession::Idle,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Swaps the adapter, e.g. when the timeline range changes. Any session in
    /// progress is torn down first.
    pub fn set_adapter(&mut self, adapter: A) {
        self.abort();
        self.adapter = adapter;
    }

    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn session(&self) -> &DragSession<A::Container> {
        &self.session
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.session, DragSession::Idle)
    }

    /// Pointer id holding exclusive capture, if any.
    pub fn captured_pointer(&self) -> Option<u32> {
        match &self.session {
            DragSession::Pressed(press) => Some(press.pointer_id),
            DragSession::Dragging(drag) => Some(drag.pointer_id),
            _ => None,
        }
    }

    /// Task suppressed from hit-testing while a pointer drag is live.
    pub fn dragged_task(&self) -> Option<TaskId> {
        match &self.session {
            DragSession::Dragging(drag) => Some(drag.task_id),
            _ => None,
        }
    }

    pub fn lifted_task(&self) -> Option<TaskId> {
        match &self.session {
            DragSession::Lifted(lift) => Some(lift.task_id),
            _ => None,
        }
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        match &self.session {
            DragSession::Dragging(drag) => Some(&drag.proxy),
            _ => None,
        }
    }

    pub fn placeholder(&self) -> Option<&Placeholder<A::Container>> {
        match &self.session {
            DragSession::Dragging(drag) => drag.placeholder.as_ref(),
            _ => None,
        }
    }

    /// Container to highlight as the active drop target.
    pub fn candidate_container(&self) -> Option<&A::Container> {
        self.placeholder().map(|placeholder| &placeholder.container)
    }

    pub fn autoscroll(&self) -> Option<&AutoScroll<A::Container>> {
        match &self.session {
            DragSession::Dragging(drag) => drag.autoscroll.as_ref(),
            _ => None,
        }
    }

    /// Tears the session down without committing anything. Used when the view goes
    /// away mid-gesture.
    pub fn abort(&mut self) {
        if !self.is_idle() {
            tracing::debug!("drag session aborted");
        }
        self.teardown();
    }

    /// Single exit path: releases capture, drops proxy and placeholder, clears the
    /// highlight and cancels auto-scroll.
    fn teardown(&mut self) {
        if let DragSession::Dragging(drag) = &mut self.session
            && let Some(autoscroll) = drag.autoscroll.as_mut()
        {
            autoscroll.cancel();
        }
        self.session = DragSession::Idle;
    }
}
