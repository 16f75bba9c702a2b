//! Edge auto-scroll owned by a pointer drag session.
//!
//! The host calls `DragController::tick_autoscroll` once per animation frame and
//! applies the returned delta to the container's viewport. The task lives inside
//! the session, so every exit path that resets the session also stops scrolling.

use crate::geometry::{ScrollDirection, edge_scroll_direction};

use super::{ContainerAdapter, DragController, DragSession};

#[derive(Debug, Clone, PartialEq)]
pub struct AutoScroll<C> {
    pub container: C,
    pub direction: ScrollDirection,
    step_px: f64,
    frames: u64,
    cancelled: bool,
}

/// Scroll the host should apply to a container's viewport this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest<C> {
    pub container: C,
    pub delta_px: f64,
}

impl<C: Clone> AutoScroll<C> {
    pub fn start(container: C, direction: ScrollDirection, step_px: f64) -> Self {
        Self {
            container,
            direction,
            step_px,
            frames: 0,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            tracing::trace!(frames = self.frames, "auto-scroll cancelled");
        }
        self.cancelled = true;
    }

    fn tick(&mut self) -> Option<ScrollRequest<C>> {
        if self.cancelled {
            return None;
        }
        self.frames += 1;
        Some(ScrollRequest {
            container: self.container.clone(),
            delta_px: self.direction.sign() * self.step_px,
        })
    }
}

impl<A: ContainerAdapter> DragController<A> {
    /// Advances auto-scroll by one frame.
    pub fn tick_autoscroll(&mut self) -> Option<ScrollRequest<A::Container>> {
        match &mut self.session {
            DragSession::Dragging(drag) => drag.autoscroll.as_mut().and_then(AutoScroll::tick),
            _ => None,
        }
    }

    /// Starts, redirects or stops auto-scroll for the pointer position.
    pub(super) fn update_autoscroll(
        &self,
        current: Option<AutoScroll<A::Container>>,
        container: Option<(&A::Container, crate::geometry::Rect)>,
        pointer_y: f64,
    ) -> Option<AutoScroll<A::Container>> {
        let (id, viewport) = container?;
        let direction =
            edge_scroll_direction(pointer_y, viewport, self.config.autoscroll_margin_px)?;

        match current {
            Some(active) if &active.container == id && active.direction == direction => {
                Some(active)
            }
            _ => {
                tracing::trace!(?direction, container = ?id, "auto-scroll started");
                Some(AutoScroll::start(
                    id.clone(),
                    direction,
                    self.config.autoscroll_step_px,
                ))
            }
        }
    }
}
