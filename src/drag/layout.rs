//! Geometry snapshot of the drop containers, produced by the presentation layer.
//!
//! The drag controllers never query a rendering tree directly. Each frame the view
//! describes its containers (bounds, scroll viewport, ordered items) and hands the
//! snapshot to the controller. The floating proxy is never part of a layout, so hit
//! tests cannot resolve to it.

use crate::geometry::{Point, Rect};
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq)]
pub struct ItemLayout {
    pub task_id: TaskId,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLayout<C> {
    pub id: C,
    /// Area that accepts drops.
    pub bounds: Rect,
    /// Visible part of the scrollable task list.
    pub viewport: Rect,
    /// Task elements in display order.
    pub items: Vec<ItemLayout>,
}

impl<C> ContainerLayout<C> {
    pub fn new(id: C, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            viewport: bounds,
            items: Vec::new(),
        }
    }

    pub fn with_viewport(mut self, viewport: Rect) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_item(mut self, task_id: TaskId, bounds: Rect) -> Self {
        self.items.push(ItemLayout { task_id, bounds });
        self
    }

    /// Item bounds in display order, skipping `excluded`.
    pub fn item_bounds_excluding(&self, excluded: TaskId) -> Vec<Rect> {
        self.items
            .iter()
            .filter(|item| item.task_id != excluded)
            .map(|item| item.bounds)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout<C> {
    pub containers: Vec<ContainerLayout<C>>,
    /// Draggable tasks shown outside every container, e.g. a tray of undated
    /// tasks. They can be picked up but never take drops.
    pub sources: Vec<ItemLayout>,
}

impl<C> Default for Layout<C> {
    fn default() -> Self {
        Self {
            containers: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl<C: PartialEq> Layout<C> {
    pub fn new(containers: Vec<ContainerLayout<C>>) -> Self {
        Self {
            containers,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, task_id: TaskId, bounds: Rect) -> Self {
        self.sources.push(ItemLayout { task_id, bounds });
        self
    }

    pub fn container(&self, id: &C) -> Option<&ContainerLayout<C>> {
        self.containers.iter().find(|container| &container.id == id)
    }

    /// Container whose drop area holds `point`. Later containers are drawn on top,
    /// so they win when areas overlap.
    pub fn container_at(&self, point: Point) -> Option<&ContainerLayout<C>> {
        self.containers
            .iter()
            .rev()
            .find(|container| container.bounds.contains(point))
    }

    pub fn item_bounds(&self, task_id: TaskId) -> Option<Rect> {
        self.containers
            .iter()
            .flat_map(|container| container.items.iter())
            .chain(self.sources.iter())
            .find(|item| item.task_id == task_id)
            .map(|item| item.bounds)
    }
}
