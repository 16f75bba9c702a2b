//! Device-independent geometry used by the pointer drag path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Half-open containment: the right and bottom edges belong to the neighbour.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Same size, centered on `point`.
    pub fn centered_on(&self, point: Point) -> Rect {
        Rect::new(
            point.x - self.width / 2.0,
            point.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn sign(self) -> f64 {
        match self {
            ScrollDirection::Up => -1.0,
            ScrollDirection::Down => 1.0,
        }
    }
}

/// Index at which an item dropped at `pointer_y` is inserted.
///
/// `bounds` are the container's items in display order, the dragged item already
/// removed. The first item whose vertical midpoint lies below the pointer wins;
/// otherwise the item goes to the end.
pub fn compute_insertion_index(pointer_y: f64, bounds: &[Rect]) -> usize {
    bounds
        .iter()
        .position(|rect| rect.mid_y() > pointer_y)
        .unwrap_or(bounds.len())
}

/// True once the pointer has travelled further than `threshold` on either axis.
pub fn exceeds_threshold(origin: Point, current: Point, threshold: f64) -> bool {
    (current.x - origin.x).abs() > threshold || (current.y - origin.y).abs() > threshold
}

/// Auto-scroll direction for a pointer inside `margin` of the viewport's top or
/// bottom edge.
pub fn edge_scroll_direction(pointer_y: f64, viewport: Rect, margin: f64) -> Option<ScrollDirection> {
    if viewport.height <= 0.0 {
        return None;
    }
    if pointer_y < viewport.y + margin {
        Some(ScrollDirection::Up)
    } else if pointer_y > viewport.bottom() - margin {
        Some(ScrollDirection::Down)
    } else {
        None
    }
}
