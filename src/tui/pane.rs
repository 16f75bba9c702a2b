//! One drag-enabled view: its controller, scroll offsets and the last computed
//! geometry. Cells are converted to device-independent pixels here, so the drag
//! controllers only ever see `crate::geometry` values.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use tuirealm::ratatui::layout::{Constraint, Direction, Layout as TermLayout, Rect as TermRect};

use crate::drag::{
    ContainerAdapter, ContainerLayout, DragConfig, DragController, KanbanAdapter, Layout,
    PointerTarget, TimelineAdapter,
};
use crate::geometry::{Point, Rect};
use crate::input::{CELL_HEIGHT_PX, CELL_WIDTH_PX};
use crate::ordering::ColumnMap;
use crate::types::{ColumnId, Task, TaskId};

/// Rows taken by one card.
pub const CARD_HEIGHT: u16 = 2;
/// Rows between the tops of two consecutive cards.
pub const CARD_STRIDE: u16 = 3;
pub const MIN_BOARD_COLUMN_WIDTH: u16 = 18;
pub const MIN_TIMELINE_CELL_WIDTH: u16 = 12;
/// Rows of the tray below the timeline, border included.
pub const SOURCE_TRAY_HEIGHT: u16 = 3;
/// Width of one card in the tray, plus one cell of gap.
pub const SOURCE_CARD_WIDTH: u16 = 16;

/// What the terminal views need on top of the drag capabilities.
pub trait PaneAdapter: ContainerAdapter<Container: Copy + Eq + Hash> {
    /// Containers in display order.
    fn containers(&self) -> Vec<Self::Container>;

    /// Tasks shown in `container`, in display order.
    fn tasks<'a>(&self, model: &'a ColumnMap, container: &Self::Container) -> Vec<&'a Task>;

    fn min_container_width(&self) -> u16;

    /// Whether cards name their status column.
    fn card_shows_column(&self) -> bool {
        false
    }

    /// Tasks listed in the tray below the containers. They can be dragged into a
    /// container but are not part of any.
    fn sources<'a>(&self, _model: &'a ColumnMap) -> Vec<&'a Task> {
        Vec::new()
    }

    /// Rows reserved for the tray; zero means no tray.
    fn source_rows(&self) -> u16 {
        0
    }
}

impl PaneAdapter for KanbanAdapter {
    fn containers(&self) -> Vec<ColumnId> {
        ColumnId::ALL.to_vec()
    }

    fn tasks<'a>(&self, model: &'a ColumnMap, container: &ColumnId) -> Vec<&'a Task> {
        model.column(*container).iter().collect()
    }

    fn min_container_width(&self) -> u16 {
        MIN_BOARD_COLUMN_WIDTH
    }
}

impl PaneAdapter for TimelineAdapter {
    fn containers(&self) -> Vec<NaiveDate> {
        self.cells()
    }

    fn tasks<'a>(&self, model: &'a ColumnMap, container: &NaiveDate) -> Vec<&'a Task> {
        self.cell_tasks(model, *container)
    }

    fn min_container_width(&self) -> u16 {
        MIN_TIMELINE_CELL_WIDTH
    }

    fn card_shows_column(&self) -> bool {
        true
    }

    fn sources<'a>(&self, model: &'a ColumnMap) -> Vec<&'a Task> {
        self.unscheduled(model)
    }

    fn source_rows(&self) -> u16 {
        SOURCE_TRAY_HEIGHT
    }
}

pub fn cells_to_px(rect: TermRect) -> Rect {
    Rect::new(
        f64::from(rect.x) * CELL_WIDTH_PX,
        f64::from(rect.y) * CELL_HEIGHT_PX,
        f64::from(rect.width) * CELL_WIDTH_PX,
        f64::from(rect.height) * CELL_HEIGHT_PX,
    )
}

/// Cell rectangle covering `rect`, clipped to `bounds`. `None` when nothing of it
/// is visible.
pub fn px_to_cells(rect: Rect, bounds: TermRect) -> Option<TermRect> {
    let x = (rect.x / CELL_WIDTH_PX).round();
    let y = (rect.y / CELL_HEIGHT_PX).round();
    let width = (rect.width / CELL_WIDTH_PX).round();
    let height = (rect.height / CELL_HEIGHT_PX).round();
    if !(x.is_finite() && y.is_finite()) || width < 1.0 || height < 1.0 {
        return None;
    }

    let left = x.max(f64::from(bounds.x));
    let top = y.max(f64::from(bounds.y));
    let right = (x + width).min(f64::from(bounds.right()));
    let bottom = (y + height).min(f64::from(bounds.bottom()));
    if right <= left || bottom <= top {
        return None;
    }
    Some(TermRect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

/// Area inside a one-cell border.
pub fn inner(area: TermRect) -> TermRect {
    TermRect::new(
        area.x.saturating_add(1),
        area.y.saturating_add(1),
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    )
}

fn content_rows(count: usize) -> u16 {
    let count = u16::try_from(count).unwrap_or(u16::MAX / CARD_STRIDE);
    (count.saturating_mul(CARD_STRIDE)).saturating_sub(CARD_STRIDE - CARD_HEIGHT)
}

/// Largest useful scroll offset for a list of `count` cards in `viewport_rows`.
pub fn max_scroll_px(count: usize, viewport_rows: u16) -> f64 {
    f64::from(content_rows(count).saturating_sub(viewport_rows)) * CELL_HEIGHT_PX
}

/// Splits `area` into the container area and the tray below it.
fn split_sources<A: PaneAdapter>(adapter: &A, area: TermRect) -> (TermRect, TermRect) {
    let rows = adapter.source_rows();
    if rows == 0 || area.height <= rows {
        return (area, TermRect::new(area.x, area.bottom(), area.width, 0));
    }
    let chunks = TermLayout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(rows)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Geometry of every container for the given area and scroll offsets, plus the
/// tray cards that fit on one row. Empty when the area is too narrow to show the
/// containers side by side.
pub fn compute_layout<A: PaneAdapter>(
    adapter: &A,
    model: &ColumnMap,
    area: TermRect,
    scroll: &HashMap<A::Container, f64>,
) -> Layout<A::Container> {
    let (area, tray) = split_sources(adapter, area);
    let containers = adapter.containers();
    let count = u16::try_from(containers.len()).unwrap_or(u16::MAX);
    if count == 0 || area.width < count.saturating_mul(adapter.min_container_width()) {
        return Layout::default();
    }

    let constraints: Vec<Constraint> = (0..containers.len())
        .map(|_| Constraint::Ratio(1, u32::from(count)))
        .collect();
    let chunks = TermLayout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let layouts = containers
        .into_iter()
        .zip(chunks.iter())
        .map(|(container, chunk)| {
            let viewport = inner(*chunk);
            let tasks = adapter.tasks(model, &container);
            let offset = scroll
                .get(&container)
                .copied()
                .unwrap_or_default()
                .clamp(0.0, max_scroll_px(tasks.len(), viewport.height));
            let offset_rows = (offset / CELL_HEIGHT_PX).floor();

            let mut layout = ContainerLayout::new(container, cells_to_px(*chunk))
                .with_viewport(cells_to_px(viewport));
            for (slot, task) in tasks.iter().enumerate() {
                let top_row =
                    f64::from(viewport.y) + slot as f64 * f64::from(CARD_STRIDE) - offset_rows;
                layout = layout.with_item(
                    task.id,
                    Rect::new(
                        f64::from(viewport.x) * CELL_WIDTH_PX,
                        top_row * CELL_HEIGHT_PX,
                        f64::from(viewport.width) * CELL_WIDTH_PX,
                        f64::from(CARD_HEIGHT) * CELL_HEIGHT_PX,
                    ),
                );
            }
            layout
        })
        .collect();

    let tray = inner(tray);
    adapter
        .sources(model)
        .into_iter()
        .zip((0..).map(|slot: u16| slot.saturating_mul(SOURCE_CARD_WIDTH)))
        .take_while(|(_, offset)| {
            tray.height > 0 && offset.saturating_add(SOURCE_CARD_WIDTH) <= tray.width + 1
        })
        .fold(Layout::new(layouts), |layout, (task, offset)| {
            layout.with_source(
                task.id,
                Rect::new(
                    f64::from(tray.x.saturating_add(offset)) * CELL_WIDTH_PX,
                    f64::from(tray.y) * CELL_HEIGHT_PX,
                    f64::from(SOURCE_CARD_WIDTH - 1) * CELL_WIDTH_PX,
                    CELL_HEIGHT_PX,
                ),
            )
        })
}

/// A card is drawn only when it fits entirely inside its viewport.
pub fn is_visible(bounds: Rect, viewport: Rect) -> bool {
    bounds.y >= viewport.y && bounds.bottom() <= viewport.bottom()
}

pub struct Pane<A: PaneAdapter> {
    pub controller: DragController<A>,
    pub layout: Layout<A::Container>,
    pub focused: Option<TaskId>,
    area: TermRect,
    scroll: HashMap<A::Container, f64>,
}

impl<A: PaneAdapter> Pane<A> {
    pub fn new(adapter: A, config: DragConfig) -> Self {
        Self {
            controller: DragController::new(adapter, config),
            layout: Layout::default(),
            focused: None,
            area: TermRect::default(),
            scroll: HashMap::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        self.controller.adapter()
    }

    pub fn area(&self) -> TermRect {
        self.area
    }

    /// Cells of the tray below the containers; zero-height when there is none.
    pub fn source_area(&self) -> TermRect {
        split_sources(self.adapter(), self.area).1
    }

    /// Recomputes the geometry and lets a live drag re-resolve its candidate.
    pub fn relayout(&mut self, area: TermRect, model: &ColumnMap) {
        self.area = area;
        self.layout = compute_layout(self.controller.adapter(), model, area, &self.scroll);
        self.controller.relayout(&self.layout);
    }

    pub fn scroll_offset(&self, container: &A::Container) -> f64 {
        self.scroll.get(container).copied().unwrap_or_default()
    }

    /// Scrolls one container by `delta_px`, clamped to its content.
    pub fn scroll_by(&mut self, container: A::Container, delta_px: f64, model: &ColumnMap) {
        let Some(viewport) = self.layout.container(&container).map(|layout| layout.viewport)
        else {
            return;
        };
        let rows = (viewport.height / CELL_HEIGHT_PX) as u16;
        let max = max_scroll_px(self.adapter().tasks(model, &container).len(), rows);
        let next = (self.scroll_offset(&container) + delta_px).clamp(0.0, max);
        self.scroll.insert(container, next);
    }

    /// One animation frame of edge auto-scroll. Returns whether anything moved.
    pub fn tick_autoscroll(&mut self, model: &ColumnMap) -> bool {
        let Some(request) = self.controller.tick_autoscroll() else {
            return false;
        };
        let before = self.scroll_offset(&request.container);
        self.scroll_by(request.container, request.delta_px, model);
        if self.scroll_offset(&request.container) == before {
            return false;
        }
        let area = self.area;
        self.relayout(area, model);
        true
    }

    /// Scrolls the focused card's container until the card is fully visible.
    pub fn reveal_focused(&mut self, model: &ColumnMap) {
        let Some(task_id) = self.focused else {
            return;
        };
        let Some(container) = self
            .layout
            .containers
            .iter()
            .find(|container| container.items.iter().any(|item| item.task_id == task_id))
        else {
            return;
        };
        let Some(bounds) = self.layout.item_bounds(task_id) else {
            return;
        };
        let (id, viewport) = (container.id, container.viewport);
        let delta = if bounds.y < viewport.y {
            bounds.y - viewport.y
        } else if bounds.bottom() > viewport.bottom() {
            bounds.bottom() - viewport.bottom()
        } else {
            return;
        };
        self.scroll_by(id, delta, model);
        let area = self.area;
        self.relayout(area, model);
    }

    /// What the pointer is over. The dragged card is skipped, and the proxy is never
    /// part of the layout.
    pub fn target_at(&self, point: Point) -> PointerTarget {
        let dragged = self.controller.dragged_task();
        let Some(container) = self.layout.container_at(point) else {
            return self
                .layout
                .sources
                .iter()
                .find(|item| Some(item.task_id) != dragged && item.bounds.contains(point))
                .map_or(PointerTarget::Empty, |item| PointerTarget::Task(item.task_id));
        };
        let hit = container.items.iter().find(|item| {
            Some(item.task_id) != dragged
                && is_visible(item.bounds, container.viewport)
                && item.bounds.contains(point)
        });
        match hit {
            Some(item) if is_delete_control(item.bounds, point) => {
                PointerTarget::Control(item.task_id)
            }
            Some(item) => PointerTarget::Task(item.task_id),
            None => PointerTarget::Empty,
        }
    }

    /// Container currently holding the keyboard focus, or the first one.
    pub fn focused_container(&self, model: &ColumnMap) -> Option<A::Container> {
        self.focused
            .and_then(|task_id| self.adapter().position_of(model, task_id))
            .map(|(container, _)| container)
            .or_else(|| self.adapter().containers().first().copied())
    }

    /// Drops focus from a task that is no longer shown.
    pub fn retain_focus(&mut self, model: &ColumnMap) {
        if let Some(task_id) = self.focused
            && self.adapter().position_of(model, task_id).is_none()
        {
            self.focused = None;
        }
    }

    /// Moves the keyboard focus between cards while no session is active.
    pub fn move_focus(&mut self, step: FocusStep, model: &ColumnMap) {
        let adapter = self.controller.adapter();
        let current = self
            .focused
            .and_then(|task_id| adapter.position_of(model, task_id));
        let Some((container, index)) = current else {
            self.focused = adapter
                .containers()
                .iter()
                .find_map(|container| adapter.tasks(model, container).first().map(|t| t.id));
            return;
        };

        let next = match step {
            FocusStep::Up => index
                .checked_sub(1)
                .and_then(|up| adapter.tasks(model, &container).get(up).map(|t| t.id)),
            FocusStep::Down => adapter
                .tasks(model, &container)
                .get(index + 1)
                .map(|task| task.id),
            FocusStep::Left | FocusStep::Right => {
                let direction = if step == FocusStep::Left {
                    crate::drag::Step::Previous
                } else {
                    crate::drag::Step::Next
                };
                let mut cursor = adapter.adjacent(&container, direction);
                let mut found = None;
                while let Some(candidate) = cursor {
                    let tasks = adapter.tasks(model, &candidate);
                    if let Some(task) = tasks.get(index.min(tasks.len().saturating_sub(1))) {
                        found = Some(task.id);
                        break;
                    }
                    cursor = adapter.adjacent(&candidate, direction);
                }
                found
            }
        };
        if next.is_some() {
            self.focused = next;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusStep {
    Left,
    Right,
    Up,
    Down,
}

/// The last cell of a card's first row is its delete button.
fn is_delete_control(bounds: Rect, point: Point) -> bool {
    point.x >= bounds.right() - CELL_WIDTH_PX && point.y < bounds.y + CELL_HEIGHT_PX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::cell_center;
    use crate::ordering::tests::task;

    fn board_model(todo: usize) -> ColumnMap {
        ColumnMap::from_tasks((0..todo).map(|i| task(&format!("t{i}"), ColumnId::Todo, i as i64)))
    }

    #[test]
    fn test_board_layout_splits_columns_and_stacks_cards() {
        let model = board_model(2);
        let layout = compute_layout(
            &KanbanAdapter,
            &model,
            TermRect::new(0, 1, 90, 20),
            &HashMap::new(),
        );

        assert_eq!(layout.containers.len(), 3);
        let todo = &layout.containers[0];
        assert_eq!(todo.id, ColumnId::Todo);
        assert_eq!(todo.bounds, cells_to_px(TermRect::new(0, 1, 30, 20)));
        assert_eq!(todo.viewport, cells_to_px(TermRect::new(1, 2, 28, 18)));
        assert_eq!(todo.items.len(), 2);
        assert_eq!(
            todo.items[0].bounds,
            cells_to_px(TermRect::new(1, 2, 28, CARD_HEIGHT))
        );
        assert_eq!(
            todo.items[1].bounds,
            cells_to_px(TermRect::new(1, 2 + CARD_STRIDE, 28, CARD_HEIGHT))
        );
    }

    #[test]
    fn test_layout_empty_when_too_narrow() {
        let layout = compute_layout(
            &KanbanAdapter,
            &board_model(1),
            TermRect::new(0, 0, 20, 20),
            &HashMap::new(),
        );
        assert!(layout.containers.is_empty());
    }

    #[test]
    fn test_target_at_resolves_card_and_delete_control() {
        let model = board_model(1);
        let task_id = model.column(ColumnId::Todo)[0].id;
        let mut pane = Pane::new(KanbanAdapter, DragConfig::default());
        pane.relayout(TermRect::new(0, 0, 90, 20), &model);

        assert_eq!(pane.target_at(cell_center(5, 1)), PointerTarget::Task(task_id));
        assert_eq!(pane.target_at(cell_center(28, 1)), PointerTarget::Control(task_id));
        assert_eq!(pane.target_at(cell_center(5, 2)), PointerTarget::Task(task_id));
        assert_eq!(pane.target_at(cell_center(5, 10)), PointerTarget::Empty);
    }

    #[test]
    fn test_timeline_tray_lays_out_undated_tasks_as_drag_sources() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
        let mut dated = task("dentist", ColumnId::Todo, 0);
        dated.due_date = Some(today);
        let model = ColumnMap::from_tasks(vec![
            dated,
            task("someday", ColumnId::Todo, 1),
            task("later", ColumnId::Done, 0),
        ]);
        let someday = model.column(ColumnId::Todo)[1].id;
        let mut pane = Pane::new(TimelineAdapter::new(today, 7), DragConfig::default());
        pane.relayout(TermRect::new(0, 1, 140, 20), &model);

        assert_eq!(pane.source_area(), TermRect::new(0, 18, 140, 3));
        assert_eq!(pane.layout.containers[0].bounds, cells_to_px(TermRect::new(0, 1, 20, 17)));
        assert_eq!(pane.layout.sources.len(), 2);
        assert_eq!(
            pane.layout.item_bounds(someday),
            Some(cells_to_px(TermRect::new(1, 19, SOURCE_CARD_WIDTH - 1, 1)))
        );
        assert_eq!(pane.target_at(cell_center(3, 19)), PointerTarget::Task(someday));
        assert_eq!(pane.target_at(cell_center(60, 19)), PointerTarget::Empty);
    }

    #[test]
    fn test_board_has_no_tray() {
        let mut pane = Pane::new(KanbanAdapter, DragConfig::default());
        pane.relayout(TermRect::new(0, 1, 90, 20), &board_model(1));
        assert_eq!(pane.source_area().height, 0);
        assert!(pane.layout.sources.is_empty());
    }

    #[test]
    fn test_scroll_is_clamped_to_content() {
        let model = board_model(10);
        let mut pane = Pane::new(KanbanAdapter, DragConfig::default());
        pane.relayout(TermRect::new(0, 0, 90, 12), &model);

        pane.scroll_by(ColumnId::Todo, -50.0, &model);
        assert_eq!(pane.scroll_offset(&ColumnId::Todo), 0.0);

        pane.scroll_by(ColumnId::Todo, 10_000.0, &model);
        // 10 cards take 29 rows, the viewport shows 10.
        assert_eq!(pane.scroll_offset(&ColumnId::Todo), 19.0 * CELL_HEIGHT_PX);
    }

    #[test]
    fn test_reveal_focused_scrolls_card_into_view() {
        let model = board_model(10);
        let last = model.column(ColumnId::Todo)[9].id;
        let mut pane = Pane::new(KanbanAdapter, DragConfig::default());
        pane.relayout(TermRect::new(0, 0, 90, 12), &model);
        pane.focused = Some(last);

        pane.reveal_focused(&model);

        let viewport = pane.layout.containers[0].viewport;
        let bounds = pane.layout.item_bounds(last).expect("card laid out");
        assert!(is_visible(bounds, viewport));
    }

    #[test]
    fn test_move_focus_skips_empty_columns() {
        let mut tasks = vec![
            task("a", ColumnId::Todo, 0),
            task("b", ColumnId::Todo, 1),
        ];
        tasks.push(task("c", ColumnId::Done, 0));
        let model = ColumnMap::from_tasks(tasks);
        let mut pane = Pane::new(KanbanAdapter, DragConfig::default());

        pane.move_focus(FocusStep::Down, &model);
        assert_eq!(pane.focused, Some(model.column(ColumnId::Todo)[0].id));

        pane.move_focus(FocusStep::Down, &model);
        assert_eq!(pane.focused, Some(model.column(ColumnId::Todo)[1].id));

        pane.move_focus(FocusStep::Right, &model);
        assert_eq!(pane.focused, Some(model.column(ColumnId::Done)[0].id));

        pane.move_focus(FocusStep::Right, &model);
        assert_eq!(pane.focused, Some(model.column(ColumnId::Done)[0].id));
    }

    #[test]
    fn test_px_to_cells_clips_to_bounds() {
        let bounds = TermRect::new(0, 0, 40, 10);
        let rect = Rect::new(-16.0, 8.0 * CELL_HEIGHT_PX, 10.0 * CELL_WIDTH_PX, 4.0 * CELL_HEIGHT_PX);
        assert_eq!(px_to_cells(rect, bounds), Some(TermRect::new(0, 8, 8, 2)));
        let outside = Rect::new(0.0, 20.0 * CELL_HEIGHT_PX, 80.0, 32.0);
        assert_eq!(px_to_cells(outside, bounds), None);
    }
}
