//! Timeline view: one container per day cell.
//!
//! A cell shows the tasks scheduled on that day (due date, else start date) in
//! board order. Dropping on another day reschedules the task. The position inside
//! the cell maps back to the task's own column: the task goes before the sibling it
//! was dropped on, or after the one above it, when that sibling shares its column.
//! Column membership never changes from the timeline.

use chrono::{Days, NaiveDate};

use crate::ordering::ColumnMap;
use crate::types::{Task, TaskId};

use super::{ColumnMove, ContainerAdapter, MovePlan, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineAdapter {
    pub first_day: NaiveDate,
    pub days: u32,
}

impl TimelineAdapter {
    pub fn new(first_day: NaiveDate, days: u32) -> Self {
        Self { first_day, days }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day
            .checked_add_days(Days::new(u64::from(self.days.saturating_sub(1))))
            .unwrap_or(self.first_day)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.days > 0 && day >= self.first_day && day <= self.last_day()
    }

    /// Day cells in display order.
    pub fn cells(&self) -> Vec<NaiveDate> {
        self.first_day
            .iter_days()
            .take(self.days as usize)
            .collect()
    }

    pub fn cell_tasks<'a>(&self, model: &'a ColumnMap, day: NaiveDate) -> Vec<&'a Task> {
        model
            .tasks()
            .filter(|task| task.scheduled_on() == Some(day))
            .collect()
    }

    /// Tasks without a date or scheduled outside the visible range.
    pub fn unscheduled<'a>(&self, model: &'a ColumnMap) -> Vec<&'a Task> {
        model
            .tasks()
            .filter(|task| !task.scheduled_on().is_some_and(|day| self.contains(day)))
            .collect()
    }

    /// Column index for `task` implied by dropping it at `index` among `siblings`.
    fn column_index_for(
        &self,
        model: &ColumnMap,
        task: &Task,
        siblings: &[&Task],
        index: usize,
    ) -> Option<usize> {
        let column: Vec<TaskId> = model
            .column(task.column_id)
            .iter()
            .filter(|other| other.id != task.id)
            .map(|other| other.id)
            .collect();
        let position = |sibling: &Task| column.iter().position(|id| *id == sibling.id);

        if let Some(below) = siblings.get(index)
            && below.column_id == task.column_id
        {
            return position(*below);
        }
        index
            .checked_sub(1)
            .and_then(|above| siblings.get(above))
            .filter(|above| above.column_id == task.column_id)
            .and_then(|above| position(*above))
            .map(|position| position + 1)
    }
}

impl ContainerAdapter for TimelineAdapter {
    type Container = NaiveDate;

    fn position_of(&self, model: &ColumnMap, task_id: TaskId) -> Option<(NaiveDate, usize)> {
        let day = model.task(task_id)?.scheduled_on()?;
        if !self.contains(day) {
            return None;
        }
        let index = self
            .cell_tasks(model, day)
            .iter()
            .position(|task| task.id == task_id)?;
        Some((day, index))
    }

    fn len(&self, model: &ColumnMap, container: &NaiveDate) -> usize {
        self.cell_tasks(model, *container).len()
    }

    fn adjacent(&self, container: &NaiveDate, step: Step) -> Option<NaiveDate> {
        let next = match step {
            Step::Previous => container.pred_opt(),
            Step::Next => container.succ_opt(),
        }?;
        self.contains(next).then_some(next)
    }

    fn plan_move(
        &self,
        model: &ColumnMap,
        task_id: TaskId,
        target: &NaiveDate,
        index: usize,
    ) -> Option<MovePlan> {
        let task = model.task(task_id)?;
        let (column, current) = model.locate(task_id)?;

        let reschedule = (task.scheduled_on() != Some(*target)).then_some(*target);
        let siblings: Vec<&Task> = self
            .cell_tasks(model, *target)
            .into_iter()
            .filter(|sibling| sibling.id != task_id)
            .collect();
        let column_move = self
            .column_index_for(model, task, &siblings, index)
            .filter(|new_index| *new_index != current)
            .map(|new_index| ColumnMove {
                source: column,
                target: column,
                index: new_index,
            });

        let plan = MovePlan {
            task_id,
            column_move,
            reschedule,
        };
        (!plan.is_empty()).then_some(plan)
    }

    fn describe(&self, container: &NaiveDate) -> String {
        container.format("%a %d %b").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::tests::task;
    use crate::types::ColumnId;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, n).expect("valid date")
    }

    fn dated(title: &str, column: ColumnId, order: i64, due: u32) -> Task {
        Task {
            due_date: Some(day(due)),
            ..task(title, column, order)
        }
    }

    fn adapter() -> TimelineAdapter {
        TimelineAdapter::new(day(4), 7)
    }

    #[test]
    fn test_cells_cover_the_range() {
        let timeline = adapter();
        assert_eq!(timeline.cells().len(), 7);
        assert_eq!(timeline.last_day(), day(10));
        assert!(timeline.contains(day(10)));
        assert!(!timeline.contains(day(11)));
        assert_eq!(timeline.adjacent(&day(10), Step::Next), None);
        assert_eq!(timeline.adjacent(&day(4), Step::Next), Some(day(5)));
    }

    #[test]
    fn test_cell_tasks_follow_board_order() {
        let model = ColumnMap::from_tasks(vec![
            dated("done", ColumnId::Done, 0, 5),
            dated("later", ColumnId::Todo, 1, 5),
            dated("first", ColumnId::Todo, 0, 5),
            dated("other day", ColumnId::Todo, 2, 6),
        ]);
        let titles: Vec<&str> = adapter()
            .cell_tasks(&model, day(5))
            .iter()
            .map(|task| task.title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "later", "done"]);
    }

    #[test]
    fn test_drop_on_other_day_reschedules_and_anchors_in_column() {
        let model = ColumnMap::from_tasks(vec![
            dated("a", ColumnId::Todo, 0, 5),
            dated("b", ColumnId::Todo, 1, 6),
            dated("c", ColumnId::Todo, 2, 6),
        ]);
        let a = model.column(ColumnId::Todo)[0].id;

        // Dropped between b and c on day 6.
        let plan = adapter()
            .plan_move(&model, a, &day(6), 1)
            .expect("drop on another day plans a move");
        assert_eq!(plan.reschedule, Some(day(6)));
        assert_eq!(
            plan.column_move,
            Some(ColumnMove {
                source: ColumnId::Todo,
                target: ColumnId::Todo,
                index: 1
            })
        );
    }

    #[test]
    fn test_drop_on_empty_day_only_reschedules() {
        let model = ColumnMap::from_tasks(vec![dated("a", ColumnId::Todo, 0, 5)]);
        let a = model.column(ColumnId::Todo)[0].id;

        let plan = adapter()
            .plan_move(&model, a, &day(8), 0)
            .expect("drop on another day plans a move");
        assert_eq!(plan.reschedule, Some(day(8)));
        assert_eq!(plan.column_move, None);
    }

    #[test]
    fn test_reorder_within_cell_across_columns_is_refused() {
        let model = ColumnMap::from_tasks(vec![
            dated("todo", ColumnId::Todo, 0, 5),
            dated("done", ColumnId::Done, 0, 5),
        ]);
        let done = model.column(ColumnId::Done)[0].id;

        assert_eq!(adapter().plan_move(&model, done, &day(5), 0), None);
        assert_eq!(adapter().position_of(&model, done), Some((day(5), 1)));
    }

    #[test]
    fn test_reorder_within_cell_same_column() {
        let model = ColumnMap::from_tasks(vec![
            dated("a", ColumnId::Todo, 0, 5),
            dated("b", ColumnId::Todo, 1, 5),
        ]);
        let b = model.column(ColumnId::Todo)[1].id;

        let plan = adapter()
            .plan_move(&model, b, &day(5), 0)
            .expect("reorder in cell");
        assert_eq!(plan.reschedule, None);
        assert_eq!(plan.column_move.map(|m| m.index), Some(0));
    }

    #[test]
    fn test_unscheduled_tasks_have_no_position() {
        let model = ColumnMap::from_tasks(vec![
            task("undated", ColumnId::Todo, 0),
            dated("far", ColumnId::Todo, 1, 30),
        ]);
        let timeline = adapter();
        assert_eq!(timeline.unscheduled(&model).len(), 2);
        for task in model.tasks() {
            assert_eq!(timeline.position_of(&model, task.id), None);
        }
    }
}
