use crate::ordering::ColumnMap;
use crate::types::{ColumnId, TaskId};

use super::{ContainerAdapter, MovePlan, Step};

/// Board view: one container per status column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KanbanAdapter;

impl ContainerAdapter for KanbanAdapter {
    type Container = ColumnId;

    fn position_of(&self, model: &ColumnMap, task_id: TaskId) -> Option<(ColumnId, usize)> {
        model.locate(task_id)
    }

    fn len(&self, model: &ColumnMap, container: &ColumnId) -> usize {
        model.len(*container)
    }

    fn adjacent(&self, container: &ColumnId, step: Step) -> Option<ColumnId> {
        match step {
            Step::Previous => container.left(),
            Step::Next => container.right(),
        }
    }

    fn plan_move(
        &self,
        model: &ColumnMap,
        task_id: TaskId,
        target: &ColumnId,
        index: usize,
    ) -> Option<MovePlan> {
        let (source, current) = model.locate(task_id)?;
        if source == *target && current == index {
            return None;
        }
        Some(MovePlan::column_move(task_id, source, *target, index))
    }

    fn describe(&self, container: &ColumnId) -> String {
        container.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::ordering::tests::task;

    #[test]
    fn test_plan_move_skips_current_position() {
        let model = ColumnMap::from_tasks(vec![
            task("a", ColumnId::Todo, 0),
            task("b", ColumnId::Todo, 1),
        ]);
        let b = model.column(ColumnId::Todo)[1].id;

        assert_eq!(KanbanAdapter.plan_move(&model, b, &ColumnId::Todo, 1), None);
        assert_eq!(
            KanbanAdapter.plan_move(&model, b, &ColumnId::Done, 0),
            Some(MovePlan::column_move(b, ColumnId::Todo, ColumnId::Done, 0))
        );
        assert_eq!(
            KanbanAdapter.plan_move(&model, Uuid::new_v4(), &ColumnId::Done, 0),
            None
        );
    }

    #[test]
    fn test_adjacent_follows_board_order() {
        assert_eq!(
            KanbanAdapter.adjacent(&ColumnId::Todo, Step::Next),
            Some(ColumnId::InProgress)
        );
        assert_eq!(KanbanAdapter.adjacent(&ColumnId::Todo, Step::Previous), None);
        assert_eq!(KanbanAdapter.describe(&ColumnId::Done), "Concluído");
    }
}
