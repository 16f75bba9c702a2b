//! Per-column ordered task sequences.
//!
//! `ColumnMap` is an immutable snapshot: every mutation returns a new map. Columns
//! a move does not touch keep sharing their storage with the previous snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::types::{ColumnId, RankUpdate, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<ColumnId, Arc<Vec<Task>>>,
}

#[derive(Debug, Clone, Copy, Error, Eq, PartialEq)]
pub enum MoveRejected {
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),
    #[error("task {task_id} is not in column {column}")]
    TaskNotInSource { task_id: TaskId, column: ColumnId },
    #[error("index {index} is outside 0..={max} for column {column}")]
    IndexOutOfRange {
        column: ColumnId,
        index: usize,
        max: usize,
    },
}

/// Result of applying a move to a snapshot.
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub snapshot: ColumnMap,
    /// Columns whose sequence changed, in board order.
    pub touched: Vec<ColumnId>,
    /// Dense ranks for every task in the touched columns.
    pub ranks: Vec<RankUpdate>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            columns: ColumnId::ALL
                .iter()
                .map(|column| (*column, Arc::new(Vec::new())))
                .collect(),
        }
    }
}

impl ColumnMap {
    /// Groups rows by column and sorts each column by `order`. Stored ranks are kept
    /// as-is; ties fall back to id so the result is deterministic.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut grouped: BTreeMap<ColumnId, Vec<Task>> = ColumnId::ALL
            .iter()
            .map(|column| (*column, Vec::new()))
            .collect();
        for task in tasks {
            grouped.entry(task.column_id).or_default().push(task);
        }

        let columns = grouped
            .into_iter()
            .map(|(column, mut tasks)| {
                tasks.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
                (column, Arc::new(tasks))
            })
            .collect();

        Self { columns }
    }

    pub fn column(&self, column: ColumnId) -> &[Task] {
        self.columns
            .get(&column)
            .map(|tasks| tasks.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, column: ColumnId) -> usize {
        self.column(column).len()
    }

    pub fn total(&self) -> usize {
        self.columns.values().map(|tasks| tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.columns.values().flat_map(|tasks| tasks.iter())
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks().find(|task| task.id == task_id)
    }

    /// Current (column, index) of a task.
    pub fn locate(&self, task_id: TaskId) -> Option<(ColumnId, usize)> {
        self.columns.iter().find_map(|(column, tasks)| {
            tasks
                .iter()
                .position(|task| task.id == task_id)
                .map(|index| (*column, index))
        })
    }

    /// Rank a newly created task receives: one past the highest in the column.
    pub fn next_order(&self, column: ColumnId) -> i64 {
        self.column(column)
            .iter()
            .map(|task| task.order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Moves `task_id` from `source` to `target` at `index`.
    ///
    /// Within one column the index is relative to the column with the task removed.
    /// Returns `Ok(None)` when the task already sits at (target, index).
    pub fn with_moved(
        &self,
        task_id: TaskId,
        source: ColumnId,
        target: ColumnId,
        index: usize,
    ) -> Result<Option<AppliedMove>, MoveRejected> {
        let source_tasks = self.column(source);
        let Some(current) = source_tasks.iter().position(|task| task.id == task_id) else {
            return Err(MoveRejected::TaskNotInSource {
                task_id,
                column: source,
            });
        };

        let max = if source == target {
            source_tasks.len() - 1
        } else {
            self.len(target)
        };
        if index > max {
            return Err(MoveRejected::IndexOutOfRange {
                column: target,
                index,
                max,
            });
        }

        if source == target && current == index {
            return Ok(None);
        }

        let mut remaining = source_tasks.to_vec();
        let mut moved = remaining.remove(current);
        moved.column_id = target;

        let mut columns = self.columns.clone();
        let touched = if source == target {
            remaining.insert(index, moved);
            assign_dense_ranks(&mut remaining);
            columns.insert(source, Arc::new(remaining));
            vec![source]
        } else {
            let mut destination = self.column(target).to_vec();
            destination.insert(index, moved);
            assign_dense_ranks(&mut remaining);
            assign_dense_ranks(&mut destination);
            columns.insert(source, Arc::new(remaining));
            columns.insert(target, Arc::new(destination));
            let mut touched = vec![source, target];
            touched.sort();
            touched
        };

        let snapshot = ColumnMap { columns };
        let ranks = touched
            .iter()
            .flat_map(|column| rank_updates(snapshot.column(*column)))
            .collect();

        Ok(Some(AppliedMove {
            snapshot,
            touched,
            ranks,
        }))
    }

    /// Replaces one task in place, keeping its position.
    pub fn with_task_replaced(&self, task: Task) -> Option<ColumnMap> {
        let (column, index) = self.locate(task.id)?;
        if column != task.column_id {
            return None;
        }
        let mut tasks = self.column(column).to_vec();
        tasks[index] = task;
        let mut columns = self.columns.clone();
        columns.insert(column, Arc::new(tasks));
        Some(ColumnMap { columns })
    }

    /// Appends a task at the end of its column.
    pub fn with_task_appended(&self, task: Task) -> ColumnMap {
        let column = task.column_id;
        let mut tasks = self.column(column).to_vec();
        tasks.push(task);
        let mut columns = self.columns.clone();
        columns.insert(column, Arc::new(tasks));
        ColumnMap { columns }
    }

    /// Removes a task and densifies the ranks of its former column.
    pub fn with_task_removed(&self, task_id: TaskId) -> Option<(ColumnMap, Vec<RankUpdate>)> {
        let (column, index) = self.locate(task_id)?;
        let mut tasks = self.column(column).to_vec();
        tasks.remove(index);
        assign_dense_ranks(&mut tasks);
        let ranks = rank_updates(&tasks);
        let mut columns = self.columns.clone();
        columns.insert(column, Arc::new(tasks));
        Some((ColumnMap { columns }, ranks))
    }

    /// True when every column's ranks are exactly 0..N-1 in sequence order.
    #[cfg(test)]
    pub(crate) fn is_dense(&self) -> bool {
        self.columns.values().all(|tasks| {
            tasks
                .iter()
                .enumerate()
                .all(|(idx, task)| task.order == idx as i64)
        })
    }
}

pub fn assign_dense_ranks(tasks: &mut [Task]) {
    for (idx, task) in tasks.iter_mut().enumerate() {
        task.order = idx as i64;
    }
}

pub fn rank_updates(tasks: &[Task]) -> Vec<RankUpdate> {
    tasks
        .iter()
        .map(|task| RankUpdate {
            id: task.id,
            order: task.order,
            column_id: task.column_id,
        })
        .collect()
}
