//! Optimistic reconciliation between the local board and the task store.
//!
//! Every mutation replaces the published snapshot first and writes to the store
//! afterwards. A failed write is reported as a notice and answered with a full
//! refetch; nothing is retried. Change notifications go through `merge::decide`.

pub mod merge;
pub mod realtime;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use tokio::sync::watch;
use uuid::Uuid;

use crate::drag::MovePlan;
use crate::notification::Notifier;
use crate::ordering::{ColumnMap, MoveRejected};
use crate::store::{ChangeFeed, FeedItem, StoreError, TaskStore};
use crate::types::{
    ColumnId, NewTask, OwnerId, RankUpdate, Subtask, Task, TaskId, TaskPatch, normalize_title,
};

pub use merge::{IgnoreReason, MergeContext, MergeDecision, decide};
pub use realtime::spawn_realtime_listener;

/// Store writes owed for a change already visible in the snapshot.
#[must_use = "a pending write must be persisted"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub task_id: TaskId,
    /// Dense ranks of every task in the touched columns.
    pub ranks: Vec<RankUpdate>,
    /// Single-row update, e.g. after a reschedule.
    pub task_update: Option<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Unchanged,
}

#[derive(Debug, Default)]
struct SyncState {
    loaded: bool,
    in_flight: usize,
    refetch_pending: bool,
}

pub struct BoardSync {
    store: Arc<dyn TaskStore>,
    owner: OwnerId,
    notifier: Notifier,
    snapshot: watch::Sender<Arc<ColumnMap>>,
    state: Mutex<SyncState>,
}

impl BoardSync {
    pub fn new(store: Arc<dyn TaskStore>, owner: OwnerId, notifier: Notifier) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ColumnMap::default()));
        Self {
            store,
            owner,
            notifier,
            snapshot,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn snapshot(&self) -> Arc<ColumnMap> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ColumnMap>> {
        self.snapshot.subscribe()
    }

    /// Change feed for this board's owner. Subscribe before `load` so nothing written
    /// in between is missed.
    pub fn change_feed(&self) -> ChangeFeed {
        self.store.subscribe(self.owner)
    }

    pub fn writes_in_flight(&self) -> usize {
        self.lock_state().in_flight
    }

    /// Initial full fetch.
    pub async fn load(&self) -> Result<()> {
        self.refetch().await
    }

    /// Full fetch, replacing the snapshot wholesale.
    pub async fn refetch(&self) -> Result<()> {
        let tasks = match self.store.fetch_tasks(self.owner).await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "board refetch failed");
                self.notifier.error("Could not load the board.");
                return Err(err.context("failed to fetch tasks"));
            }
        };

        let count = tasks.len();
        self.publish(ColumnMap::from_tasks(tasks));
        self.lock_state().loaded = true;
        tracing::debug!(count, "board snapshot replaced from store");
        Ok(())
    }

    /// Applies a plan to the snapshot. `Ok(None)` when it changes nothing.
    pub fn apply_local(&self, plan: &MovePlan) -> Result<Option<PendingWrite>, MoveRejected> {
        let current = self.snapshot();
        if current.task(plan.task_id).is_none() {
            return Err(MoveRejected::UnknownTask(plan.task_id));
        }

        let (mut next, ranks) = match plan.column_move {
            Some(column_move) => match current.with_moved(
                plan.task_id,
                column_move.source,
                column_move.target,
                column_move.index,
            )? {
                Some(applied) => (Some(applied.snapshot), applied.ranks),
                None => (None, Vec::new()),
            },
            None => (None, Vec::new()),
        };

        let mut task_update = None;
        if let Some(day) = plan.reschedule {
            let base = next.as_ref().unwrap_or(&*current);
            if let Some(task) = base.task(plan.task_id)
                && task.scheduled_on() != Some(day)
            {
                let rescheduled = task.rescheduled(day);
                next = base.with_task_replaced(rescheduled.clone());
                task_update = Some(rescheduled);
            }
        }

        let Some(next) = next else {
            return Ok(None);
        };
        self.publish(next);
        self.lock_state().in_flight += 1;
        tracing::debug!(
            task_id = %plan.task_id,
            ranks = ranks.len(),
            rescheduled = task_update.is_some(),
            "move applied locally"
        );
        Ok(Some(PendingWrite {
            task_id: plan.task_id,
            ranks,
            task_update,
        }))
    }

    /// Writes a locally applied move to the store.
    pub async fn persist(&self, write: PendingWrite) -> Result<()> {
        let result = self.write_move(&write).await;
        self.settle(result, "save the new position").await
    }

    async fn write_move(&self, write: &PendingWrite) -> Result<()> {
        self.store.upsert_ranks(self.owner, &write.ranks).await?;
        if let Some(task) = &write.task_update {
            self.store.update_task(task).await?;
        }
        Ok(())
    }

    /// `apply_local` then `persist`. A rejected plan is logged and changes nothing.
    pub async fn move_task(&self, plan: &MovePlan) -> Result<MoveOutcome> {
        match self.apply_local(plan) {
            Ok(Some(write)) => {
                self.persist(write).await?;
                Ok(MoveOutcome::Moved)
            }
            Ok(None) => Ok(MoveOutcome::Unchanged),
            Err(rejected) => {
                tracing::warn!(task_id = %plan.task_id, error = %rejected, "move rejected");
                Err(rejected.into())
            }
        }
    }

    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let title = normalize_title(&new_task.title)
            .ok_or_else(|| anyhow!("task title cannot be empty"))?;
        let current = self.snapshot();
        let column_id = new_task.column_id.unwrap_or(ColumnId::Todo);
        let task = Task {
            id: Uuid::new_v4(),
            title,
            description: new_task.description,
            start_date: new_task.start_date,
            due_date: new_task.due_date,
            context: new_task.context,
            column_id,
            order: current.next_order(column_id),
            owner: self.owner,
        };

        self.publish(current.with_task_appended(task.clone()));
        self.lock_state().in_flight += 1;
        let result = self.store.insert_task(&task).await;
        self.settle(result, "create the task").await?;
        Ok(task)
    }

    pub async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> Result<Task> {
        let current = self.snapshot();
        let mut task = current
            .task(task_id)
            .cloned()
            .ok_or(StoreError::TaskNotFound(task_id))?;
        if patch.is_empty() {
            return Ok(task);
        }
        patch.apply_to(&mut task);
        if task.title.is_empty() {
            return Err(anyhow!("task title cannot be empty"));
        }

        if let Some(next) = current.with_task_replaced(task.clone()) {
            self.publish(next);
        }
        self.lock_state().in_flight += 1;
        let result = self.store.update_task(&task).await;
        self.settle(result, "update the task").await?;
        Ok(task)
    }

    /// Deletes a task and closes the gap it leaves in its column.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let current = self.snapshot();
        let (next, ranks) = current
            .with_task_removed(task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;

        self.publish(next);
        self.lock_state().in_flight += 1;
        let result = async {
            self.store.delete_task(self.owner, task_id).await?;
            self.store.upsert_ranks(self.owner, &ranks).await
        }
        .await;
        self.settle(result, "delete the task").await
    }

    pub async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.store.list_subtasks(task_id).await
    }

    pub async fn add_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask> {
        let title =
            normalize_title(title).ok_or_else(|| anyhow!("subtask title cannot be empty"))?;
        self.store.insert_subtask(task_id, &title).await
    }

    pub async fn rename_subtask(&self, subtask: &Subtask, title: &str) -> Result<Subtask> {
        let title =
            normalize_title(title).ok_or_else(|| anyhow!("subtask title cannot be empty"))?;
        let renamed = Subtask {
            title,
            ..subtask.clone()
        };
        self.store.update_subtask(&renamed).await?;
        Ok(renamed)
    }

    pub async fn toggle_subtask(&self, subtask: &Subtask) -> Result<Subtask> {
        let toggled = Subtask {
            is_completed: !subtask.is_completed,
            ..subtask.clone()
        };
        self.store.update_subtask(&toggled).await?;
        Ok(toggled)
    }

    pub async fn delete_subtask(&self, subtask_id: Uuid) -> Result<()> {
        self.store.delete_subtask(subtask_id).await
    }

    /// Runs one change notification through the merge policy.
    pub async fn handle_change(&self, item: FeedItem) -> MergeDecision {
        let snapshot = self.snapshot();
        let decision = {
            let mut state = self.lock_state();
            let context = MergeContext {
                owner: self.owner,
                loaded: state.loaded,
                writes_in_flight: state.in_flight > 0,
                snapshot: &snapshot,
            };
            let decision = decide(&item, &context);
            if decision == MergeDecision::Defer {
                state.refetch_pending = true;
            }
            decision
        };

        tracing::debug!(?decision, "change notification handled");
        if decision == MergeDecision::Refetch {
            // Failures are already reported by `refetch`.
            let _ = self.refetch().await;
        }
        decision
    }

    /// Closes out one optimistic write. Any failure, or a notification deferred
    /// while writes were running, ends in a refetch once nothing is in flight.
    async fn settle(&self, result: Result<()>, action: &str) -> Result<()> {
        if let Err(err) = &result {
            tracing::warn!(error = %format!("{err:#}"), action, "store write failed");
            self.notifier
                .error(format!("Could not {action}. Reloading the board."));
        }

        let refetch_now = {
            let mut state = self.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
            if result.is_err() {
                state.refetch_pending = true;
            }
            if state.in_flight == 0 && state.refetch_pending {
                state.refetch_pending = false;
                true
            } else {
                false
            }
        };

        if refetch_now {
            let _ = self.refetch().await;
        }
        result.with_context(|| format!("failed to {action}"))
    }

    fn publish(&self, next: ColumnMap) {
        self.snapshot.send_replace(Arc::new(next));
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
