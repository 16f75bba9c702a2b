//! Task store interface and its change feed.

pub mod poller;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::types::{ChangeEvent, OwnerId, RankUpdate, Subtask, Task, TaskId};

pub use poller::spawn_change_poller;
pub use sqlite::SqliteTaskStore;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("subtask {0} not found")]
    SubtaskNotFound(Uuid),
}

/// Persistence for one user's board.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task of `owner`, in no particular order.
    async fn fetch_tasks(&self, owner: OwnerId) -> Result<Vec<Task>>;

    /// Writes `order` and `column_id` for each entry in one transaction. An unknown
    /// id fails the whole batch.
    async fn upsert_ranks(&self, owner: OwnerId, ranks: &[RankUpdate]) -> Result<()>;

    async fn insert_task(&self, task: &Task) -> Result<()>;

    /// Updates the editable fields (title, description, dates, context) of one row.
    async fn update_task(&self, task: &Task) -> Result<()>;

    async fn delete_task(&self, owner: OwnerId, task_id: TaskId) -> Result<()>;

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>>;

    /// Appends a subtask after the task's last one.
    async fn insert_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask>;

    async fn update_subtask(&self, subtask: &Subtask) -> Result<()>;

    async fn delete_subtask(&self, subtask_id: Uuid) -> Result<()>;

    /// Row-level changes for `owner`, starting now.
    fn subscribe(&self, owner: OwnerId) -> ChangeFeed;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    Event(ChangeEvent),
    /// The receiver fell behind and this many events were dropped.
    Lagged(u64),
}

/// Receiving half of a store's change stream, scoped to one owner.
pub struct ChangeFeed {
    owner: OwnerId,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(owner: OwnerId, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { owner, receiver }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Next item for this owner; `None` once the store is gone.
    pub async fn next(&mut self) -> Option<FeedItem> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.owner == self.owner => return Some(FeedItem::Event(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(FeedItem::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StoreError>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeKind, ChangeTable};

    fn event(owner: OwnerId) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Delete,
            table: ChangeTable::Tasks,
            owner,
            record_id: Uuid::new_v4(),
            task: None,
        }
    }

    #[tokio::test]
    async fn test_feed_skips_other_owners_and_reports_lag() {
        let owner = Uuid::new_v4();
        let (sender, receiver) = broadcast::channel(2);
        let mut feed = ChangeFeed::new(owner, receiver);

        let mine = event(owner);
        sender.send(event(Uuid::new_v4())).expect("receiver alive");
        sender.send(mine.clone()).expect("receiver alive");
        assert_eq!(feed.next().await, Some(FeedItem::Event(mine)));

        for _ in 0..3 {
            sender.send(event(owner)).expect("receiver alive");
        }
        assert_eq!(feed.next().await, Some(FeedItem::Lagged(1)));

        drop(sender);
        assert!(matches!(feed.next().await, Some(FeedItem::Event(_))));
        assert!(matches!(feed.next().await, Some(FeedItem::Event(_))));
        assert_eq!(feed.next().await, None);
    }

    #[test]
    fn test_not_found_is_detected_through_anyhow() {
        let err: anyhow::Error = StoreError::TaskNotFound(Uuid::nil()).into();
        assert!(is_not_found(&err.context("failed to update task")));
        assert!(!is_not_found(&anyhow::anyhow!("disk full")));
    }
}
