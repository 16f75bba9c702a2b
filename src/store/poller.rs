//! Detection of writes made through other handles on the same database file.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;

use super::SqliteTaskStore;
use crate::types::{ChangeEvent, ChangeKind, ChangeTable, Task, TaskId};

/// Spawn a background task that diffs the tasks table every `poll_interval_ms`
/// and publishes what changed outside this store.
pub fn spawn_change_poller(
    store: Arc<SqliteTaskStore>,
    stop: Arc<AtomicBool>,
    poll_interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !stop.load(Ordering::Relaxed) {
            match store.poll_external_changes().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "external task changes detected"),
                Err(err) => tracing::warn!(error = %err, "change poll failed"),
            }
            interruptible_sleep(Duration::from_millis(poll_interval_ms), &stop).await;
        }
    })
}

impl SqliteTaskStore {
    /// One poll cycle. Returns the number of events published.
    pub async fn poll_external_changes(&self) -> Result<usize> {
        let mut known = self.known.lock().await;
        let current = self.all_task_rows().await?;
        let events = diff_rows(&known, &current);
        if events.is_empty() {
            return Ok(0);
        }

        *known = current.into_iter().map(|task| (task.id, task)).collect();
        let count = events.len();
        for event in events {
            self.publish(event);
        }
        Ok(count)
    }
}

/// Events turning `known` into `current`: inserts and updates in `current` order,
/// then deletes.
pub fn diff_rows(known: &HashMap<TaskId, Task>, current: &[Task]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for task in current {
        let kind = match known.get(&task.id) {
            None => ChangeKind::Insert,
            Some(previous) if previous != task => ChangeKind::Update,
            Some(_) => continue,
        };
        events.push(ChangeEvent {
            kind,
            table: ChangeTable::Tasks,
            owner: task.owner,
            record_id: task.id,
            task: Some(task.clone()),
        });
    }

    let mut removed: Vec<&Task> = known
        .values()
        .filter(|task| !current.iter().any(|row| row.id == task.id))
        .collect();
    removed.sort_by_key(|task| task.id);
    events.extend(removed.into_iter().map(|task| ChangeEvent {
        kind: ChangeKind::Delete,
        table: ChangeTable::Tasks,
        owner: task.owner,
        record_id: task.id,
        task: None,
    }));
    events
}

async fn interruptible_sleep(duration: Duration, stop: &AtomicBool) {
    let chunk = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && !stop.load(Ordering::Relaxed) {
        let sleep_duration = remaining.min(chunk);
        tokio::time::sleep(sleep_duration).await;
        remaining = remaining.saturating_sub(sleep_duration);
    }
}
