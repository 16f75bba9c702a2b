use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use super::{ChangeFeed, StoreError, TaskStore};
use crate::types::{
    ChangeEvent, ChangeKind, ChangeTable, ColumnId, OwnerId, RankUpdate, Subtask, Task,
    TaskContext, TaskId,
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        start_date TEXT,
        due_date TEXT,
        context TEXT,
        column_id TEXT NOT NULL,
        "order" INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_tasks_user_column
        ON tasks (user_id, column_id, "order")"#,
    r#"CREATE TABLE IF NOT EXISTS subtasks (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        is_completed INTEGER NOT NULL DEFAULT 0,
        "order" INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks (task_id, "order")"#,
];

const TASK_COLUMNS: &str = r#"id, user_id, title, description, start_date, due_date, context, column_id, "order""#;

/// SQLite-backed store.
///
/// Local writes publish change events directly. Writes made through other handles
/// (another process on the same file) are picked up by the change poller, which
/// diffs the table against `known`. Every local write holds the `known` lock until
/// its rows are recorded, so the poller never reports them a second time.
pub struct SqliteTaskStore {
    pool: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
    pub(super) known: Mutex<HashMap<TaskId, Task>>,
}

impl SqliteTaskStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create parent directories for {}",
                    path_ref.display()
                )
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path_ref)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite db at {}", path_ref.display()))?;

        Self::with_pool(pool).await
    }

    /// Private database living as long as the store. Used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("invalid in-memory sqlite url")?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite db")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("failed to create sqlite schema")?;
        }

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            pool,
            changes,
            known: Mutex::new(HashMap::new()),
        };
        let rows = store.all_task_rows().await?;
        *store.known.lock().await = rows.into_iter().map(|task| (task.id, task)).collect();
        Ok(store)
    }

    pub async fn get_task(&self, owner: OwnerId, task_id: TaskId) -> Result<Task> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND user_id = ?");
        let row = sqlx::query(&sql)
            .bind(task_id.to_string())
            .bind(owner.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load task {task_id}"))?;
        match row {
            Some(row) => map_task_row(&row),
            None => Err(StoreError::TaskNotFound(task_id).into()),
        }
    }

    pub async fn get_subtask(&self, subtask_id: Uuid) -> Result<Subtask> {
        let row = sqlx::query(
            r#"SELECT id, task_id, title, is_completed, "order" FROM subtasks WHERE id = ?"#,
        )
        .bind(subtask_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load subtask {subtask_id}"))?;
        match row {
            Some(row) => map_subtask_row(&row),
            None => Err(StoreError::SubtaskNotFound(subtask_id).into()),
        }
    }

    /// Task rows of every owner.
    pub(super) async fn all_task_rows(&self) -> Result<Vec<Task>> {
        let sql = format!(r#"SELECT {TASK_COLUMNS} FROM tasks ORDER BY column_id, "order""#);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to load tasks")?;
        rows.iter().map(map_task_row).collect()
    }

    pub(super) fn publish(&self, event: ChangeEvent) {
        tracing::trace!(
            kind = event.kind.as_str(),
            record_id = %event.record_id,
            "store change published"
        );
        // No subscribers is fine.
        let _ = self.changes.send(event);
    }

    fn publish_task(&self, kind: ChangeKind, task: &Task) {
        self.publish(ChangeEvent {
            kind,
            table: ChangeTable::Tasks,
            owner: task.owner,
            record_id: task.id,
            task: (kind != ChangeKind::Delete).then(|| task.clone()),
        });
    }

    async fn publish_subtask(&self, kind: ChangeKind, subtask_id: Uuid, task_id: TaskId) {
        let owner: Option<String> = sqlx::query_scalar("SELECT user_id FROM tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten();
        let Some(owner) = owner.and_then(|value| Uuid::parse_str(&value).ok()) else {
            return;
        };
        self.publish(ChangeEvent {
            kind,
            table: ChangeTable::Subtasks,
            owner,
            record_id: subtask_id,
            task: None,
        });
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn fetch_tasks(&self, owner: OwnerId) -> Result<Vec<Task>> {
        let sql = format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? ORDER BY column_id, "order""#
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await
            .context("failed to load tasks")?;
        rows.iter().map(map_task_row).collect()
    }

    async fn upsert_ranks(&self, owner: OwnerId, ranks: &[RankUpdate]) -> Result<()> {
        if ranks.is_empty() {
            return Ok(());
        }

        let mut known = self.known.lock().await;
        let now = now_iso();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin rank upsert")?;
        for rank in ranks {
            let result = sqlx::query(
                r#"UPDATE tasks SET "order" = ?, column_id = ?, updated_at = ?
                   WHERE id = ? AND user_id = ?"#,
            )
            .bind(rank.order)
            .bind(rank.column_id.as_str())
            .bind(&now)
            .bind(rank.id.to_string())
            .bind(owner.to_string())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write rank for task {}", rank.id))?;
            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the ranks written so far.
                return Err(anyhow::Error::new(StoreError::TaskNotFound(rank.id))
                    .context("rank upsert aborted"));
            }
        }
        tx.commit().await.context("failed to commit rank upsert")?;

        let updated = self.fetch_tasks(owner).await?;
        for task in updated
            .into_iter()
            .filter(|task| ranks.iter().any(|rank| rank.id == task.id))
        {
            known.insert(task.id, task.clone());
            self.publish_task(ChangeKind::Update, &task);
        }
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        if task.title.trim().is_empty() {
            bail!("task title cannot be empty");
        }

        let mut known = self.known.lock().await;
        sqlx::query(
            r#"INSERT INTO tasks (
                id, user_id, title, description, start_date, due_date, context, column_id,
                "order", updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.owner.to_string())
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.start_date.map(|date| date.to_string()))
        .bind(task.due_date.map(|date| date.to_string()))
        .bind(task.context.map(TaskContext::as_str))
        .bind(task.column_id.as_str())
        .bind(task.order)
        .bind(now_iso())
        .execute(&self.pool)
        .await
        .context("failed to insert task")?;

        known.insert(task.id, task.clone());
        self.publish_task(ChangeKind::Insert, task);
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        if task.title.trim().is_empty() {
            bail!("task title cannot be empty");
        }

        let mut known = self.known.lock().await;
        let result = sqlx::query(
            r#"UPDATE tasks
               SET title = ?, description = ?, start_date = ?, due_date = ?, context = ?,
                   updated_at = ?
               WHERE id = ? AND user_id = ?"#,
        )
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.start_date.map(|date| date.to_string()))
        .bind(task.due_date.map(|date| date.to_string()))
        .bind(task.context.map(TaskContext::as_str))
        .bind(now_iso())
        .bind(task.id.to_string())
        .bind(task.owner.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update task {}", task.id))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(task.id).into());
        }

        let stored = self.get_task(task.owner, task.id).await?;
        known.insert(stored.id, stored.clone());
        self.publish_task(ChangeKind::Update, &stored);
        Ok(())
    }

    async fn delete_task(&self, owner: OwnerId, task_id: TaskId) -> Result<()> {
        let mut known = self.known.lock().await;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id.to_string())
            .bind(owner.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete task {task_id}"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(task_id).into());
        }

        known.remove(&task_id);
        self.publish(ChangeEvent {
            kind: ChangeKind::Delete,
            table: ChangeTable::Tasks,
            owner,
            record_id: task_id,
            task: None,
        });
        Ok(())
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        let rows = sqlx::query(
            r#"SELECT id, task_id, title, is_completed, "order"
               FROM subtasks WHERE task_id = ? ORDER BY "order" ASC"#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("failed to load subtasks")?;
        rows.iter().map(map_subtask_row).collect()
    }

    async fn insert_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask> {
        let title = title.trim();
        if title.is_empty() {
            bail!("subtask title cannot be empty");
        }

        let parent: Option<String> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up parent task")?;
        if parent.is_none() {
            return Err(StoreError::TaskNotFound(task_id).into());
        }

        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO subtasks (id, task_id, title, is_completed, "order")
               VALUES (?, ?, ?, 0, (SELECT COALESCE(MAX("order") + 1, 0) FROM subtasks WHERE task_id = ?))"#,
        )
        .bind(id.to_string())
        .bind(task_id.to_string())
        .bind(title)
        .bind(task_id.to_string())
        .execute(&self.pool)
        .await
        .context("failed to insert subtask")?;

        let subtask = self.get_subtask(id).await?;
        self.publish_subtask(ChangeKind::Insert, id, task_id).await;
        Ok(subtask)
    }

    async fn update_subtask(&self, subtask: &Subtask) -> Result<()> {
        if subtask.title.trim().is_empty() {
            bail!("subtask title cannot be empty");
        }

        let result = sqlx::query(
            r#"UPDATE subtasks SET title = ?, is_completed = ?, "order" = ? WHERE id = ?"#,
        )
        .bind(subtask.title.trim())
        .bind(subtask.is_completed)
        .bind(subtask.order)
        .bind(subtask.id.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update subtask {}", subtask.id))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::SubtaskNotFound(subtask.id).into());
        }

        self.publish_subtask(ChangeKind::Update, subtask.id, subtask.task_id)
            .await;
        Ok(())
    }

    async fn delete_subtask(&self, subtask_id: Uuid) -> Result<()> {
        let subtask = self.get_subtask(subtask_id).await?;
        sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(subtask_id.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete subtask {subtask_id}"))?;

        self.publish_subtask(ChangeKind::Delete, subtask_id, subtask.task_id)
            .await;
        Ok(())
    }

    fn subscribe(&self, owner: OwnerId) -> ChangeFeed {
        ChangeFeed::new(owner, self.changes.subscribe())
    }
}

fn map_task_row(row: &SqliteRow) -> Result<Task> {
    let column: String = row.try_get("column_id")?;
    let context: Option<String> = row.try_get("context")?;
    Ok(Task {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        start_date: parse_date(row.try_get("start_date")?)?,
        due_date: parse_date(row.try_get("due_date")?)?,
        context: context
            .map(|value| {
                TaskContext::from_str(&value).map_err(|_| anyhow!("unknown task context {value}"))
            })
            .transpose()?,
        column_id: ColumnId::from_str(&column).map_err(|_| anyhow!("unknown column {column}"))?,
        order: row.try_get("order")?,
        owner: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
    })
}

fn map_subtask_row(row: &SqliteRow) -> Result<Subtask> {
    Ok(Subtask {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        task_id: parse_uuid(&row.try_get::<String, _>("task_id")?)?,
        title: row.try_get("title")?,
        is_completed: row.try_get("is_completed")?,
        order: row.try_get("order")?,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("invalid uuid {value}"))
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .with_context(|| format!("invalid date {raw}"))
        })
        .transpose()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}
