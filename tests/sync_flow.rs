use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tempfile::TempDir;
use tokio::sync::{Semaphore, mpsc};
use tuirealm::ratatui::layout::Rect;
use uuid::Uuid;

use taskboard::drag::MovePlan;
use taskboard::input::InputEvent;
use taskboard::notification::{Notice, NoticeLevel, notice_channel};
use taskboard::ordering::ColumnMap;
use taskboard::settings::Settings;
use taskboard::store::{ChangeFeed, FeedItem, SqliteTaskStore, TaskStore};
use taskboard::sync::BoardSync;
use taskboard::sync::merge::MergeDecision;
use taskboard::tui::{Action, AppState};
use taskboard::types::{
    ChangeKind, ColumnId, NewTask, OwnerId, RankUpdate, Subtask, Task, TaskId,
};

/// Store wrapper that records rank batches and can hold or fail them.
struct ScriptedStore {
    inner: Arc<SqliteTaskStore>,
    batches: Mutex<Vec<Vec<RankUpdate>>>,
    fail_ranks: AtomicBool,
    hold_ranks: AtomicBool,
    gate: Semaphore,
}

impl ScriptedStore {
    fn new(inner: Arc<SqliteTaskStore>) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            fail_ranks: AtomicBool::new(false),
            hold_ranks: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    fn batches(&self) -> Vec<Vec<RankUpdate>> {
        self.batches.lock().expect("batch log lock").clone()
    }
}

#[async_trait]
impl TaskStore for ScriptedStore {
    async fn fetch_tasks(&self, owner: OwnerId) -> Result<Vec<Task>> {
        self.inner.fetch_tasks(owner).await
    }

    async fn upsert_ranks(&self, owner: OwnerId, ranks: &[RankUpdate]) -> Result<()> {
        self.batches
            .lock()
            .expect("batch log lock")
            .push(ranks.to_vec());
        if self.hold_ranks.load(Ordering::SeqCst) {
            self.gate.acquire().await?.forget();
        }
        if self.fail_ranks.load(Ordering::SeqCst) {
            bail!("connection reset by peer");
        }
        self.inner.upsert_ranks(owner, ranks).await
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        self.inner.insert_task(task).await
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.inner.update_task(task).await
    }

    async fn delete_task(&self, owner: OwnerId, task_id: TaskId) -> Result<()> {
        self.inner.delete_task(owner, task_id).await
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.inner.list_subtasks(task_id).await
    }

    async fn insert_subtask(&self, task_id: TaskId, title: &str) -> Result<Subtask> {
        self.inner.insert_subtask(task_id, title).await
    }

    async fn update_subtask(&self, subtask: &Subtask) -> Result<()> {
        self.inner.update_subtask(subtask).await
    }

    async fn delete_subtask(&self, subtask_id: Uuid) -> Result<()> {
        self.inner.delete_subtask(subtask_id).await
    }

    fn subscribe(&self, owner: OwnerId) -> ChangeFeed {
        self.inner.subscribe(owner)
    }
}

struct Fixture {
    inner: Arc<SqliteTaskStore>,
    store: Arc<ScriptedStore>,
    sync: Arc<BoardSync>,
    notices: mpsc::UnboundedReceiver<Notice>,
    owner: OwnerId,
}

async fn fixture(todo: &[&str]) -> Result<(Fixture, Vec<TaskId>)> {
    let inner = Arc::new(SqliteTaskStore::in_memory().await?);
    let store = Arc::new(ScriptedStore::new(Arc::clone(&inner)));
    let owner = Uuid::new_v4();
    let (notifier, notices) = notice_channel();
    let sync = Arc::new(BoardSync::new(store.clone(), owner, notifier));
    sync.load().await?;

    let mut ids = Vec::new();
    for title in todo {
        let task = sync
            .create_task(NewTask {
                title: title.to_string(),
                ..NewTask::default()
            })
            .await?;
        ids.push(task.id);
    }

    Ok((
        Fixture {
            inner,
            store,
            sync,
            notices,
            owner,
        },
        ids,
    ))
}

fn titles(model: &ColumnMap, column: ColumnId) -> Vec<String> {
    model
        .column(column)
        .iter()
        .map(|task| task.title.clone())
        .collect()
}

fn orders(tasks: &[Task], column: ColumnId) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = tasks
        .iter()
        .filter(|task| task.column_id == column)
        .map(|task| (task.title.clone(), task.order))
        .collect();
    rows.sort_by_key(|(_, order)| *order);
    rows
}

async fn next_task_event(feed: &mut ChangeFeed) -> FeedItem {
    tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("change event should arrive")
        .expect("feed should stay open")
}

#[tokio::test]
async fn cross_column_move_writes_one_batch_for_both_columns() -> Result<()> {
    let (fx, ids) = fixture(&["write", "review", "ship"]).await?;

    let plan = MovePlan::column_move(ids[2], ColumnId::Todo, ColumnId::InProgress, 0);
    fx.sync.move_task(&plan).await?;

    let batches = fx.store.batches();
    assert_eq!(batches.len(), 1);
    let mut touched: Vec<TaskId> = batches[0].iter().map(|rank| rank.id).collect();
    touched.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(touched, expected);

    let stored = fx.inner.fetch_tasks(fx.owner).await?;
    assert_eq!(
        orders(&stored, ColumnId::Todo),
        vec![("write".to_string(), 0), ("review".to_string(), 1)]
    );
    assert_eq!(
        orders(&stored, ColumnId::InProgress),
        vec![("ship".to_string(), 0)]
    );
    Ok(())
}

#[tokio::test]
async fn notification_during_write_is_deferred_until_it_settles() -> Result<()> {
    let (fx, ids) = fixture(&["write", "review"]).await?;
    let mut feed = fx.sync.change_feed();
    fx.store.hold_ranks.store(true, Ordering::SeqCst);

    let plan = MovePlan::column_move(ids[0], ColumnId::Todo, ColumnId::Done, 0);
    let write = fx
        .sync
        .apply_local(&plan)
        .expect("move should apply")
        .expect("move changes the board");
    assert_eq!(titles(&fx.sync.snapshot(), ColumnId::Done), vec!["write"]);

    let sync = Arc::clone(&fx.sync);
    let persist = tokio::spawn(async move { sync.persist(write).await });

    // Another client adds a task while the rank batch is held.
    let outside = Task {
        id: Uuid::new_v4(),
        title: "from phone".to_string(),
        description: None,
        start_date: None,
        due_date: None,
        context: None,
        column_id: ColumnId::Todo,
        order: 1,
        owner: fx.owner,
    };
    fx.inner.insert_task(&outside).await?;
    let item = next_task_event(&mut feed).await;
    assert_eq!(fx.sync.handle_change(item).await, MergeDecision::Defer);
    assert!(fx.sync.snapshot().task(outside.id).is_none());

    fx.store.gate.add_permits(1);
    persist.await??;

    let model = fx.sync.snapshot();
    assert!(model.task(outside.id).is_some());
    assert_eq!(titles(&model, ColumnId::Done), vec!["write"]);
    assert_eq!(fx.sync.writes_in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_write_notifies_and_restores_stored_state() -> Result<()> {
    let (mut fx, ids) = fixture(&["write", "review", "ship"]).await?;
    fx.store.fail_ranks.store(true, Ordering::SeqCst);

    let plan = MovePlan::column_move(ids[0], ColumnId::Todo, ColumnId::InProgress, 0);
    assert!(fx.sync.move_task(&plan).await.is_err());

    let notice = fx.notices.try_recv().expect("failure should be reported");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(
        titles(&fx.sync.snapshot(), ColumnId::Todo),
        vec!["write", "review", "ship"]
    );
    assert!(fx.sync.snapshot().column(ColumnId::InProgress).is_empty());
    Ok(())
}

#[tokio::test]
async fn keyboard_lift_and_move_reaches_the_store() -> Result<()> {
    let (fx, ids) = fixture(&["write", "review"]).await?;
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
    let mut state = AppState::new(&Settings::default(), today);
    let key = |code| InputEvent::Key(KeyEvent::new(code, KeyModifiers::empty()));

    let model = fx.sync.snapshot();
    state.relayout(Rect::new(0, 1, 90, 20), Rect::new(0, 1, 140, 20), &model);
    state.handle_input(key(KeyCode::Down), &model);
    assert!(state.handle_input(key(KeyCode::Char(' ')), &model).is_empty());
    let actions = state.handle_input(key(KeyCode::Right), &model);

    let [Action::Move(plan)] = actions.as_slice() else {
        panic!("expected one move, got {actions:?}");
    };
    assert_eq!(plan.task_id, ids[0]);
    fx.sync.move_task(plan).await?;

    let stored = fx.inner.fetch_tasks(fx.owner).await?;
    assert_eq!(
        orders(&stored, ColumnId::InProgress),
        vec![("write".to_string(), 0)]
    );
    assert_eq!(
        orders(&stored, ColumnId::Todo),
        vec![("review".to_string(), 0)]
    );
    Ok(())
}

#[tokio::test]
async fn poller_sees_writes_from_another_handle() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("board.sqlite");
    let watcher = SqliteTaskStore::open(&path).await?;
    let writer = SqliteTaskStore::open(&path).await?;
    let owner = Uuid::new_v4();
    let mut feed = watcher.subscribe(owner);

    let task = Task {
        id: Uuid::new_v4(),
        title: "added elsewhere".to_string(),
        description: None,
        start_date: None,
        due_date: NaiveDate::from_ymd_opt(2026, 10, 21),
        context: None,
        column_id: ColumnId::Todo,
        order: 0,
        owner,
    };
    writer.insert_task(&task).await?;

    assert_eq!(watcher.poll_external_changes().await?, 1);
    match next_task_event(&mut feed).await {
        FeedItem::Event(event) => {
            assert_eq!(event.kind, ChangeKind::Insert);
            assert_eq!(event.record_id, task.id);
        }
        other => panic!("unexpected feed item {other:?}"),
    }
    assert_eq!(watcher.poll_external_changes().await?, 0);
    Ok(())
}
