//! Terminal front end for the board and the timeline.
//!
//! Input comes from the tui-realm listener, drained once per frame. The async run
//! loop also listens for notices and new snapshots. Moves are applied to the
//! snapshot synchronously so the next key already sees them; store writes run as
//! tasks in a `JoinSet` that is drained before the board exits.

pub mod listener;
pub mod pane;
pub mod render;
pub mod state;

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use crossterm::{
    cursor::Show,
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute,
    style::ResetColor,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tuirealm::terminal::{CrosstermTerminalAdapter, TerminalBridge};

use crate::notification::Notice;
use crate::settings::Settings;
use crate::sync::BoardSync;
use crate::types::{NewTask, TaskPatch};

use listener::InputListener;

pub use state::{Action, AppState, ViewMode};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// How long quitting waits for store writes that are still running.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

static TERMINAL_RESTORED: AtomicBool = AtomicBool::new(false);

/// Runs the interactive board until the user quits, then waits for pending writes.
pub async fn run(
    sync: Arc<BoardSync>,
    notices: mpsc::UnboundedReceiver<Notice>,
    settings: &Settings,
) -> Result<()> {
    let _guard = TerminalGuard;
    let mut terminal = setup_terminal()?;
    let mut writes = JoinSet::new();

    let result = event_loop(&mut terminal, &sync, notices, settings, &mut writes).await;

    let _ = execute!(io::stdout(), DisableMouseCapture, DisableFocusChange);
    let _ = terminal.disable_raw_mode();
    let _ = terminal.leave_alternate_screen();
    let _ = terminal.clear_screen();
    TERMINAL_RESTORED.store(true, Ordering::SeqCst);

    let drained = finish_writes(writes, SHUTDOWN_GRACE).await;
    result.and(drained)
}

async fn event_loop(
    terminal: &mut TerminalBridge<CrosstermTerminalAdapter>,
    sync: &Arc<BoardSync>,
    mut notices: mpsc::UnboundedReceiver<Notice>,
    settings: &Settings,
    writes: &mut JoinSet<()>,
) -> Result<()> {
    let mut input = InputListener::new()?;
    let mut snapshots = sync.subscribe();
    let mut state = AppState::new(settings, Local::now().date_naive());
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut redraw = true;
    while !state.should_quit() {
        if redraw {
            let model = sync.snapshot();
            terminal
                .draw(|frame| render::render(frame, &mut state, &model))
                .context("failed to render frame")?;
            redraw = false;
        }

        tokio::select! {
            Some(notice) = notices.recv() => {
                state.push_notice(notice);
                redraw = true;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                state.on_snapshot(&snapshots.borrow_and_update());
                redraw = true;
            }
            Some(joined) = writes.join_next(), if !writes.is_empty() => {
                if let Err(err) = joined {
                    tracing::warn!(error = %err, "board write task failed");
                }
            }
            _ = frames.tick() => {
                for event in input.drain()? {
                    let model = sync.snapshot();
                    for action in state.handle_input(event, &model) {
                        dispatch(sync, action, writes);
                    }
                    redraw = true;
                }
                if state.tick(&sync.snapshot()) {
                    redraw = true;
                }
            }
        }
    }

    Ok(())
}

/// Waits up to `grace` for the spawned store writes. Writes still running after
/// that are aborted and reported as an error.
pub async fn finish_writes(mut writes: JoinSet<()>, grace: Duration) -> Result<()> {
    if writes.is_empty() {
        return Ok(());
    }
    tracing::info!(pending = writes.len(), "waiting for board writes before exit");

    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = writes.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "board write task failed");
            }
        }
    })
    .await;

    if drained.is_err() {
        let pending = writes.len();
        writes.abort_all();
        tracing::error!(pending, "board writes abandoned at exit");
        bail!("{pending} board change(s) were not saved before exit");
    }
    Ok(())
}

/// Carries out one action. Moves update the snapshot before returning; store writes
/// continue on `writes` and report failures through the notice channel.
pub fn dispatch(sync: &Arc<BoardSync>, action: Action, writes: &mut JoinSet<()>) {
    match action {
        Action::Move(plan) => match sync.apply_local(&plan) {
            Ok(Some(write)) => {
                let sync = Arc::clone(sync);
                writes.spawn(async move {
                    let _ = sync.persist(write).await;
                });
            }
            Ok(None) => {}
            Err(rejected) => {
                tracing::warn!(task_id = %plan.task_id, error = %rejected, "move rejected");
            }
        },
        Action::Create {
            title,
            column,
            due_date,
        } => {
            let sync = Arc::clone(sync);
            writes.spawn(async move {
                let new_task = NewTask {
                    title,
                    column_id: Some(column),
                    due_date,
                    ..NewTask::default()
                };
                if let Err(err) = sync.create_task(new_task).await {
                    tracing::warn!(error = %format!("{err:#}"), "task creation failed");
                }
            });
        }
        Action::Rename { task_id, title } => {
            let sync = Arc::clone(sync);
            writes.spawn(async move {
                let patch = TaskPatch {
                    title: Some(title),
                    ..TaskPatch::default()
                };
                if let Err(err) = sync.update_task(task_id, patch).await {
                    tracing::warn!(task_id = %task_id, error = %format!("{err:#}"), "task rename failed");
                }
            });
        }
        Action::Delete(task_id) => {
            let sync = Arc::clone(sync);
            writes.spawn(async move {
                if let Err(err) = sync.delete_task(task_id).await {
                    tracing::warn!(task_id = %task_id, error = %format!("{err:#}"), "task deletion failed");
                }
            });
        }
        Action::Refresh => {
            let sync = Arc::clone(sync);
            writes.spawn(async move {
                let _ = sync.refetch().await;
            });
        }
    }
}

fn setup_terminal() -> Result<TerminalBridge<CrosstermTerminalAdapter>> {
    TERMINAL_RESTORED.store(false, Ordering::SeqCst);

    let mut terminal =
        TerminalBridge::new_crossterm().context("failed to initialize terminal bridge")?;

    terminal
        .enable_raw_mode()
        .context("failed to enable raw mode")?;
    terminal
        .enter_alternate_screen()
        .context("failed to enter alternate screen")?;
    execute!(io::stdout(), EnableMouseCapture, EnableFocusChange)
        .context("failed to enable mouse capture")?;

    Ok(terminal)
}

/// Puts the terminal back into cooked mode. Safe to call more than once, e.g. from
/// the panic hook and from the guard.
pub fn restore_terminal() {
    if TERMINAL_RESTORED.swap(true, Ordering::SeqCst) {
        return;
    }

    let _ = disable_raw_mode();

    let mut stderr = io::stderr();
    let _ = execute!(
        stderr,
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange,
        Show,
        ResetColor
    );
    let _ = stderr.flush();
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::MovePlan;
    use crate::notification::notice_channel;
    use crate::store::{SqliteTaskStore, TaskStore};
    use crate::types::ColumnId;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_quitting_waits_for_dispatched_moves() -> Result<()> {
        let store = Arc::new(SqliteTaskStore::in_memory().await?);
        let owner = Uuid::new_v4();
        let (notifier, _notices) = notice_channel();
        let sync = Arc::new(BoardSync::new(store.clone(), owner, notifier));
        sync.load().await?;
        let task = sync
            .create_task(NewTask {
                title: "ship".to_string(),
                ..NewTask::default()
            })
            .await?;

        let mut writes = JoinSet::new();
        dispatch(
            &sync,
            Action::Move(MovePlan::column_move(
                task.id,
                ColumnId::Todo,
                ColumnId::Done,
                0,
            )),
            &mut writes,
        );
        assert_eq!(writes.len(), 1);

        finish_writes(writes, SHUTDOWN_GRACE).await?;

        let stored = store.fetch_tasks(owner).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].column_id, ColumnId::Done);
        assert_eq!(sync.writes_in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_past_the_grace_period_are_reported() {
        let mut writes = JoinSet::new();
        writes.spawn(std::future::pending::<()>());

        let err = finish_writes(writes, Duration::from_millis(10))
            .await
            .expect_err("a stuck write should be reported");
        assert!(err.to_string().contains("1 board change(s)"));
    }

    #[tokio::test]
    async fn test_no_pending_writes_finishes_immediately() -> Result<()> {
        finish_writes(JoinSet::new(), Duration::ZERO).await
    }
}
