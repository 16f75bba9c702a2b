use std::{
    collections::HashSet,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::error;
use uuid::Uuid;

use crate::{
    drag::{ColumnMove, MovePlan},
    notification::notice_channel,
    ordering::{ColumnMap, MoveRejected},
    store::{SqliteTaskStore, is_not_found, spawn_change_poller},
    sync::{BoardSync, MoveOutcome, spawn_realtime_listener},
    types::{
        ColumnId, NewTask, OwnerId, Subtask, Task, TaskContext, TaskId, TaskPatch,
        normalize_title,
    },
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Open the interactive board (default)
    Board,
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },
    /// Print the board again after every change until interrupted
    Watch,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TaskCommand {
    List(TaskListArgs),
    Show(TaskIdArgs),
    Create(TaskCreateArgs),
    Update(TaskUpdateArgs),
    Delete(TaskIdArgs),
    Move(TaskMoveArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubtaskCommand {
    List(SubtaskListArgs),
    Add(SubtaskAddArgs),
    Rename(SubtaskRenameArgs),
    Toggle(SubtaskIdArgs),
    Delete(SubtaskIdArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TaskListArgs {
    #[arg(long, value_name = "COLUMN")]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskIdArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct TaskCreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "COLUMN")]
    pub column: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub due: Option<NaiveDate>,

    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskUpdateArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: String,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    #[arg(long, value_name = "TEXT", conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "clear_start")]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub clear_start: bool,

    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, value_name = "CONTEXT", conflicts_with = "clear_context")]
    pub context: Option<String>,

    #[arg(long)]
    pub clear_context: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TaskMoveArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: String,

    /// Target column; defaults to the task's current column
    #[arg(long, value_name = "COLUMN")]
    pub column: Option<String>,

    /// Zero-based position in the target column; defaults to the end
    #[arg(long, value_name = "N")]
    pub index: Option<usize>,

    /// Reschedule on the timeline
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskListArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub task: String,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskAddArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub task: String,

    #[arg(long, value_name = "TEXT")]
    pub title: String,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskRenameArgs {
    #[arg(long, value_name = "SUBTASK_ID")]
    pub id: Uuid,

    #[arg(long, value_name = "TEXT")]
    pub title: String,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskIdArgs {
    #[arg(long, value_name = "SUBTASK_ID")]
    pub id: Uuid,
}

/// Where CLI commands read and write.
pub struct CliContext {
    pub store: Arc<SqliteTaskStore>,
    pub owner: OwnerId,
    pub poll_interval_ms: u64,
}

pub async fn run(context: CliContext, command: RootCommand, json_output: bool, quiet: bool) -> i32 {
    match execute(&context, command, json_output, quiet).await {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

struct CommandOutput {
    command: &'static str,
    owner: OwnerId,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

async fn execute(
    context: &CliContext,
    command: RootCommand,
    json_output: bool,
    quiet: bool,
) -> CliResult<CommandOutput> {
    let (notifier, _notices) = notice_channel();
    let sync = Arc::new(BoardSync::new(
        context.store.clone(),
        context.owner,
        notifier,
    ));
    let feed = sync.change_feed();
    sync.load().await.map_err(|err| runtime_error(format_anyhow_error_chain(&err)))?;

    match command {
        RootCommand::Board => Err(usage_error(
            "INTERACTIVE_ONLY",
            "the board runs in the terminal; call it without a subcommand",
        )),
        RootCommand::Task { command } => execute_task_command(context, &sync, command).await,
        RootCommand::Subtask { command } => {
            execute_subtask_command(context, &sync, command).await
        }
        RootCommand::Watch => {
            let listener = spawn_realtime_listener(Arc::clone(&sync), feed);
            let output = watch(context, &sync, json_output, quiet).await;
            listener.abort();
            output
        }
    }
}

async fn execute_task_command(
    context: &CliContext,
    sync: &BoardSync,
    command: TaskCommand,
) -> CliResult<CommandOutput> {
    match command {
        TaskCommand::List(args) => task_list(context, sync, args),
        TaskCommand::Show(args) => task_show(context, sync, args).await,
        TaskCommand::Create(args) => task_create(context, sync, args).await,
        TaskCommand::Update(args) => task_update(context, sync, args).await,
        TaskCommand::Delete(args) => task_delete(context, sync, args).await,
        TaskCommand::Move(args) => task_move(context, sync, args).await,
    }
}

async fn execute_subtask_command(
    context: &CliContext,
    sync: &BoardSync,
    command: SubtaskCommand,
) -> CliResult<CommandOutput> {
    match command {
        SubtaskCommand::List(args) => {
            let task_id = resolve_task_id_selector(&sync.snapshot(), &args.task)?;
            let subtasks = sync.list_subtasks(task_id).await.map_err(classify_error)?;
            Ok(CommandOutput {
                command: "subtask list",
                owner: context.owner,
                data: json!({ "subtasks": subtasks.iter().map(subtask_json).collect::<Vec<_>>() }),
                text: render_subtask_list_text(&subtasks),
            })
        }
        SubtaskCommand::Add(args) => {
            let task_id = resolve_task_id_selector(&sync.snapshot(), &args.task)?;
            if normalize_title(&args.title).is_none() {
                return Err(usage_error("TITLE_REQUIRED", "subtask title cannot be empty"));
            }
            let subtask = sync
                .add_subtask(task_id, &args.title)
                .await
                .map_err(classify_error)?;
            Ok(CommandOutput {
                command: "subtask add",
                owner: context.owner,
                data: json!({ "subtask": subtask_json(&subtask) }),
                text: format!("added subtask {}", subtask.id),
            })
        }
        SubtaskCommand::Rename(args) => {
            if normalize_title(&args.title).is_none() {
                return Err(usage_error("TITLE_REQUIRED", "subtask title cannot be empty"));
            }
            let subtask = lookup_subtask(context, args.id).await?;
            let renamed = sync
                .rename_subtask(&subtask, &args.title)
                .await
                .map_err(classify_error)?;
            Ok(CommandOutput {
                command: "subtask rename",
                owner: context.owner,
                data: json!({ "subtask": subtask_json(&renamed) }),
                text: format!("renamed subtask {}", renamed.id),
            })
        }
        SubtaskCommand::Toggle(args) => {
            let subtask = lookup_subtask(context, args.id).await?;
            let toggled = sync.toggle_subtask(&subtask).await.map_err(classify_error)?;
            let state = if toggled.is_completed { "done" } else { "open" };
            Ok(CommandOutput {
                command: "subtask toggle",
                owner: context.owner,
                data: json!({ "subtask": subtask_json(&toggled) }),
                text: format!("subtask {} is {state}", toggled.id),
            })
        }
        SubtaskCommand::Delete(args) => {
            let subtask = lookup_subtask(context, args.id).await?;
            sync.delete_subtask(subtask.id)
                .await
                .map_err(classify_error)?;
            Ok(CommandOutput {
                command: "subtask delete",
                owner: context.owner,
                data: json!({ "deleted": subtask.id }),
                text: format!("deleted subtask {}", subtask.id),
            })
        }
    }
}

fn task_list(context: &CliContext, sync: &BoardSync, args: TaskListArgs) -> CliResult<CommandOutput> {
    let column = args.column.as_deref().map(parse_column).transpose()?;
    let model = sync.snapshot();
    let tasks: Vec<&Task> = model
        .tasks()
        .filter(|task| column.is_none_or(|column| task.column_id == column))
        .collect();

    Ok(CommandOutput {
        command: "task list",
        owner: context.owner,
        data: json!({ "tasks": tasks.iter().map(|task| task_json(task)).collect::<Vec<_>>() }),
        text: render_task_list_text(&tasks),
    })
}

async fn task_show(
    context: &CliContext,
    sync: &BoardSync,
    args: TaskIdArgs,
) -> CliResult<CommandOutput> {
    let model = sync.snapshot();
    let task_id = resolve_task_id_selector(&model, &args.id)?;
    let task = model
        .task(task_id)
        .ok_or_else(|| not_found_error("TASK_NOT_FOUND", format!("task {task_id} not found")))?;
    let subtasks = sync.list_subtasks(task_id).await.map_err(classify_error)?;

    let mut text = vec![
        format!("{} {}", task.id, task.title),
        format!("column: {} (position {})", task.column_id.label(), task.order),
    ];
    if let Some(description) = &task.description {
        text.push(format!("description: {description}"));
    }
    if let Some(start) = task.start_date {
        text.push(format!("start: {start}"));
    }
    if let Some(due) = task.due_date {
        text.push(format!("due: {due}"));
    }
    if let Some(context) = task.context {
        text.push(format!("context: {}", context.as_str()));
    }
    if !subtasks.is_empty() {
        text.push(render_subtask_list_text(&subtasks));
    }

    let mut data = task_json(task);
    data["subtasks"] = json!(subtasks.iter().map(subtask_json).collect::<Vec<_>>());
    Ok(CommandOutput {
        command: "task show",
        owner: context.owner,
        data: json!({ "task": data }),
        text: text.join("\n"),
    })
}

async fn task_create(
    context: &CliContext,
    sync: &BoardSync,
    args: TaskCreateArgs,
) -> CliResult<CommandOutput> {
    let Some(title) = normalize_title(&args.title) else {
        return Err(usage_error("TITLE_REQUIRED", "task title cannot be empty"));
    };
    let new_task = NewTask {
        title,
        description: args.description,
        start_date: args.start,
        due_date: args.due,
        context: args.context.as_deref().map(parse_context).transpose()?,
        column_id: args.column.as_deref().map(parse_column).transpose()?,
    };

    let task = sync.create_task(new_task).await.map_err(classify_error)?;
    Ok(CommandOutput {
        command: "task create",
        owner: context.owner,
        data: json!({ "task": task_json(&task) }),
        text: format!("created task {} in {}", task.id, task.column_id.label()),
    })
}

async fn task_update(
    context: &CliContext,
    sync: &BoardSync,
    args: TaskUpdateArgs,
) -> CliResult<CommandOutput> {
    let task_id = resolve_task_id_selector(&sync.snapshot(), &args.id)?;
    if let Some(title) = &args.title
        && normalize_title(title).is_none()
    {
        return Err(usage_error("TITLE_REQUIRED", "task title cannot be empty"));
    }

    let patch = TaskPatch {
        title: args.title,
        description: clearable(args.description, args.clear_description),
        start_date: clearable(args.start, args.clear_start),
        due_date: clearable(args.due, args.clear_due),
        context: match (args.context.as_deref(), args.clear_context) {
            (_, true) => Some(None),
            (Some(raw), false) => Some(Some(parse_context(raw)?)),
            (None, false) => None,
        },
    };
    if patch.is_empty() {
        return Err(usage_error("NOTHING_TO_UPDATE", "no field to update was given"));
    }

    let task = sync
        .update_task(task_id, patch)
        .await
        .map_err(classify_error)?;
    Ok(CommandOutput {
        command: "task update",
        owner: context.owner,
        data: json!({ "task": task_json(&task) }),
        text: format!("updated task {}", task.id),
    })
}

async fn task_delete(
    context: &CliContext,
    sync: &BoardSync,
    args: TaskIdArgs,
) -> CliResult<CommandOutput> {
    let task_id = resolve_task_id_selector(&sync.snapshot(), &args.id)?;
    sync.delete_task(task_id).await.map_err(classify_error)?;
    Ok(CommandOutput {
        command: "task delete",
        owner: context.owner,
        data: json!({ "deleted": task_id }),
        text: format!("deleted task {task_id}"),
    })
}

async fn task_move(
    context: &CliContext,
    sync: &BoardSync,
    args: TaskMoveArgs,
) -> CliResult<CommandOutput> {
    let model = sync.snapshot();
    let task_id = resolve_task_id_selector(&model, &args.id)?;
    let (source, _) = model
        .locate(task_id)
        .ok_or_else(|| not_found_error("TASK_NOT_FOUND", format!("task {task_id} not found")))?;
    let target = args.column.as_deref().map(parse_column).transpose()?;

    let column_move = if target.is_some() || args.index.is_some() {
        let target = target.unwrap_or(source);
        let end = if target == source {
            model.len(target).saturating_sub(1)
        } else {
            model.len(target)
        };
        Some(ColumnMove {
            source,
            target,
            index: args.index.unwrap_or(end),
        })
    } else {
        None
    };
    let plan = MovePlan {
        task_id,
        column_move,
        reschedule: args.date,
    };
    if plan.is_empty() {
        return Err(usage_error(
            "MOVE_TARGET_REQUIRED",
            "give --column, --index or --date",
        ));
    }

    let outcome = sync.move_task(&plan).await.map_err(classify_error)?;
    let snapshot = sync.snapshot();
    let task = snapshot
        .task(task_id)
        .ok_or_else(|| not_found_error("TASK_NOT_FOUND", format!("task {task_id} not found")))?;
    let text = match outcome {
        MoveOutcome::Moved => format!(
            "moved task {} to {} position {}",
            task.id,
            task.column_id.label(),
            task.order
        ),
        MoveOutcome::Unchanged => format!("task {} is already there", task.id),
    };

    Ok(CommandOutput {
        command: "task move",
        owner: context.owner,
        data: json!({
            "task": task_json(task),
            "changed": outcome == MoveOutcome::Moved
        }),
        text,
    })
}

async fn watch(
    context: &CliContext,
    sync: &Arc<BoardSync>,
    json_output: bool,
    quiet: bool,
) -> CliResult<CommandOutput> {
    let stop = Arc::new(AtomicBool::new(false));
    let poller = spawn_change_poller(
        Arc::clone(&context.store),
        Arc::clone(&stop),
        context.poll_interval_ms,
    );

    let mut snapshots = sync.subscribe();
    let mut updates = 0usize;
    print_board(&sync.snapshot(), json_output, quiet);
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let model = snapshots.borrow_and_update().clone();
                updates += 1;
                print_board(&model, json_output, quiet);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    stop.store(true, Ordering::SeqCst);
    if let Err(err) = poller.await {
        error!(error = %err, "change poller ended abnormally");
    }

    Ok(CommandOutput {
        command: "watch",
        owner: context.owner,
        data: json!({ "updates": updates }),
        text: format!("stopped after {updates} updates"),
    })
}

fn print_board(model: &ColumnMap, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": "watch",
            "data": { "tasks": model.tasks().map(task_json).collect::<Vec<_>>() }
        });
        println!("{payload}");
    } else if !quiet {
        println!("{}\n", render_board_text(model));
    }
}

fn render_board_text(model: &ColumnMap) -> String {
    ColumnId::ALL
        .iter()
        .map(|column| {
            let tasks = model.column(*column);
            let mut lines = vec![format!("{} ({})", column.label(), tasks.len())];
            lines.extend(tasks.iter().map(|task| {
                let due = task
                    .due_date
                    .map(|due| format!("  due {due}"))
                    .unwrap_or_default();
                format!("  [{}] {}{due}", short_id(task.id), task.title)
            }));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_task_list_text(tasks: &[&Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }

    let headers = ["ID", "Column", "Pos", "Due", "Title"];
    let rows = tasks
        .iter()
        .map(|task| {
            vec![
                short_id(task.id),
                task.column_id.as_str().to_string(),
                task.order.to_string(),
                task.due_date.map(|due| due.to_string()).unwrap_or_default(),
                task.title.replace('\n', " "),
            ]
        })
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn render_subtask_list_text(subtasks: &[Subtask]) -> String {
    if subtasks.is_empty() {
        return "No subtasks.".to_string();
    }
    subtasks
        .iter()
        .map(|subtask| {
            let mark = if subtask.is_completed { "[x]" } else { "[ ]" };
            format!("{mark} {} ({})", subtask.title, subtask.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let format_row = |cells: Vec<&str>| {
        format!(
            "| {} |",
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        )
    };

    let mut lines = vec![border.clone(), format_row(headers.to_vec()), border.clone()];
    lines.extend(
        rows.iter()
            .map(|row| format_row(row.iter().map(String::as_str).collect())),
    );
    lines.push(border);
    lines.join("\n")
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn clearable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear { Some(None) } else { value.map(Some) }
}

fn parse_column(raw: &str) -> CliResult<ColumnId> {
    ColumnId::from_str(raw).map_err(|()| {
        usage_error(
            "INVALID_COLUMN",
            format!("unknown column '{raw}' (expected todo, in_progress or done)"),
        )
    })
}

fn parse_context(raw: &str) -> CliResult<TaskContext> {
    TaskContext::from_str(raw).map_err(|()| {
        usage_error(
            "INVALID_CONTEXT",
            format!("unknown context '{raw}' (expected work, personal, study, health or errands)"),
        )
    })
}

fn resolve_task_id_selector(model: &ColumnMap, selector: &str) -> CliResult<TaskId> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(usage_error("TASK_ID_REQUIRED", "task id cannot be empty"));
    }

    if let Ok(parsed) = Uuid::parse_str(trimmed) {
        return Ok(parsed);
    }

    let needle = trimmed.to_ascii_lowercase();
    let mut seen = HashSet::new();
    let matches: Vec<TaskId> = model
        .tasks()
        .filter(|task| {
            let full = task.id.to_string();
            let simple = task.id.as_simple().to_string();
            full.starts_with(&needle) || simple.starts_with(&needle)
        })
        .map(|task| task.id)
        .filter(|id| seen.insert(*id))
        .collect();

    match matches.as_slice() {
        [single] => Ok(*single),
        [] => Err(not_found_error(
            "TASK_NOT_FOUND",
            format!("task '{selector}' not found"),
        )),
        many => Err(conflict_error(
            "TASK_ID_AMBIGUOUS",
            format!(
                "task id prefix '{selector}' matches {} tasks; use a longer id",
                many.len()
            ),
            Some(json!({
                "matches": many.iter().map(|id| id.to_string()).collect::<Vec<_>>()
            })),
        )),
    }
}

async fn lookup_subtask(context: &CliContext, subtask_id: Uuid) -> CliResult<Subtask> {
    context
        .store
        .get_subtask(subtask_id)
        .await
        .map_err(classify_error)
}

fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "start_date": task.start_date,
        "due_date": task.due_date,
        "context": task.context,
        "column_id": task.column_id,
        "column": task.column_id.label(),
        "order": task.order,
        "user_id": task.owner
    })
}

fn subtask_json(subtask: &Subtask) -> Value {
    json!({
        "id": subtask.id,
        "task_id": subtask.task_id,
        "title": subtask.title,
        "is_completed": subtask.is_completed,
        "order": subtask.order
    })
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn conflict_error(
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn classify_error(err: anyhow::Error) -> CliError {
    if let Some(rejected) = err.downcast_ref::<MoveRejected>() {
        return match rejected {
            MoveRejected::UnknownTask(task_id) => {
                not_found_error("TASK_NOT_FOUND", format!("task {task_id} not found"))
            }
            MoveRejected::IndexOutOfRange { .. } => {
                usage_error("INDEX_OUT_OF_RANGE", rejected.to_string())
            }
            MoveRejected::TaskNotInSource { .. } => {
                conflict_error("STALE_POSITION", rejected.to_string(), None)
            }
        };
    }

    if is_not_found(&err) {
        return not_found_error("NOT_FOUND", err.root_cause().to_string());
    }

    let top_message = err.to_string();
    if let Some(detail) = find_constraint_detail(&err, "FOREIGN KEY constraint failed") {
        let message = if top_message.contains(&detail) {
            top_message
        } else {
            format!("{top_message}: {detail}")
        };
        return conflict_error("FOREIGN_KEY_CONSTRAINT", message, None);
    }

    runtime_error(format_anyhow_error_chain(&err))
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "user_id": output.owner,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{payload}"),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{payload}"),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}

fn format_anyhow_error_chain(err: &anyhow::Error) -> String {
    let mut seen = HashSet::new();
    err.chain()
        .map(|cause| cause.to_string())
        .filter(|text| seen.insert(text.clone()))
        .collect::<Vec<_>>()
        .join(": ")
}

fn find_constraint_detail(err: &anyhow::Error, needle: &str) -> Option<String> {
    err.chain()
        .map(|cause| cause.to_string())
        .filter(|message| message.contains(needle))
        .min_by_key(|message| message.len())
}
