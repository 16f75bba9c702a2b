use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type OwnerId = Uuid;

/// Status columns of the board, in display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum ColumnId {
    Todo,
    InProgress,
    Done,
}

impl ColumnId {
    pub const ALL: [ColumnId; 3] = [ColumnId::Todo, ColumnId::InProgress, ColumnId::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnId::Todo => "todo",
            ColumnId::InProgress => "in_progress",
            ColumnId::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnId::Todo => "A Fazer",
            ColumnId::InProgress => "Em Progresso",
            ColumnId::Done => "Concluído",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ColumnId::Todo => 0,
            ColumnId::InProgress => 1,
            ColumnId::Done => 2,
        }
    }

    pub fn left(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn right(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "todo" | "to_do" | "a_fazer" => Ok(ColumnId::Todo),
            "in_progress" | "doing" | "em_progresso" => Ok(ColumnId::InProgress),
            "done" | "concluído" | "concluido" => Ok(ColumnId::Done),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskContext {
    Work,
    Personal,
    Study,
    Health,
    Errands,
}

impl TaskContext {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskContext::Work => "work",
            TaskContext::Personal => "personal",
            TaskContext::Study => "study",
            TaskContext::Health => "health",
            TaskContext::Errands => "errands",
        }
    }
}

impl FromStr for TaskContext {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(TaskContext::Work),
            "personal" => Ok(TaskContext::Personal),
            "study" => Ok(TaskContext::Study),
            "health" => Ok(TaskContext::Health),
            "errands" => Ok(TaskContext::Errands),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub context: Option<TaskContext>,
    pub column_id: ColumnId,
    pub order: i64,
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
}

impl Task {
    /// Date used to place the task on the timeline.
    pub fn scheduled_on(&self) -> Option<NaiveDate> {
        self.due_date.or(self.start_date)
    }

    /// Copy of the task moved to `day` on the timeline. Both dates shift by the same
    /// number of days, so the due date (or the start date when there is none) lands
    /// on `day` and the span between them is kept.
    pub fn rescheduled(&self, day: NaiveDate) -> Task {
        let mut task = self.clone();
        match self.scheduled_on() {
            Some(current) => {
                let delta = day.signed_duration_since(current);
                task.start_date = self.start_date.and_then(|date| date.checked_add_signed(delta));
                task.due_date = self.due_date.and_then(|date| date.checked_add_signed(delta));
            }
            None => task.due_date = Some(day),
        }
        task
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: TaskId,
    pub title: String,
    pub is_completed: bool,
    pub order: i64,
}

/// Partial record written by the batched rank upsert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct RankUpdate {
    pub id: TaskId,
    pub order: i64,
    pub column_id: ColumnId,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub context: Option<TaskContext>,
    pub column_id: Option<ColumnId>,
}

/// Field-level patch for single-task updates. `Some(None)` clears a field.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub context: Option<Option<TaskContext>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.due_date.is_none()
            && self.context.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(start_date) = self.start_date {
            task.start_date = start_date;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(context) = self.context {
            task.context = context;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Tasks,
    Subtasks,
}

/// Row-level change pushed by the task store.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: ChangeTable,
    pub owner: OwnerId,
    pub record_id: Uuid,
    /// New state of the task row for task inserts and updates.
    pub task: Option<Task>,
}

pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
