//! Board/column/task domain model.
//!
//! # Responsibility
//! - Define the snapshot value types the whole crate operates on.
//! - Provide draft constructors for client-side entity creation.
//! - Validate user-supplied fields before any mutation is attempted.
//!
//! # Invariants
//! - `BoardSnapshot` is a plain value: cloning and structural equality are
//!   the only composition primitives the sync layer relies on.
//! - `Column::task_ids` mirrors the set of tasks whose `column_uuid` points
//!   at that column, sorted by `sort_order`.
//! - Titles are non-blank after trimming; ids are never nil.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable board identifier.
pub type BoardId = Uuid;
/// Stable column identifier.
pub type ColumnId = Uuid;
/// Stable task identifier.
pub type TaskId = Uuid;

/// Task urgency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Task workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

/// Single entry of a task checklist.
///
/// `id` is a client-generated opaque string so checklist edits can address
/// entries without relying on their position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl ChecklistItem {
    /// Creates an unchecked entry with a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
        }
    }
}

/// Editable field set of a task, replaced wholesale by a form submit.
///
/// Ordering fields (`sort_order`, `column_uuid`) are deliberately absent:
/// position changes go through move operations only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    pub content: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    /// Due date in epoch milliseconds.
    pub due_at_ms: Option<i64>,
    pub labels: BTreeSet<String>,
    pub checklist: Vec<ChecklistItem>,
}

impl TaskFields {
    /// Creates a field set with only a title, everything else empty.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: None,
            priority: None,
            status: None,
            assignee: None,
            due_at_ms: None,
            labels: BTreeSet::new(),
            checklist: Vec::new(),
        }
    }

    /// Checks user-supplied fields before they reach a snapshot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        Ok(())
    }
}

/// Task row inside one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: TaskId,
    /// Owning column; always a column of the same board as the task.
    pub column_uuid: ColumnId,
    pub title: String,
    pub content: Option<String>,
    /// Zero-based position within the owning column.
    pub sort_order: i64,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    /// Due date in epoch milliseconds.
    pub due_at_ms: Option<i64>,
    pub labels: BTreeSet<String>,
    pub checklist: Vec<ChecklistItem>,
}

impl Task {
    /// Returns the editable field set of this task.
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            content: self.content.clone(),
            priority: self.priority,
            status: self.status,
            assignee: self.assignee.clone(),
            due_at_ms: self.due_at_ms,
            labels: self.labels.clone(),
            checklist: self.checklist.clone(),
        }
    }

    /// Replaces every editable field; ordering fields stay untouched.
    pub fn set_fields(&mut self, fields: &TaskFields) {
        self.title = fields.title.trim().to_string();
        self.content = fields.content.clone();
        self.priority = fields.priority;
        self.status = fields.status;
        self.assignee = fields.assignee.clone();
        self.due_at_ms = fields.due_at_ms;
        self.labels = fields.labels.clone();
        self.checklist = fields.checklist.clone();
    }
}

/// Client-side draft for inserting a task.
///
/// The id is generated up front so optimistic creation never collides with
/// concurrent inserts from other clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub uuid: TaskId,
    pub fields: TaskFields,
}

impl TaskDraft {
    /// Creates a draft with a generated id and only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            fields: TaskFields::with_title(title),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId);
        }
        self.fields.validate()
    }

    /// Materializes the draft into a task row at the given position.
    pub fn into_task(&self, column_uuid: ColumnId, sort_order: i64) -> Task {
        let mut task = Task {
            uuid: self.uuid,
            column_uuid,
            title: String::new(),
            content: None,
            sort_order,
            priority: None,
            status: None,
            assignee: None,
            due_at_ms: None,
            labels: BTreeSet::new(),
            checklist: Vec::new(),
        };
        task.set_fields(&self.fields);
        task
    }
}

/// Ordered lane of tasks inside one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub uuid: ColumnId,
    pub board_uuid: BoardId,
    pub title: String,
    /// Zero-based position within the owning board.
    pub sort_order: i64,
    /// Cached task ids sorted by task `sort_order`.
    pub task_ids: Vec<TaskId>,
}

/// Client-side draft for inserting a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDraft {
    pub uuid: ColumnId,
    pub title: String,
}

impl ColumnDraft {
    /// Creates a draft with a generated id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        Ok(())
    }

    /// Materializes the draft into an empty column at the given position.
    pub fn into_column(&self, board_uuid: BoardId, sort_order: i64) -> Column {
        Column {
            uuid: self.uuid,
            board_uuid,
            title: self.title.trim().to_string(),
            sort_order,
            task_ids: Vec::new(),
        }
    }
}

/// Board header plus its column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub uuid: BoardId,
    pub title: String,
    pub description: Option<String>,
    /// Column ids sorted by column `sort_order`.
    pub column_order: Vec<ColumnId>,
}

impl Board {
    /// Creates an empty board with a generated id.
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            description,
            column_order: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        Ok(())
    }
}

/// Immutable value describing one board plus all its columns and tasks at a
/// point in time.
///
/// The sync layer detects no-op mutations through structural equality of
/// snapshots, so every collection here has deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: BTreeMap<ColumnId, Column>,
    pub tasks: BTreeMap<TaskId, Task>,
}

impl BoardSnapshot {
    /// Creates a snapshot of a board with no columns or tasks.
    pub fn new(board: Board) -> Self {
        Self {
            board,
            columns: BTreeMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn column(&self, column_uuid: ColumnId) -> Option<&Column> {
        self.columns.get(&column_uuid)
    }

    pub fn task(&self, task_uuid: TaskId) -> Option<&Task> {
        self.tasks.get(&task_uuid)
    }

    /// Columns in board order.
    pub fn ordered_columns(&self) -> Vec<&Column> {
        self.board
            .column_order
            .iter()
            .filter_map(|uuid| self.columns.get(uuid))
            .collect()
    }

    /// Tasks of one column in column order; empty for unknown columns.
    pub fn ordered_tasks(&self, column_uuid: ColumnId) -> Vec<&Task> {
        let Some(column) = self.columns.get(&column_uuid) else {
            return Vec::new();
        };
        column
            .task_ids
            .iter()
            .filter_map(|uuid| self.tasks.get(uuid))
            .collect()
    }
}

/// Rejection of malformed user input before any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Required title is empty after trimming.
    BlankTitle,
    /// Entity id is the nil UUID.
    NilId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "title must not be blank"),
            Self::NilId => write!(f, "entity id must not be nil"),
        }
    }
}

impl Error for ValidationError {}
