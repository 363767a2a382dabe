//! Snapshot-in/snapshot-out structural operations.
//!
//! # Responsibility
//! - Implement the drag-and-drop and form-edit semantics as pure functions.
//! - Clamp out-of-range target indices instead of rejecting them; an
//!   out-of-range drop target is normal UI behavior, not an error.
//!
//! # Invariants
//! - A move to the current position returns a snapshot structurally equal
//!   to the input, so callers can skip the network round trip.
//! - Renumbering touches exactly the source and target sibling lists.

use crate::model::board::{
    BoardSnapshot, ColumnDraft, ColumnId, TaskDraft, TaskFields, TaskId, ValidationError,
};
use crate::model::ordering::check_snapshot;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type MutationResult<T> = Result<T, MutationError>;

/// Failure of a structural operation; the input snapshot is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Referenced task is absent from the snapshot.
    TaskNotFound(TaskId),
    /// Referenced column is absent from the snapshot.
    ColumnNotFound(ColumnId),
    /// Draft id collides with an entity already in the snapshot.
    DuplicateId(Uuid),
    /// Malformed request rejected before any state change.
    Validation(ValidationError),
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(uuid) => write!(f, "task not found: {uuid}"),
            Self::ColumnNotFound(uuid) => write!(f, "column not found: {uuid}"),
            Self::DuplicateId(uuid) => write!(f, "entity id already in use: {uuid}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for MutationError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One user-initiated structural change, serializable for dispatch and
/// logging. Ids inside drafts are generated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StructuralOp {
    MoveTask {
        task_uuid: TaskId,
        to_column_uuid: ColumnId,
        to_index: usize,
    },
    MoveColumn {
        column_uuid: ColumnId,
        to_index: usize,
    },
    InsertTask {
        column_uuid: ColumnId,
        draft: TaskDraft,
        /// `None` appends at the end of the column.
        at_index: Option<usize>,
    },
    InsertColumn {
        draft: ColumnDraft,
        /// `None` appends at the end of the board.
        at_index: Option<usize>,
    },
    DeleteTask {
        task_uuid: TaskId,
    },
    DeleteColumn {
        column_uuid: ColumnId,
    },
    UpdateTaskFields {
        task_uuid: TaskId,
        fields: TaskFields,
    },
}

impl StructuralOp {
    /// Stable operation name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MoveTask { .. } => "move_task",
            Self::MoveColumn { .. } => "move_column",
            Self::InsertTask { .. } => "insert_task",
            Self::InsertColumn { .. } => "insert_column",
            Self::DeleteTask { .. } => "delete_task",
            Self::DeleteColumn { .. } => "delete_column",
            Self::UpdateTaskFields { .. } => "update_task_fields",
        }
    }
}

/// Applies any structural operation to a snapshot.
pub fn apply_op(snapshot: &BoardSnapshot, op: &StructuralOp) -> MutationResult<BoardSnapshot> {
    match op {
        StructuralOp::MoveTask {
            task_uuid,
            to_column_uuid,
            to_index,
        } => move_task(snapshot, *task_uuid, *to_column_uuid, *to_index),
        StructuralOp::MoveColumn {
            column_uuid,
            to_index,
        } => move_column(snapshot, *column_uuid, *to_index),
        StructuralOp::InsertTask {
            column_uuid,
            draft,
            at_index,
        } => insert_task(snapshot, *column_uuid, draft, *at_index),
        StructuralOp::InsertColumn { draft, at_index } => {
            insert_column(snapshot, draft, *at_index)
        }
        StructuralOp::DeleteTask { task_uuid } => delete_task(snapshot, *task_uuid),
        StructuralOp::DeleteColumn { column_uuid } => delete_column(snapshot, *column_uuid),
        StructuralOp::UpdateTaskFields { task_uuid, fields } => {
            update_task_fields(snapshot, *task_uuid, fields)
        }
    }
}

/// Moves a task into `to_column_uuid` at `to_index` (clamped), renumbering
/// the source and target columns.
pub fn move_task(
    snapshot: &BoardSnapshot,
    task_uuid: TaskId,
    to_column_uuid: ColumnId,
    to_index: usize,
) -> MutationResult<BoardSnapshot> {
    let from_column_uuid = snapshot
        .tasks
        .get(&task_uuid)
        .map(|task| task.column_uuid)
        .ok_or(MutationError::TaskNotFound(task_uuid))?;
    if !snapshot.columns.contains_key(&to_column_uuid) {
        return Err(MutationError::ColumnNotFound(to_column_uuid));
    }

    let mut next = snapshot.clone();
    let source = next
        .columns
        .get_mut(&from_column_uuid)
        .ok_or(MutationError::ColumnNotFound(from_column_uuid))?;
    source.task_ids.retain(|uuid| *uuid != task_uuid);

    let target = next
        .columns
        .get_mut(&to_column_uuid)
        .ok_or(MutationError::ColumnNotFound(to_column_uuid))?;
    let index = to_index.min(target.task_ids.len());
    target.task_ids.insert(index, task_uuid);

    if let Some(task) = next.tasks.get_mut(&task_uuid) {
        task.column_uuid = to_column_uuid;
    }

    renumber_tasks(&mut next, from_column_uuid)?;
    if from_column_uuid != to_column_uuid {
        renumber_tasks(&mut next, to_column_uuid)?;
    }
    Ok(guarded(next))
}

/// Moves a column to `to_index` (clamped) within its board.
pub fn move_column(
    snapshot: &BoardSnapshot,
    column_uuid: ColumnId,
    to_index: usize,
) -> MutationResult<BoardSnapshot> {
    if !snapshot.columns.contains_key(&column_uuid) {
        return Err(MutationError::ColumnNotFound(column_uuid));
    }

    let mut next = snapshot.clone();
    next.board.column_order.retain(|uuid| *uuid != column_uuid);
    let index = to_index.min(next.board.column_order.len());
    next.board.column_order.insert(index, column_uuid);
    renumber_columns(&mut next);
    Ok(guarded(next))
}

/// Inserts a drafted task into a column, shifting later siblings down.
pub fn insert_task(
    snapshot: &BoardSnapshot,
    column_uuid: ColumnId,
    draft: &TaskDraft,
    at_index: Option<usize>,
) -> MutationResult<BoardSnapshot> {
    draft.validate()?;
    if snapshot.tasks.contains_key(&draft.uuid) {
        return Err(MutationError::DuplicateId(draft.uuid));
    }
    if !snapshot.columns.contains_key(&column_uuid) {
        return Err(MutationError::ColumnNotFound(column_uuid));
    }

    let mut next = snapshot.clone();
    let column = next
        .columns
        .get_mut(&column_uuid)
        .ok_or(MutationError::ColumnNotFound(column_uuid))?;
    let index = at_index
        .unwrap_or(column.task_ids.len())
        .min(column.task_ids.len());
    column.task_ids.insert(index, draft.uuid);
    next.tasks
        .insert(draft.uuid, draft.into_task(column_uuid, index as i64));
    renumber_tasks(&mut next, column_uuid)?;
    Ok(guarded(next))
}

/// Inserts a drafted empty column, shifting later columns down.
pub fn insert_column(
    snapshot: &BoardSnapshot,
    draft: &ColumnDraft,
    at_index: Option<usize>,
) -> MutationResult<BoardSnapshot> {
    draft.validate()?;
    if snapshot.columns.contains_key(&draft.uuid) {
        return Err(MutationError::DuplicateId(draft.uuid));
    }

    let mut next = snapshot.clone();
    let index = at_index
        .unwrap_or(next.board.column_order.len())
        .min(next.board.column_order.len());
    next.board.column_order.insert(index, draft.uuid);
    next.columns.insert(
        draft.uuid,
        draft.into_column(next.board.uuid, index as i64),
    );
    renumber_columns(&mut next);
    Ok(guarded(next))
}

/// Deletes a task and closes the gap in its column.
pub fn delete_task(snapshot: &BoardSnapshot, task_uuid: TaskId) -> MutationResult<BoardSnapshot> {
    let column_uuid = snapshot
        .tasks
        .get(&task_uuid)
        .map(|task| task.column_uuid)
        .ok_or(MutationError::TaskNotFound(task_uuid))?;

    let mut next = snapshot.clone();
    next.tasks.remove(&task_uuid);
    if let Some(column) = next.columns.get_mut(&column_uuid) {
        column.task_ids.retain(|uuid| *uuid != task_uuid);
    }
    renumber_tasks(&mut next, column_uuid)?;
    Ok(guarded(next))
}

/// Deletes a column with all its tasks (cascade) and closes the gap in the
/// board's column order.
pub fn delete_column(
    snapshot: &BoardSnapshot,
    column_uuid: ColumnId,
) -> MutationResult<BoardSnapshot> {
    if !snapshot.columns.contains_key(&column_uuid) {
        return Err(MutationError::ColumnNotFound(column_uuid));
    }

    let mut next = snapshot.clone();
    next.columns.remove(&column_uuid);
    next.tasks.retain(|_, task| task.column_uuid != column_uuid);
    next.board.column_order.retain(|uuid| *uuid != column_uuid);
    renumber_columns(&mut next);
    Ok(guarded(next))
}

/// Replaces the editable field set of one task.
pub fn update_task_fields(
    snapshot: &BoardSnapshot,
    task_uuid: TaskId,
    fields: &TaskFields,
) -> MutationResult<BoardSnapshot> {
    fields.validate()?;
    if !snapshot.tasks.contains_key(&task_uuid) {
        return Err(MutationError::TaskNotFound(task_uuid));
    }

    let mut next = snapshot.clone();
    if let Some(task) = next.tasks.get_mut(&task_uuid) {
        task.set_fields(fields);
    }
    Ok(guarded(next))
}

fn renumber_tasks(snapshot: &mut BoardSnapshot, column_uuid: ColumnId) -> MutationResult<()> {
    let task_ids = snapshot
        .columns
        .get(&column_uuid)
        .map(|column| column.task_ids.clone())
        .ok_or(MutationError::ColumnNotFound(column_uuid))?;
    for (index, task_uuid) in task_ids.iter().enumerate() {
        if let Some(task) = snapshot.tasks.get_mut(task_uuid) {
            task.sort_order = index as i64;
        }
    }
    Ok(())
}

fn renumber_columns(snapshot: &mut BoardSnapshot) {
    let column_ids = snapshot.board.column_order.clone();
    for (index, column_uuid) in column_ids.iter().enumerate() {
        if let Some(column) = snapshot.columns.get_mut(column_uuid) {
            column.sort_order = index as i64;
        }
    }
}

fn guarded(next: BoardSnapshot) -> BoardSnapshot {
    debug_assert!(
        check_snapshot(&next).is_ok(),
        "mutation produced an inconsistent snapshot"
    );
    next
}
