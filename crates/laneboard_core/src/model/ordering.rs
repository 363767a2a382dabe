//! Pure queries over the sibling total order.
//!
//! # Responsibility
//! - Answer position questions (`siblings_of`, `order_of`) without touching
//!   storage or mutating anything.
//! - Verify that a snapshot satisfies every ordering invariant; used by
//!   tests and by debug guards around mutations.
//!
//! # Invariants
//! - A contiguous sequence of positions is exactly `0..n` with no gaps or
//!   duplicates.

use crate::model::board::{BoardSnapshot, ColumnId, TaskId};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Either kind of ordered sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Column(ColumnId),
    Task(TaskId),
}

/// Returns the ordered sibling ids of an entity, including the entity
/// itself: the board's columns for a column, the owning column's tasks for a
/// task. `None` when the entity is not part of the snapshot.
pub fn siblings_of(snapshot: &BoardSnapshot, entity: EntityRef) -> Option<Vec<Uuid>> {
    match entity {
        EntityRef::Column(column_uuid) => {
            snapshot.columns.contains_key(&column_uuid).then(|| snapshot.board.column_order.clone())
        }
        EntityRef::Task(task_uuid) => {
            let task = snapshot.tasks.get(&task_uuid)?;
            let column = snapshot.columns.get(&task.column_uuid)?;
            Some(column.task_ids.clone())
        }
    }
}

/// Returns the zero-based position of an entity among its siblings, or
/// `None` when the entity is not part of the snapshot.
pub fn order_of(snapshot: &BoardSnapshot, entity: EntityRef) -> Option<i64> {
    match entity {
        EntityRef::Column(column_uuid) => {
            snapshot.columns.get(&column_uuid).map(|column| column.sort_order)
        }
        EntityRef::Task(task_uuid) => snapshot.tasks.get(&task_uuid).map(|task| task.sort_order),
    }
}

/// Whether the given positions form `0..n` with no gaps or duplicates.
pub fn is_contiguous(orders: impl IntoIterator<Item = i64>) -> bool {
    let mut sorted: Vec<i64> = orders.into_iter().collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, order)| *order == index as i64)
}

/// Violation of the snapshot ordering invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingViolation {
    /// `column_order` and the column map disagree on membership.
    ColumnSetMismatch,
    /// A column's `sort_order` does not match its `column_order` position.
    ColumnOrderMismatch(ColumnId),
    /// A column lists a task id that is absent from the task map.
    UnknownTaskListed { column_uuid: ColumnId, task_uuid: TaskId },
    /// A listed task's `column_uuid` points at a different column.
    TaskParentMismatch { column_uuid: ColumnId, task_uuid: TaskId },
    /// A task's `sort_order` does not match its `task_ids` position.
    TaskOrderMismatch { column_uuid: ColumnId, task_uuid: TaskId },
    /// A task exists in the task map but no column lists it.
    UnlistedTask(TaskId),
}

impl Display for OrderingViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnSetMismatch => {
                write!(f, "column_order and column map disagree on membership")
            }
            Self::ColumnOrderMismatch(column_uuid) => {
                write!(f, "column {column_uuid} sort_order disagrees with column_order")
            }
            Self::UnknownTaskListed {
                column_uuid,
                task_uuid,
            } => write!(f, "column {column_uuid} lists unknown task {task_uuid}"),
            Self::TaskParentMismatch {
                column_uuid,
                task_uuid,
            } => write!(
                f,
                "task {task_uuid} is listed by column {column_uuid} but owned elsewhere"
            ),
            Self::TaskOrderMismatch {
                column_uuid,
                task_uuid,
            } => write!(
                f,
                "task {task_uuid} sort_order disagrees with its position in column {column_uuid}"
            ),
            Self::UnlistedTask(task_uuid) => {
                write!(f, "task {task_uuid} is not listed by any column")
            }
        }
    }
}

impl Error for OrderingViolation {}

/// Verifies every ordering invariant of a snapshot.
///
/// Returns the first violation found; the scan order is deterministic
/// (board column order, then tasks per column).
pub fn check_snapshot(snapshot: &BoardSnapshot) -> Result<(), OrderingViolation> {
    let listed_columns: BTreeSet<ColumnId> =
        snapshot.board.column_order.iter().copied().collect();
    let known_columns: BTreeSet<ColumnId> = snapshot.columns.keys().copied().collect();
    if listed_columns != known_columns
        || listed_columns.len() != snapshot.board.column_order.len()
    {
        return Err(OrderingViolation::ColumnSetMismatch);
    }

    let mut listed_tasks: BTreeSet<TaskId> = BTreeSet::new();
    for (index, column_uuid) in snapshot.board.column_order.iter().enumerate() {
        let column = &snapshot.columns[column_uuid];
        if column.sort_order != index as i64 {
            return Err(OrderingViolation::ColumnOrderMismatch(*column_uuid));
        }

        for (task_index, task_uuid) in column.task_ids.iter().enumerate() {
            let Some(task) = snapshot.tasks.get(task_uuid) else {
                return Err(OrderingViolation::UnknownTaskListed {
                    column_uuid: *column_uuid,
                    task_uuid: *task_uuid,
                });
            };
            if task.column_uuid != *column_uuid {
                return Err(OrderingViolation::TaskParentMismatch {
                    column_uuid: *column_uuid,
                    task_uuid: *task_uuid,
                });
            }
            if task.sort_order != task_index as i64 {
                return Err(OrderingViolation::TaskOrderMismatch {
                    column_uuid: *column_uuid,
                    task_uuid: *task_uuid,
                });
            }
            listed_tasks.insert(*task_uuid);
        }
    }

    for task_uuid in snapshot.tasks.keys() {
        if !listed_tasks.contains(task_uuid) {
            return Err(OrderingViolation::UnlistedTask(*task_uuid));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_snapshot, is_contiguous, order_of, siblings_of, EntityRef};
    use crate::model::board::{Board, BoardSnapshot, ColumnDraft, TaskDraft};

    fn snapshot_with_one_column() -> BoardSnapshot {
        let board = Board::new("Sprint", None);
        let mut snapshot = BoardSnapshot::new(board);
        let column = ColumnDraft::new("Todo").into_column(snapshot.board.uuid, 0);
        snapshot.board.column_order.push(column.uuid);
        snapshot.columns.insert(column.uuid, column);
        snapshot
    }

    #[test]
    fn contiguous_accepts_empty_and_dense_sequences() {
        assert!(is_contiguous([]));
        assert!(is_contiguous([0]));
        assert!(is_contiguous([2, 0, 1]));
    }

    #[test]
    fn contiguous_rejects_gaps_and_duplicates() {
        assert!(!is_contiguous([0, 2]));
        assert!(!is_contiguous([0, 0, 1]));
        assert!(!is_contiguous([1, 2]));
    }

    #[test]
    fn order_and_siblings_answer_for_known_entities() {
        let mut snapshot = snapshot_with_one_column();
        let column_uuid = snapshot.board.column_order[0];
        let task = TaskDraft::new("write docs").into_task(column_uuid, 0);
        let task_uuid = task.uuid;
        snapshot
            .columns
            .get_mut(&column_uuid)
            .unwrap()
            .task_ids
            .push(task_uuid);
        snapshot.tasks.insert(task_uuid, task);

        assert_eq!(order_of(&snapshot, EntityRef::Column(column_uuid)), Some(0));
        assert_eq!(order_of(&snapshot, EntityRef::Task(task_uuid)), Some(0));
        assert_eq!(
            siblings_of(&snapshot, EntityRef::Task(task_uuid)),
            Some(vec![task_uuid])
        );
        assert_eq!(
            siblings_of(&snapshot, EntityRef::Column(column_uuid)),
            Some(vec![column_uuid])
        );
        check_snapshot(&snapshot).unwrap();
    }

    #[test]
    fn order_of_unknown_entity_is_none() {
        let snapshot = snapshot_with_one_column();
        assert_eq!(order_of(&snapshot, EntityRef::Task(uuid::Uuid::new_v4())), None);
        assert_eq!(siblings_of(&snapshot, EntityRef::Task(uuid::Uuid::new_v4())), None);
    }

    #[test]
    fn check_snapshot_flags_order_mismatch() {
        let mut snapshot = snapshot_with_one_column();
        // Position index 1 but sort_order 5: the invariant must trip.
        let second = ColumnDraft::new("Doing").into_column(snapshot.board.uuid, 5);
        let second_uuid = second.uuid;
        snapshot.board.column_order.push(second_uuid);
        snapshot.columns.insert(second_uuid, second);

        let violation = check_snapshot(&snapshot).unwrap_err();
        assert_eq!(
            violation,
            super::OrderingViolation::ColumnOrderMismatch(second_uuid)
        );
    }
}
