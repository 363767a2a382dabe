//! Board persistence gateway contracts and SQLite implementation.
//!
//! # Responsibility
//! - Translate structural operations into parameterized row writes.
//! - Assemble full-board snapshots from ordered reads.
//! - Keep SQL details and renumbering behavior inside the gateway boundary.
//!
//! # Invariants
//! - Sibling reads are deterministic: `sort_order ASC, uuid ASC`.
//! - Order writes touch only rows whose position or parent changed.
//! - Writes are individually committed; a failure partway leaves earlier
//!   writes in place and the caller re-fetches to reconcile. Renumbering
//!   always derives target positions from the current sibling list, so a
//!   later operation heals gaps left by an interrupted one.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::engine::mutation::StructuralOp;
use crate::model::board::{
    Board, BoardId, BoardSnapshot, ChecklistItem, Column, ColumnDraft, ColumnId, Task, TaskDraft,
    TaskFields, TaskId, TaskPriority, TaskStatus, ValidationError,
};
use crate::repo::policy::{AccessPolicy, AllowAllPolicy, BearerCredential};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Result type used by board gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from board gateway operations.
#[derive(Debug)]
pub enum GatewayError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target board does not exist.
    BoardNotFound(BoardId),
    /// Target column does not exist in the addressed board.
    ColumnNotFound(ColumnId),
    /// Target task does not exist in the addressed board.
    TaskNotFound(TaskId),
    /// Supplied draft id collides with a persisted entity.
    DuplicateId(Uuid),
    /// Malformed request rejected before any write.
    Validation(ValidationError),
    /// Access policy refused the credential for this board.
    Denied(BoardId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::BoardNotFound(id) => write!(f, "board not found: {id}"),
            Self::ColumnNotFound(id) => write!(f, "column not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::DuplicateId(id) => write!(f, "entity id already persisted: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Denied(id) => write!(f, "mutation denied for board: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board gateway requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "board gateway requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "board gateway requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid board data: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for GatewayError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(format!("json payload: {value}"))
    }
}

/// Board listing read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSummary {
    /// Stable board id.
    pub board_uuid: BoardId,
    /// User-facing board title.
    pub title: String,
    /// Optional board description.
    pub description: Option<String>,
    /// Number of columns on the board.
    pub column_count: i64,
    /// Number of tasks across all columns.
    pub task_count: i64,
    /// Epoch ms update timestamp of the board row.
    pub updated_at: i64,
}

/// Gateway interface between board sessions and the relational store.
///
/// Reads are unauthenticated; every mutating call carries an opaque
/// bearer credential checked against the configured [`AccessPolicy`].
pub trait BoardGateway {
    /// Persists one new, empty board.
    fn create_board(&self, credential: &BearerCredential, board: &Board) -> GatewayResult<()>;
    /// Loads one board with ordered columns and tasks.
    fn fetch_board(&self, board_uuid: BoardId) -> GatewayResult<BoardSnapshot>;
    /// Lists all boards with column/task counts.
    fn list_boards(&self) -> GatewayResult<Vec<BoardSummary>>;
    /// Deletes one board, cascading to its columns and tasks.
    fn delete_board(&self, credential: &BearerCredential, board_uuid: BoardId)
        -> GatewayResult<()>;
    /// Applies one structural operation to the addressed board.
    fn apply(
        &self,
        credential: &BearerCredential,
        board_uuid: BoardId,
        op: &StructuralOp,
    ) -> GatewayResult<()>;
}

/// SQLite-backed board gateway.
pub struct SqliteBoardRepository<'conn> {
    conn: &'conn Connection,
    policy: Arc<dyn AccessPolicy>,
}

impl<'conn> SqliteBoardRepository<'conn> {
    /// Creates a gateway from a migrated connection, accepting every
    /// credential.
    pub fn try_new(conn: &'conn Connection) -> GatewayResult<Self> {
        Self::with_policy(conn, Arc::new(AllowAllPolicy))
    }

    /// Creates a gateway from a migrated connection with an explicit
    /// mutation policy.
    pub fn with_policy(
        conn: &'conn Connection,
        policy: Arc<dyn AccessPolicy>,
    ) -> GatewayResult<Self> {
        ensure_board_connection_ready(conn)?;
        Ok(Self { conn, policy })
    }

    fn ensure_allowed(
        &self,
        credential: &BearerCredential,
        board_uuid: BoardId,
    ) -> GatewayResult<()> {
        if self.policy.allow_mutation(credential, board_uuid) {
            Ok(())
        } else {
            Err(GatewayError::Denied(board_uuid))
        }
    }
}

impl BoardGateway for SqliteBoardRepository<'_> {
    fn create_board(&self, credential: &BearerCredential, board: &Board) -> GatewayResult<()> {
        self.ensure_allowed(credential, board.uuid)?;
        board.validate()?;
        if board_exists(self.conn, board.uuid)? {
            return Err(GatewayError::DuplicateId(board.uuid));
        }
        self.conn.execute(
            "INSERT INTO boards (board_uuid, title, description) VALUES (?1, ?2, ?3);",
            params![
                board.uuid.to_string(),
                board.title.trim(),
                board.description,
            ],
        )?;
        Ok(())
    }

    fn fetch_board(&self, board_uuid: BoardId) -> GatewayResult<BoardSnapshot> {
        let header = self
            .conn
            .query_row(
                "SELECT title, description
                 FROM boards
                 WHERE board_uuid = ?1;",
                [board_uuid.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )
            .optional()?;
        let Some((title, description)) = header else {
            return Err(GatewayError::BoardNotFound(board_uuid));
        };

        let mut board = Board {
            uuid: board_uuid,
            title,
            description,
            column_order: Vec::new(),
        };

        let mut columns = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT column_uuid, title, sort_order
             FROM columns
             WHERE board_uuid = ?1
             ORDER BY sort_order ASC, column_uuid ASC;",
        )?;
        let mut rows = stmt.query([board_uuid.to_string()])?;
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let column_uuid = parse_uuid(&uuid_text, "columns.column_uuid")?;
            board.column_order.push(column_uuid);
            columns.insert(
                column_uuid,
                Column {
                    uuid: column_uuid,
                    board_uuid,
                    title: row.get(1)?,
                    sort_order: row.get(2)?,
                    task_ids: Vec::new(),
                },
            );
        }

        let mut tasks = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT
                t.task_uuid,
                t.column_uuid,
                t.title,
                t.content,
                t.sort_order,
                t.priority,
                t.status,
                t.assignee,
                t.due_at_ms,
                t.labels,
                t.checklist
             FROM tasks t
             INNER JOIN columns c ON c.column_uuid = t.column_uuid
             WHERE c.board_uuid = ?1
             ORDER BY t.column_uuid ASC, t.sort_order ASC, t.task_uuid ASC;",
        )?;
        let mut rows = stmt.query([board_uuid.to_string()])?;
        while let Some(row) = rows.next()? {
            let task = parse_task_row(row)?;
            if let Some(column) = columns.get_mut(&task.column_uuid) {
                column.task_ids.push(task.uuid);
            }
            tasks.insert(task.uuid, task);
        }

        let mut snapshot = BoardSnapshot {
            board,
            columns,
            tasks,
        };
        normalize_snapshot_orders(&mut snapshot);
        Ok(snapshot)
    }

    fn list_boards(&self) -> GatewayResult<Vec<BoardSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                b.board_uuid,
                b.title,
                b.description,
                COUNT(DISTINCT c.column_uuid) AS column_count,
                COUNT(DISTINCT t.task_uuid) AS task_count,
                b.updated_at
             FROM boards b
             LEFT JOIN columns c ON c.board_uuid = b.board_uuid
             LEFT JOIN tasks t ON t.column_uuid = c.column_uuid
             GROUP BY b.board_uuid
             ORDER BY b.created_at ASC, b.board_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            items.push(BoardSummary {
                board_uuid: parse_uuid(&uuid_text, "boards.board_uuid")?,
                title: row.get(1)?,
                description: row.get(2)?,
                column_count: row.get(3)?,
                task_count: row.get(4)?,
                updated_at: row.get(5)?,
            });
        }
        Ok(items)
    }

    fn delete_board(
        &self,
        credential: &BearerCredential,
        board_uuid: BoardId,
    ) -> GatewayResult<()> {
        self.ensure_allowed(credential, board_uuid)?;
        let changed = self.conn.execute(
            "DELETE FROM boards WHERE board_uuid = ?1;",
            [board_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(GatewayError::BoardNotFound(board_uuid));
        }
        Ok(())
    }

    fn apply(
        &self,
        credential: &BearerCredential,
        board_uuid: BoardId,
        op: &StructuralOp,
    ) -> GatewayResult<()> {
        self.ensure_allowed(credential, board_uuid)?;
        if !board_exists(self.conn, board_uuid)? {
            return Err(GatewayError::BoardNotFound(board_uuid));
        }

        match op {
            StructuralOp::MoveTask {
                task_uuid,
                to_column_uuid,
                to_index,
            } => apply_move_task(self.conn, board_uuid, *task_uuid, *to_column_uuid, *to_index),
            StructuralOp::MoveColumn {
                column_uuid,
                to_index,
            } => apply_move_column(self.conn, board_uuid, *column_uuid, *to_index),
            StructuralOp::InsertTask {
                column_uuid,
                draft,
                at_index,
            } => apply_insert_task(self.conn, board_uuid, *column_uuid, draft, *at_index),
            StructuralOp::InsertColumn { draft, at_index } => {
                apply_insert_column(self.conn, board_uuid, draft, *at_index)
            }
            StructuralOp::DeleteTask { task_uuid } => {
                apply_delete_task(self.conn, board_uuid, *task_uuid)
            }
            StructuralOp::DeleteColumn { column_uuid } => {
                apply_delete_column(self.conn, board_uuid, *column_uuid)
            }
            StructuralOp::UpdateTaskFields { task_uuid, fields } => {
                apply_update_task_fields(self.conn, board_uuid, *task_uuid, fields)
            }
        }
    }
}

fn apply_move_task(
    conn: &Connection,
    board_uuid: BoardId,
    task_uuid: TaskId,
    to_column_uuid: ColumnId,
    to_index: usize,
) -> GatewayResult<()> {
    let (from_column_uuid, stored_order) = task_placement_in_board(conn, board_uuid, task_uuid)?
        .ok_or(GatewayError::TaskNotFound(task_uuid))?;
    if !column_in_board(conn, board_uuid, to_column_uuid)? {
        return Err(GatewayError::ColumnNotFound(to_column_uuid));
    }

    if from_column_uuid != to_column_uuid {
        // Reparent before renumbering so an interrupted move leaves the task
        // attached to the target column rather than orphaned mid-list.
        conn.execute(
            "UPDATE tasks
             SET column_uuid = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![task_uuid.to_string(), to_column_uuid.to_string()],
        )?;
        let source_rows = list_task_rows(conn, from_column_uuid)?;
        sync_task_orders(conn, &source_rows)?;
    }

    let mut target_rows = list_task_rows(conn, to_column_uuid)?;
    target_rows.retain(|row| row.uuid != task_uuid);
    let index = to_index.min(target_rows.len());
    target_rows.insert(
        index,
        OrderedRow {
            uuid: task_uuid,
            sort_order: stored_order,
        },
    );
    sync_task_orders(conn, &target_rows)?;
    Ok(())
}

fn apply_move_column(
    conn: &Connection,
    board_uuid: BoardId,
    column_uuid: ColumnId,
    to_index: usize,
) -> GatewayResult<()> {
    let stored_order = column_order_in_board(conn, board_uuid, column_uuid)?
        .ok_or(GatewayError::ColumnNotFound(column_uuid))?;

    let mut rows = list_column_rows(conn, board_uuid)?;
    rows.retain(|row| row.uuid != column_uuid);
    let index = to_index.min(rows.len());
    rows.insert(
        index,
        OrderedRow {
            uuid: column_uuid,
            sort_order: stored_order,
        },
    );
    sync_column_orders(conn, &rows)?;
    Ok(())
}

fn apply_insert_task(
    conn: &Connection,
    board_uuid: BoardId,
    column_uuid: ColumnId,
    draft: &TaskDraft,
    at_index: Option<usize>,
) -> GatewayResult<()> {
    draft.validate()?;
    if !column_in_board(conn, board_uuid, column_uuid)? {
        return Err(GatewayError::ColumnNotFound(column_uuid));
    }
    if task_exists(conn, draft.uuid)? {
        return Err(GatewayError::DuplicateId(draft.uuid));
    }

    let rows = list_task_rows(conn, column_uuid)?;
    let index = at_index.unwrap_or(rows.len()).min(rows.len());

    let fields = &draft.fields;
    let labels_json = serde_json::to_string(&fields.labels)?;
    let checklist_json = serde_json::to_string(&fields.checklist)?;
    conn.execute(
        "INSERT INTO tasks (
            task_uuid,
            column_uuid,
            title,
            content,
            sort_order,
            priority,
            status,
            assignee,
            due_at_ms,
            labels,
            checklist
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            draft.uuid.to_string(),
            column_uuid.to_string(),
            fields.title.trim(),
            fields.content,
            index as i64,
            fields.priority.map(priority_to_db),
            fields.status.map(status_to_db),
            fields.assignee,
            fields.due_at_ms,
            labels_json,
            checklist_json,
        ],
    )?;

    let mut target_rows = rows;
    target_rows.insert(
        index,
        OrderedRow {
            uuid: draft.uuid,
            sort_order: index as i64,
        },
    );
    sync_task_orders(conn, &target_rows)?;
    Ok(())
}

fn apply_insert_column(
    conn: &Connection,
    board_uuid: BoardId,
    draft: &ColumnDraft,
    at_index: Option<usize>,
) -> GatewayResult<()> {
    draft.validate()?;
    if column_exists(conn, draft.uuid)? {
        return Err(GatewayError::DuplicateId(draft.uuid));
    }

    let rows = list_column_rows(conn, board_uuid)?;
    let index = at_index.unwrap_or(rows.len()).min(rows.len());
    conn.execute(
        "INSERT INTO columns (column_uuid, board_uuid, title, sort_order)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            draft.uuid.to_string(),
            board_uuid.to_string(),
            draft.title.trim(),
            index as i64,
        ],
    )?;

    let mut target_rows = rows;
    target_rows.insert(
        index,
        OrderedRow {
            uuid: draft.uuid,
            sort_order: index as i64,
        },
    );
    sync_column_orders(conn, &target_rows)?;
    Ok(())
}

fn apply_delete_task(
    conn: &Connection,
    board_uuid: BoardId,
    task_uuid: TaskId,
) -> GatewayResult<()> {
    let (column_uuid, _) = task_placement_in_board(conn, board_uuid, task_uuid)?
        .ok_or(GatewayError::TaskNotFound(task_uuid))?;

    conn.execute(
        "DELETE FROM tasks WHERE task_uuid = ?1;",
        [task_uuid.to_string()],
    )?;
    let rows = list_task_rows(conn, column_uuid)?;
    sync_task_orders(conn, &rows)?;
    Ok(())
}

fn apply_delete_column(
    conn: &Connection,
    board_uuid: BoardId,
    column_uuid: ColumnId,
) -> GatewayResult<()> {
    if !column_in_board(conn, board_uuid, column_uuid)? {
        return Err(GatewayError::ColumnNotFound(column_uuid));
    }

    // FK cascade removes the column's tasks with this row.
    conn.execute(
        "DELETE FROM columns WHERE column_uuid = ?1;",
        [column_uuid.to_string()],
    )?;
    let rows = list_column_rows(conn, board_uuid)?;
    sync_column_orders(conn, &rows)?;
    Ok(())
}

fn apply_update_task_fields(
    conn: &Connection,
    board_uuid: BoardId,
    task_uuid: TaskId,
    fields: &TaskFields,
) -> GatewayResult<()> {
    fields.validate()?;
    if task_placement_in_board(conn, board_uuid, task_uuid)?.is_none() {
        return Err(GatewayError::TaskNotFound(task_uuid));
    }

    let labels_json = serde_json::to_string(&fields.labels)?;
    let checklist_json = serde_json::to_string(&fields.checklist)?;
    conn.execute(
        "UPDATE tasks
         SET title = ?2,
             content = ?3,
             priority = ?4,
             status = ?5,
             assignee = ?6,
             due_at_ms = ?7,
             labels = ?8,
             checklist = ?9,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE task_uuid = ?1;",
        params![
            task_uuid.to_string(),
            fields.title.trim(),
            fields.content,
            fields.priority.map(priority_to_db),
            fields.status.map(status_to_db),
            fields.assignee,
            fields.due_at_ms,
            labels_json,
            checklist_json,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct OrderedRow {
    uuid: Uuid,
    sort_order: i64,
}

fn list_task_rows(conn: &Connection, column_uuid: ColumnId) -> GatewayResult<Vec<OrderedRow>> {
    let mut stmt = conn.prepare(
        "SELECT task_uuid, sort_order
         FROM tasks
         WHERE column_uuid = ?1
         ORDER BY sort_order ASC, task_uuid ASC;",
    )?;
    let mut rows = stmt.query([column_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        items.push(OrderedRow {
            uuid: parse_uuid(&value, "tasks.task_uuid")?,
            sort_order: row.get(1)?,
        });
    }
    Ok(items)
}

fn list_column_rows(conn: &Connection, board_uuid: BoardId) -> GatewayResult<Vec<OrderedRow>> {
    let mut stmt = conn.prepare(
        "SELECT column_uuid, sort_order
         FROM columns
         WHERE board_uuid = ?1
         ORDER BY sort_order ASC, column_uuid ASC;",
    )?;
    let mut rows = stmt.query([board_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        items.push(OrderedRow {
            uuid: parse_uuid(&value, "columns.column_uuid")?,
            sort_order: row.get(1)?,
        });
    }
    Ok(items)
}

/// Writes `sort_order = list index` for every task row whose stored order
/// differs from its position in `rows`.
fn sync_task_orders(conn: &Connection, rows: &[OrderedRow]) -> GatewayResult<()> {
    for (index, row) in rows.iter().enumerate() {
        if row.sort_order == index as i64 {
            continue;
        }
        conn.execute(
            "UPDATE tasks
             SET sort_order = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![row.uuid.to_string(), index as i64],
        )?;
    }
    Ok(())
}

/// Writes `sort_order = list index` for every column row whose stored order
/// differs from its position in `rows`.
fn sync_column_orders(conn: &Connection, rows: &[OrderedRow]) -> GatewayResult<()> {
    for (index, row) in rows.iter().enumerate() {
        if row.sort_order == index as i64 {
            continue;
        }
        conn.execute(
            "UPDATE columns
             SET sort_order = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE column_uuid = ?1;",
            params![row.uuid.to_string(), index as i64],
        )?;
    }
    Ok(())
}

fn board_exists(conn: &Connection, board_uuid: BoardId) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM boards
            WHERE board_uuid = ?1
        );",
        [board_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn column_exists(conn: &Connection, column_uuid: ColumnId) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM columns
            WHERE column_uuid = ?1
        );",
        [column_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn task_exists(conn: &Connection, task_uuid: TaskId) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM tasks
            WHERE task_uuid = ?1
        );",
        [task_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn column_in_board(
    conn: &Connection,
    board_uuid: BoardId,
    column_uuid: ColumnId,
) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM columns
            WHERE column_uuid = ?1
              AND board_uuid = ?2
        );",
        params![column_uuid.to_string(), board_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn column_order_in_board(
    conn: &Connection,
    board_uuid: BoardId,
    column_uuid: ColumnId,
) -> GatewayResult<Option<i64>> {
    let order = conn
        .query_row(
            "SELECT sort_order
             FROM columns
             WHERE column_uuid = ?1
               AND board_uuid = ?2;",
            params![column_uuid.to_string(), board_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(order)
}

fn task_placement_in_board(
    conn: &Connection,
    board_uuid: BoardId,
    task_uuid: TaskId,
) -> GatewayResult<Option<(ColumnId, i64)>> {
    let placement = conn
        .query_row(
            "SELECT t.column_uuid, t.sort_order
             FROM tasks t
             INNER JOIN columns c ON c.column_uuid = t.column_uuid
             WHERE t.task_uuid = ?1
               AND c.board_uuid = ?2;",
            params![task_uuid.to_string(), board_uuid.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    match placement {
        Some((column_text, sort_order)) => {
            let column_uuid = parse_uuid(&column_text, "tasks.column_uuid")?;
            Ok(Some((column_uuid, sort_order)))
        }
        None => Ok(None),
    }
}

/// Restores contiguous positions in the assembled snapshot. Persisted gaps
/// from interrupted writes are invisible to clients.
fn normalize_snapshot_orders(snapshot: &mut BoardSnapshot) {
    let column_order = snapshot.board.column_order.clone();
    for (index, column_uuid) in column_order.iter().enumerate() {
        if let Some(column) = snapshot.columns.get_mut(column_uuid) {
            column.sort_order = index as i64;
        }
    }
    for column_uuid in column_order {
        let task_ids = match snapshot.columns.get(&column_uuid) {
            Some(column) => column.task_ids.clone(),
            None => continue,
        };
        for (index, task_uuid) in task_ids.iter().enumerate() {
            if let Some(task) = snapshot.tasks.get_mut(task_uuid) {
                task.sort_order = index as i64;
            }
        }
    }
}

fn parse_task_row(row: &Row<'_>) -> GatewayResult<Task> {
    let task_uuid_text: String = row.get(0)?;
    let task_uuid = parse_uuid(&task_uuid_text, "tasks.task_uuid")?;
    let column_uuid_text: String = row.get(1)?;
    let column_uuid = parse_uuid(&column_uuid_text, "tasks.column_uuid")?;

    let priority = row
        .get::<_, Option<String>>(5)?
        .map(|value| {
            parse_priority(&value).ok_or_else(|| {
                GatewayError::InvalidData(format!("invalid priority `{value}` in tasks.priority"))
            })
        })
        .transpose()?;
    let status = row
        .get::<_, Option<String>>(6)?
        .map(|value| {
            parse_status(&value).ok_or_else(|| {
                GatewayError::InvalidData(format!("invalid status `{value}` in tasks.status"))
            })
        })
        .transpose()?;

    let labels_raw: String = row.get(9)?;
    let checklist_raw: String = row.get(10)?;

    Ok(Task {
        uuid: task_uuid,
        column_uuid,
        title: row.get(2)?,
        content: row.get(3)?,
        sort_order: row.get(4)?,
        priority,
        status,
        assignee: row.get(7)?,
        due_at_ms: row.get(8)?,
        labels: decode_labels(&labels_raw, task_uuid),
        checklist: decode_checklist(&checklist_raw, task_uuid),
    })
}

/// Decodes the serialized label set, degrading to empty on malformed data
/// so one bad field never blocks loading the rest of the board.
fn decode_labels(raw: &str, task_uuid: TaskId) -> BTreeSet<String> {
    match serde_json::from_str(raw) {
        Ok(labels) => labels,
        Err(err) => {
            warn!(
                "event=decode_labels module=repo status=degraded task={task_uuid} error={err}"
            );
            BTreeSet::new()
        }
    }
}

/// Decodes the serialized checklist, degrading to empty on malformed data.
fn decode_checklist(raw: &str, task_uuid: TaskId) -> Vec<ChecklistItem> {
    match serde_json::from_str(raw) {
        Ok(items) => items,
        Err(err) => {
            warn!(
                "event=decode_checklist module=repo status=degraded task={task_uuid} error={err}"
            );
            Vec::new()
        }
    }
}

fn priority_to_db(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
        TaskPriority::Urgent => "urgent",
    }
}

fn parse_priority(value: &str) -> Option<TaskPriority> {
    match value {
        "low" => Some(TaskPriority::Low),
        "medium" => Some(TaskPriority::Medium),
        "high" => Some(TaskPriority::High),
        "urgent" => Some(TaskPriority::Urgent),
        _ => None,
    }
}

fn status_to_db(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Review => "review",
        TaskStatus::Done => "done",
    }
}

fn parse_status(value: &str) -> Option<TaskStatus> {
    match value {
        "todo" => Some(TaskStatus::Todo),
        "in_progress" => Some(TaskStatus::InProgress),
        "review" => Some(TaskStatus::Review),
        "done" => Some(TaskStatus::Done),
        _ => None,
    }
}

fn parse_uuid(value: &str, column: &'static str) -> GatewayResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GatewayError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_board_connection_ready(conn: &Connection) -> GatewayResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GatewayError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["boards", "columns", "tasks"] {
        if !table_exists(conn, table)? {
            return Err(GatewayError::MissingRequiredTable(table));
        }
    }

    for (table, columns) in [
        (
            "boards",
            &["board_uuid", "title", "description", "updated_at"][..],
        ),
        (
            "columns",
            &["column_uuid", "board_uuid", "title", "sort_order"][..],
        ),
        (
            "tasks",
            &[
                "task_uuid",
                "column_uuid",
                "title",
                "content",
                "sort_order",
                "priority",
                "status",
                "assignee",
                "due_at_ms",
                "labels",
                "checklist",
            ][..],
        ),
    ] {
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(GatewayError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> GatewayResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
