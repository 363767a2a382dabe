//! Gateway-driving board session.
//!
//! # Responsibility
//! - Own one open board: a gateway handle, a credential and the optimistic
//!   [`SessionController`] state.
//! - Dispatch queued operations, fold gateway outcomes back into the
//!   controller and run the periodic refresh cycle.
//!
//! # Invariants
//! - A submission either resolves locally (validation, no-op) or produces
//!   exactly one gateway call.
//! - A failed refresh never touches optimistic state; the fetch is retried
//!   on the next cycle.

use crate::engine::mutation::{MutationError, StructuralOp};
use crate::model::board::{
    BoardId, BoardSnapshot, ColumnDraft, ColumnId, TaskDraft, TaskFields, TaskId,
};
use crate::repo::board_repo::{BoardGateway, GatewayError};
use crate::repo::policy::BearerCredential;
use crate::sync::controller::{
    FailureNotice, FailureReason, SessionController, SessionObserver, SessionState, Submission,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::{Duration, Instant};

/// Timing knobs of one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Delay between periodic full refreshes.
    pub refresh_interval: Duration,
    /// Ceiling on one gateway call before the operation is abandoned.
    pub dispatch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            dispatch_timeout: Duration::from_secs(10),
        }
    }
}

/// Failure surfaced by a session call.
#[derive(Debug)]
pub enum SessionError {
    /// The operation was rejected locally before any gateway call.
    Mutation(MutationError),
    /// A gateway call outside the pending-operation path failed.
    Gateway(GatewayError),
    /// A submitted operation was rejected by the gateway and has been
    /// reverted locally.
    OperationFailed(FailureNotice),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mutation(err) => write!(f, "{err}"),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::OperationFailed(notice) => write!(f, "{notice}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mutation(err) => Some(err),
            Self::Gateway(err) => Some(err),
            Self::OperationFailed(notice) => match &notice.reason {
                FailureReason::Gateway(err) => Some(err),
                FailureReason::ReplayFailed(err) => Some(err),
                FailureReason::TimedOut { .. } => None,
            },
        }
    }
}

impl From<MutationError> for SessionError {
    fn from(value: MutationError) -> Self {
        Self::Mutation(value)
    }
}

impl From<GatewayError> for SessionError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

/// One client's live view of one board.
///
/// Mutations apply to the local snapshot immediately and are pushed to the
/// gateway in submission order; the periodic refresh folds in changes made
/// by other clients while keeping pending local values on top.
pub struct BoardSession<G: BoardGateway> {
    gateway: G,
    credential: BearerCredential,
    board_uuid: BoardId,
    controller: SessionController,
    config: SessionConfig,
    last_refresh_at: Instant,
}

impl<G: BoardGateway> Debug for BoardSession<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("board_uuid", &self.board_uuid)
            .field("config", &self.config)
            .field("last_refresh_at", &self.last_refresh_at)
            .finish_non_exhaustive()
    }
}

impl<G: BoardGateway> BoardSession<G> {
    /// Opens a session by fetching the current board state.
    pub fn open(
        gateway: G,
        credential: BearerCredential,
        board_uuid: BoardId,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let initial = match gateway.fetch_board(board_uuid) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!(
                    "event=session_open module=sync status=error board={board_uuid} error_code=fetch_failed error={err}"
                );
                return Err(SessionError::Gateway(err));
            }
        };
        info!("event=session_open module=sync status=ok board={board_uuid}");
        Ok(Self {
            gateway,
            credential,
            board_uuid,
            controller: SessionController::new(initial, config.dispatch_timeout),
            config,
            last_refresh_at: Instant::now(),
        })
    }

    pub fn board_uuid(&self) -> BoardId {
        self.board_uuid
    }

    /// Underlying gateway handle.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Current optimistic snapshot.
    pub fn snapshot(&self) -> &BoardSnapshot {
        self.controller.visible()
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn pending_count(&self) -> usize {
        self.controller.pending_count()
    }

    /// Registers a change observer on the underlying controller.
    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.controller.subscribe(observer);
    }

    /// Applies one structural operation optimistically and pushes it to the
    /// gateway.
    ///
    /// [`Submission::NoChange`] means the snapshot was already in the
    /// requested state and no gateway call was made. A gateway rejection
    /// reverts the operation locally and surfaces as
    /// [`SessionError::OperationFailed`].
    pub fn submit(&mut self, op: StructuralOp) -> Result<Submission, SessionError> {
        let submission = self.controller.submit(op)?;
        if matches!(submission, Submission::NoChange) {
            return Ok(submission);
        }
        self.pump()?;
        Ok(submission)
    }

    pub fn move_task(
        &mut self,
        task_uuid: TaskId,
        to_column_uuid: ColumnId,
        to_index: usize,
    ) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::MoveTask {
            task_uuid,
            to_column_uuid,
            to_index,
        })
    }

    pub fn move_column(
        &mut self,
        column_uuid: ColumnId,
        to_index: usize,
    ) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::MoveColumn {
            column_uuid,
            to_index,
        })
    }

    pub fn insert_task(
        &mut self,
        column_uuid: ColumnId,
        draft: TaskDraft,
        at_index: Option<usize>,
    ) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::InsertTask {
            column_uuid,
            draft,
            at_index,
        })
    }

    pub fn insert_column(
        &mut self,
        draft: ColumnDraft,
        at_index: Option<usize>,
    ) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::InsertColumn { draft, at_index })
    }

    pub fn delete_task(&mut self, task_uuid: TaskId) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::DeleteTask { task_uuid })
    }

    pub fn delete_column(&mut self, column_uuid: ColumnId) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::DeleteColumn { column_uuid })
    }

    pub fn update_task_fields(
        &mut self,
        task_uuid: TaskId,
        fields: TaskFields,
    ) -> Result<Submission, SessionError> {
        self.submit(StructuralOp::UpdateTaskFields { task_uuid, fields })
    }

    /// Advances session time: abandons overdue gateway calls and runs the
    /// periodic refresh once the interval has elapsed.
    ///
    /// Returns a notice per operation abandoned during this tick.
    pub fn tick(&mut self, now: Instant) -> Vec<FailureNotice> {
        let mut notices = self.controller.expire_overdue(now);
        if now.duration_since(self.last_refresh_at) >= self.config.refresh_interval {
            notices.extend(self.refresh_at(now));
        }
        notices
    }

    /// Fetches the board now and merges it under pending local operations.
    pub fn refresh(&mut self) -> Vec<FailureNotice> {
        self.refresh_at(Instant::now())
    }

    fn refresh_at(&mut self, now: Instant) -> Vec<FailureNotice> {
        self.last_refresh_at = now;
        self.controller.begin_refresh();
        match self.gateway.fetch_board(self.board_uuid) {
            Ok(fetched) => self.controller.complete_refresh(fetched),
            Err(err) => {
                warn!(
                    "event=refresh module=sync status=failed board={} error={err}",
                    self.board_uuid
                );
                self.controller.fail_refresh();
                Vec::new()
            }
        }
    }

    /// Pushes queued operations to the gateway in submission order.
    fn pump(&mut self) -> Result<(), SessionError> {
        while let Some((op_id, op)) = self.controller.next_dispatch(Instant::now()) {
            match self.gateway.apply(&self.credential, self.board_uuid, &op) {
                Ok(()) => self.controller.confirm(op_id),
                Err(err) => {
                    warn!(
                        "event=apply_op module=sync status=failed board={} op={} error={err}",
                        self.board_uuid,
                        op.kind()
                    );
                    let mut notices = self.controller.fail(op_id, FailureReason::Gateway(err));
                    if notices.is_empty() {
                        continue;
                    }
                    return Err(SessionError::OperationFailed(notices.remove(0)));
                }
            }
        }
        Ok(())
    }
}
