//! Optimistic session state machine.
//!
//! # Responsibility
//! - Track confirmed and visible snapshots plus the pending-operation log.
//! - Decide dispatch order, fold confirmations, and rebuild optimistic
//!   state deterministically after failures and refreshes.
//!
//! # Invariants
//! - Pending operations are dispatched and folded in submission order;
//!   out-of-order gateway completions wait at the queue front.
//! - Revert and refresh reconciliation are the same mechanism: replay the
//!   surviving pending operations on top of a new confirmed base.
//!
//! Time never comes from the ambient clock here; callers pass `Instant`
//! values in, which keeps timeout behavior testable.

use crate::engine::mutation::{apply_op, MutationError, MutationResult, StructuralOp};
use crate::model::board::BoardSnapshot;
use crate::repo::board_repo::GatewayError;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Session-local operation identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

impl Display for OpId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Dispatch lifecycle of one pending operation.
#[derive(Debug, Clone, Copy)]
enum OpPhase {
    /// Applied locally, not yet handed to the gateway.
    Queued,
    /// Gateway call outstanding since the recorded instant.
    InFlight { since: Instant },
    /// Gateway confirmed; waiting for earlier operations to fold first.
    Confirmed,
}

#[derive(Debug, Clone)]
struct PendingOp {
    id: OpId,
    op: StructuralOp,
    /// Snapshot after this operation on top of the pending prefix.
    applied: BoardSnapshot,
    phase: OpPhase,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No gateway call outstanding.
    Idle,
    /// The oldest in-flight operation.
    Syncing(OpId),
    /// A refresh fetch is outstanding and will be merged on completion.
    Reconciling,
}

/// Why a pending operation was abandoned.
#[derive(Debug)]
pub enum FailureReason {
    /// The gateway rejected the write.
    Gateway(GatewayError),
    /// The gateway call did not resolve within the dispatch timeout.
    TimedOut { waited: Duration },
    /// The operation no longer applies after an earlier failure or a
    /// refresh changed its base state.
    ReplayFailed(MutationError),
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway(err) => write!(f, "{err}"),
            Self::TimedOut { waited } => {
                write!(f, "gateway call timed out after {}ms", waited.as_millis())
            }
            Self::ReplayFailed(err) => write!(f, "no longer applicable: {err}"),
        }
    }
}

/// User-visible record of one abandoned operation.
#[derive(Debug)]
pub struct FailureNotice {
    pub op_id: OpId,
    pub op: StructuralOp,
    pub reason: FailureReason,
}

impl Display for FailureNotice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation {} ({}) failed: {}", self.op_id, self.op.kind(), self.reason)
    }
}

/// Change notification hooks for the UI layer. All methods default to
/// no-ops so adapters implement only what they render.
pub trait SessionObserver {
    /// The visible snapshot was replaced.
    fn snapshot_changed(&self, _snapshot: &BoardSnapshot) {}
    /// One operation was confirmed by the gateway.
    fn operation_confirmed(&self, _op_id: OpId) {}
    /// One operation was abandoned.
    fn operation_failed(&self, _notice: &FailureNotice) {}
}

/// Outcome of submitting one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Applied optimistically and queued for dispatch.
    Queued(OpId),
    /// The operation would not change the snapshot; nothing was queued and
    /// no gateway call is needed.
    NoChange,
}

/// Pending-operation log and snapshot owner for one open board.
///
/// The controller performs no I/O. A driver feeds it gateway outcomes via
/// [`SessionController::confirm`], [`SessionController::fail`] and the
/// refresh methods.
pub struct SessionController {
    confirmed: BoardSnapshot,
    visible: BoardSnapshot,
    pending: VecDeque<PendingOp>,
    next_op_id: u64,
    dispatch_timeout: Duration,
    reconciling: bool,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionController {
    /// Creates a controller over a freshly fetched snapshot.
    pub fn new(initial: BoardSnapshot, dispatch_timeout: Duration) -> Self {
        Self {
            visible: initial.clone(),
            confirmed: initial,
            pending: VecDeque::new(),
            next_op_id: 0,
            dispatch_timeout,
            reconciling: false,
            observers: Vec::new(),
        }
    }

    /// Registers a change observer.
    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Current optimistic snapshot.
    pub fn visible(&self) -> &BoardSnapshot {
        &self.visible
    }

    /// Last snapshot fully confirmed by the gateway.
    pub fn confirmed(&self) -> &BoardSnapshot {
        &self.confirmed
    }

    /// Number of operations awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn state(&self) -> SessionState {
        if self.reconciling {
            return SessionState::Reconciling;
        }
        let in_flight = self
            .pending
            .iter()
            .find(|entry| matches!(entry.phase, OpPhase::InFlight { .. }));
        match in_flight {
            Some(entry) => SessionState::Syncing(entry.id),
            None => SessionState::Idle,
        }
    }

    /// Applies one operation optimistically on top of the visible snapshot
    /// and queues it for dispatch.
    ///
    /// A `NotFound` or validation failure resolves locally; nothing is
    /// queued and no gateway call will be issued. An operation that leaves
    /// the snapshot structurally unchanged reports [`Submission::NoChange`]
    /// so callers can skip the network round trip.
    pub fn submit(&mut self, op: StructuralOp) -> MutationResult<Submission> {
        let candidate = apply_op(&self.visible, &op)?;
        if candidate == self.visible {
            return Ok(Submission::NoChange);
        }

        self.next_op_id += 1;
        let op_id = OpId(self.next_op_id);
        self.pending.push_back(PendingOp {
            id: op_id,
            op,
            applied: candidate.clone(),
            phase: OpPhase::Queued,
        });
        self.visible = candidate;
        self.notify_snapshot();
        Ok(Submission::Queued(op_id))
    }

    /// Hands the oldest queued operation to the driver, marking it in
    /// flight as of `now`. Returns `None` when nothing is waiting.
    pub fn next_dispatch(&mut self, now: Instant) -> Option<(OpId, StructuralOp)> {
        let entry = self
            .pending
            .iter_mut()
            .find(|entry| matches!(entry.phase, OpPhase::Queued))?;
        entry.phase = OpPhase::InFlight { since: now };
        Some((entry.id, entry.op.clone()))
    }

    /// Records gateway success for one operation. Confirmed operations
    /// fold into the confirmed snapshot once everything before them has
    /// folded, preserving submission order.
    pub fn confirm(&mut self, op_id: OpId) {
        let Some(entry) = self.pending.iter_mut().find(|entry| entry.id == op_id) else {
            return;
        };
        entry.phase = OpPhase::Confirmed;
        for observer in &self.observers {
            observer.operation_confirmed(op_id);
        }
        self.drain_confirmed_front();
    }

    /// Records gateway failure for one operation: the operation is removed
    /// from the pending log and the optimistic state is rebuilt by replay.
    ///
    /// Later pending operations that no longer apply without it are
    /// abandoned too; every abandoned operation gets its own notice.
    /// Returns the notices, failed operation first.
    pub fn fail(&mut self, op_id: OpId, reason: FailureReason) -> Vec<FailureNotice> {
        let Some(position) = self.pending.iter().position(|entry| entry.id == op_id) else {
            return Vec::new();
        };
        let Some(entry) = self.pending.remove(position) else {
            return Vec::new();
        };

        let mut notices = vec![FailureNotice {
            op_id,
            op: entry.op,
            reason,
        }];
        notices.extend(self.rebuild_pending(false));
        self.drain_confirmed_front();
        self.notify_snapshot();
        for notice in &notices {
            self.notify_failure(notice);
        }
        notices
    }

    /// Fails every in-flight operation whose gateway call has exceeded the
    /// dispatch timeout as of `now`.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<FailureNotice> {
        let mut notices = Vec::new();
        loop {
            let overdue = self.pending.iter().find_map(|entry| match entry.phase {
                OpPhase::InFlight { since } => {
                    let waited = now.duration_since(since);
                    (waited >= self.dispatch_timeout).then_some((entry.id, waited))
                }
                _ => None,
            });
            let Some((op_id, waited)) = overdue else {
                break;
            };
            notices.extend(self.fail(op_id, FailureReason::TimedOut { waited }));
        }
        notices
    }

    /// Marks a refresh fetch as outstanding.
    pub fn begin_refresh(&mut self) {
        self.reconciling = true;
    }

    /// Clears the refresh marker after a failed fetch; pending state is
    /// untouched.
    pub fn fail_refresh(&mut self) {
        self.reconciling = false;
    }

    /// Merges a fetched snapshot: the fetch becomes the confirmed base and
    /// every pending operation is replayed on top, so entities touched by
    /// pending operations keep their optimistic values while everything
    /// else adopts the fetched state.
    ///
    /// A pending insert already visible in the fetch is dropped silently
    /// (its effect is on the server). A pending operation whose target was
    /// removed remotely is abandoned with a notice.
    pub fn complete_refresh(&mut self, fetched: BoardSnapshot) -> Vec<FailureNotice> {
        self.confirmed = fetched;
        let notices = self.rebuild_pending(true);
        self.drain_confirmed_front();
        self.reconciling = false;
        self.notify_snapshot();
        for notice in &notices {
            self.notify_failure(notice);
        }
        notices
    }

    fn drain_confirmed_front(&mut self) {
        while self
            .pending
            .front()
            .is_some_and(|entry| matches!(entry.phase, OpPhase::Confirmed))
        {
            if let Some(entry) = self.pending.pop_front() {
                self.confirmed = entry.applied;
            }
        }
    }

    /// Replays the pending log over the confirmed base, recomputing each
    /// intermediate snapshot. Operations that fail to replay are dropped;
    /// duplicates are dropped silently when `silent_duplicates` is set.
    fn rebuild_pending(&mut self, silent_duplicates: bool) -> Vec<FailureNotice> {
        let mut notices = Vec::new();
        let mut base = self.confirmed.clone();
        let mut kept = VecDeque::with_capacity(self.pending.len());
        for mut entry in std::mem::take(&mut self.pending) {
            match apply_op(&base, &entry.op) {
                Ok(applied) => {
                    base = applied.clone();
                    entry.applied = applied;
                    kept.push_back(entry);
                }
                Err(MutationError::DuplicateId(_)) if silent_duplicates => {}
                Err(err) => {
                    notices.push(FailureNotice {
                        op_id: entry.id,
                        op: entry.op,
                        reason: FailureReason::ReplayFailed(err),
                    });
                }
            }
        }
        self.pending = kept;
        self.visible = base;
        notices
    }

    fn notify_snapshot(&self) {
        for observer in &self.observers {
            observer.snapshot_changed(&self.visible);
        }
    }

    fn notify_failure(&self, notice: &FailureNotice) {
        for observer in &self.observers {
            observer.operation_failed(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OpId, SessionController, SessionState, Submission};
    use crate::engine::mutation::StructuralOp;
    use crate::model::board::{Board, BoardSnapshot, ColumnDraft, TaskDraft};
    use std::time::{Duration, Instant};

    fn empty_snapshot() -> BoardSnapshot {
        BoardSnapshot::new(Board::new("Sprint", None))
    }

    fn controller() -> SessionController {
        SessionController::new(empty_snapshot(), Duration::from_secs(10))
    }

    #[test]
    fn op_id_display_is_stable() {
        assert_eq!(OpId(7).to_string(), "op-7");
    }

    #[test]
    fn submit_assigns_increasing_op_ids() {
        let mut controller = controller();
        let first = controller
            .submit(StructuralOp::InsertColumn {
                draft: ColumnDraft::new("Todo"),
                at_index: None,
            })
            .unwrap();
        let second = controller
            .submit(StructuralOp::InsertColumn {
                draft: ColumnDraft::new("Doing"),
                at_index: None,
            })
            .unwrap();
        let (Submission::Queued(a), Submission::Queued(b)) = (first, second) else {
            panic!("both submissions should queue");
        };
        assert!(a < b);
        assert_eq!(controller.pending_count(), 2);
    }

    #[test]
    fn dispatch_marks_oldest_queued_and_state_follows() {
        let mut controller = controller();
        let draft = ColumnDraft::new("Todo");
        controller
            .submit(StructuralOp::InsertColumn {
                draft: draft.clone(),
                at_index: None,
            })
            .unwrap();
        assert_eq!(controller.state(), SessionState::Idle);

        let (op_id, op) = controller.next_dispatch(Instant::now()).unwrap();
        assert_eq!(
            op,
            StructuralOp::InsertColumn {
                draft,
                at_index: None,
            }
        );
        assert_eq!(controller.state(), SessionState::Syncing(op_id));

        controller.confirm(op_id);
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.pending_count(), 0);
        assert_eq!(controller.confirmed(), controller.visible());
    }

    #[test]
    fn submit_against_missing_task_is_local_error() {
        let mut controller = controller();
        let err = controller
            .submit(StructuralOp::DeleteTask {
                task_uuid: TaskDraft::new("ghost").uuid,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::engine::mutation::MutationError::TaskNotFound(_)
        ));
        assert_eq!(controller.pending_count(), 0);
    }
}
