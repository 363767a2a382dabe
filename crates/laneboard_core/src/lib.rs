//! Core domain logic for LaneBoard.
//! This crate is the single source of truth for board ordering and sync
//! invariants.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use db::{open_db, open_db_in_memory};
pub use engine::mutation::{apply_op, MutationError, MutationResult, StructuralOp};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::board::{
    Board, BoardId, BoardSnapshot, ChecklistItem, Column, ColumnDraft, ColumnId, Task, TaskDraft,
    TaskFields, TaskId, TaskPriority, TaskStatus, ValidationError,
};
pub use repo::board_repo::{
    BoardGateway, BoardSummary, GatewayError, GatewayResult, SqliteBoardRepository,
};
pub use repo::policy::{AccessPolicy, AllowAllPolicy, BearerCredential};
pub use service::board_service::{BoardService, ServiceError};
pub use sync::controller::{
    FailureNotice, FailureReason, OpId, SessionController, SessionObserver, SessionState,
    Submission,
};
pub use sync::session::{BoardSession, SessionConfig, SessionError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
