//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for boards.
//! - Isolate SQLite query details from session/service orchestration.
//!
//! # Invariants
//! - Repository writes enforce draft validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Denied`) in
//!   addition to DB transport errors.

pub mod board_repo;
pub mod policy;

pub use board_repo::{
    BoardGateway, BoardSummary, GatewayError, GatewayResult, SqliteBoardRepository,
};
pub use policy::{AccessPolicy, AllowAllPolicy, BearerCredential};
