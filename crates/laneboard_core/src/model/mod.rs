//! Kanban domain model: boards, columns, tasks and their total order.
//!
//! # Responsibility
//! - Define the canonical value types shared by the mutation engine, the
//!   persistence gateway and the synchronization controller.
//! - Expose pure ordering queries used to validate snapshot invariants.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID generated client-side.
//! - Sibling positions (`sort_order`) are zero-based, unique and contiguous
//!   after every completed mutation.

pub mod board;
pub mod ordering;
