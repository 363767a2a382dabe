//! Client-side board synchronization.
//!
//! # Responsibility
//! - Own the live snapshot for one open board and apply user operations
//!   optimistically ahead of gateway confirmation.
//! - Reconcile gateway outcomes and periodic refresh reads with the
//!   pending-operation log.
//!
//! # Invariants
//! - The visible snapshot always equals the confirmed snapshot with every
//!   pending operation replayed in submission order.
//! - Every failure path returns the session to a consistent state; no
//!   half-applied snapshot is ever observable.

pub mod controller;
pub mod session;

pub use controller::{
    FailureNotice, FailureReason, OpId, SessionController, SessionObserver, SessionState,
    Submission,
};
pub use session::{BoardSession, SessionConfig, SessionError};
