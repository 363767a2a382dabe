//! Pure mutation engine over board snapshots.
//!
//! # Responsibility
//! - Translate structural operations (move, insert, delete, field update)
//!   into new, internally consistent snapshots.
//! - Keep every transform side-effect free so the sync layer can replay
//!   operations deterministically.
//!
//! # Invariants
//! - Inputs are never mutated; failures return the original snapshot
//!   untouched by construction.
//! - Sibling positions are contiguous from zero in every returned snapshot.

pub mod mutation;
