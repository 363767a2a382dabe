//! Mutation authorization boundary.
//!
//! # Responsibility
//! - Decide whether a presented credential may mutate a given board.
//!
//! # Invariants
//! - Policy checks are side-effect free; the gateway calls them before
//!   issuing any write.

use crate::model::board::BoardId;

/// Opaque bearer credential attached to every mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    /// Wraps a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value, for policy implementations.
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// Authorization decision for board mutations. Session handling lives
/// outside the core; implementations only answer allowed/denied.
pub trait AccessPolicy: Send + Sync {
    fn allow_mutation(&self, credential: &BearerCredential, board_uuid: BoardId) -> bool;
}

/// Accepts every credential. Default for single-user deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

impl AccessPolicy for AllowAllPolicy {
    fn allow_mutation(&self, _credential: &BearerCredential, _board_uuid: BoardId) -> bool {
        true
    }
}
