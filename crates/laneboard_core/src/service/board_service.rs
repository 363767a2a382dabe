//! Board lifecycle use-case service.
//!
//! # Responsibility
//! - Validate board-level input above the gateway layer.
//! - Provide create, fetch, list and delete operations outside a session.
//!
//! # Invariants
//! - Board titles are non-blank after trimming.
//! - Board ids are generated client-side before the first write.

use crate::model::board::{Board, BoardId, BoardSnapshot};
use crate::repo::board_repo::{BoardGateway, BoardSummary, GatewayError};
use crate::repo::policy::BearerCredential;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from board lifecycle operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Target board does not exist.
    BoardNotFound(BoardId),
    /// The credential is not allowed to mutate the target board.
    Denied(BoardId),
    /// Gateway-level failure.
    Gateway(GatewayError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "board title must not be blank"),
            Self::BoardNotFound(uuid) => write!(f, "board not found: {uuid}"),
            Self::Denied(uuid) => write!(f, "mutation denied for board: {uuid}"),
            Self::Gateway(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::BoardNotFound(board_uuid) => Self::BoardNotFound(board_uuid),
            GatewayError::Denied(board_uuid) => Self::Denied(board_uuid),
            other => Self::Gateway(other),
        }
    }
}

/// Board lifecycle service facade.
pub struct BoardService<G: BoardGateway> {
    gateway: G,
}

impl<G: BoardGateway> BoardService<G> {
    /// Creates service from a gateway implementation.
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Creates one empty board with a generated id.
    pub fn create_board(
        &self,
        credential: &BearerCredential,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<Board, ServiceError> {
        let normalized = normalize_title(title.into())?;
        let description = description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let board = Board::new(normalized, description);
        self.gateway.create_board(credential, &board)?;
        Ok(board)
    }

    /// Loads one board with its ordered columns and tasks.
    pub fn get_board(&self, board_uuid: BoardId) -> Result<BoardSnapshot, ServiceError> {
        self.gateway.fetch_board(board_uuid).map_err(Into::into)
    }

    /// Lists all boards in creation order with column/task counts.
    pub fn list_boards(&self) -> Result<Vec<BoardSummary>, ServiceError> {
        self.gateway.list_boards().map_err(Into::into)
    }

    /// Deletes one board; storage cascade removes its columns and tasks.
    pub fn delete_board(
        &self,
        credential: &BearerCredential,
        board_uuid: BoardId,
    ) -> Result<(), ServiceError> {
        self.gateway
            .delete_board(credential, board_uuid)
            .map_err(Into::into)
    }
}

fn normalize_title(value: String) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
