// Error taxonomy for the synchronization engine.

use thiserror::Error;

use crate::model::{AuctionStatus, PlayerId};

/// Coarse classification used by callers to pick a response (HTTP status on
/// the request path, log level on the real-time path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Persistence,
}

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("auction not found: {auction_id}")]
    AuctionNotFound { auction_id: String },

    #[error("player {player_id} not found in auction {auction_id}")]
    PlayerNotFound {
        auction_id: String,
        player_id: PlayerId,
    },

    #[error("player details not found for id {player_id}")]
    ProfileNotFound { player_id: PlayerId },

    #[error("team '{team_name}' not found in auction {auction_id}")]
    TeamNotFound {
        auction_id: String,
        team_name: String,
    },

    #[error("cannot change status from {from} to {to}: {reason}")]
    InvalidTransition {
        from: AuctionStatus,
        to: AuctionStatus,
        reason: String,
    },

    #[error("auction {auction_id} is completed and no longer accepts changes")]
    AuctionClosed { auction_id: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage failure: {0:#}")]
    Persistence(#[source] anyhow::Error),

    /// The player record was persisted (and broadcast) but the ledger entry
    /// could not be written. The two records now disagree.
    #[error("player {player_id} in auction {auction_id} was updated but the ledger append failed: {source:#}")]
    LedgerDivergence {
        auction_id: String,
        player_id: PlayerId,
        #[source]
        source: anyhow::Error,
    },
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::AuctionNotFound { .. }
            | AuctionError::PlayerNotFound { .. }
            | AuctionError::ProfileNotFound { .. }
            | AuctionError::TeamNotFound { .. } => ErrorKind::NotFound,
            AuctionError::InvalidTransition { .. }
            | AuctionError::AuctionClosed { .. }
            | AuctionError::Validation(_) => ErrorKind::Validation,
            AuctionError::Persistence(_) | AuctionError::LedgerDivergence { .. } => {
                ErrorKind::Persistence
            }
        }
    }
}

impl From<anyhow::Error> for AuctionError {
    fn from(err: anyhow::Error) -> Self {
        AuctionError::Persistence(err)
    }
}
