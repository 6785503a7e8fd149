//! Error types for the match layer.

use rgmatch_protocol::MatchId;
use rgmatch_transport::ConnectionId;

use crate::EngineError;

/// Errors that can occur during match operations.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// No live match has this id.
    #[error("match {0} not found")]
    NotFound(MatchId),

    /// Every slot is taken.
    #[error("match {0} is full")]
    Full(MatchId),

    /// `START` before every slot is taken.
    #[error("match {0} is not full")]
    NotFull(MatchId),

    /// The connection already holds a slot in this match.
    #[error("{0} already in match {1}")]
    AlreadyJoined(ConnectionId, MatchId),

    /// The connection does not hold a slot in this match.
    #[error("{0} not in match {1}")]
    NotMember(ConnectionId, MatchId),

    /// The match is in a phase that doesn't allow this operation.
    #[error("invalid match phase for this operation: {0}")]
    InvalidState(String),

    /// A submitted action batch failed validation.
    #[error("invalid action batch: {0}")]
    InvalidActions(String),

    /// The engine could not produce a snapshot. The match is aborted.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The match actor is gone (finished or aborted).
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),
}
