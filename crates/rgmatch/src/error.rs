//! Unified error types for rgmatch.

use rgmatch_game::MatchError;
use rgmatch_protocol::ProtocolError;
use rgmatch_transport::TransportError;

/// Top-level server error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, framing, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, state violation).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A match-level error (full, not found, engine failure).
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Why the reference client stopped before the match ended.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server turned the client away (full server, failed join or
    /// create, aborted match).
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The server sent something that doesn't fit the current step.
    #[error("unexpected reply: {0}")]
    Unexpected(String),

    /// The connection closed before `ENDED`.
    #[error("connection lost before the match ended")]
    ConnectionLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::from(rgmatch_transport::FramingError::MultipleUnits);
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Transport(_)));
        assert!(server_err.to_string().contains("multiple units"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_from_match_error() {
        let id = rgmatch_protocol::MatchId::parse("ab").unwrap();
        let server_err: ServerError = MatchError::NotFound(id).into();
        assert!(matches!(server_err, ServerError::Match(_)));
    }
}
