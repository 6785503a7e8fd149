//! Error types for the protocol layer.
//!
//! Two enums live here because they have very different consequences:
//!
//! - [`ProtocolError`] is fatal. The peer sent something that can't be
//!   interpreted at all (bad bytes, a command that is illegal in the
//!   current state). The connection is closed.
//! - [`CommandError`] is recoverable. The command was recognized but its
//!   arguments were wrong. The server replies with the error's text and
//!   the connection stays where it was.

use crate::ConnectionState;

/// Fatal errors in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(String),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: truncated payloads, trailing garbage, or a payload
    /// produced by a different codec.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The message decoded fine but breaks a protocol rule, such as an
    /// action batch for the wrong turn.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The command is not accepted in the connection's current state.
    #[error("{input:?} is not valid in state {state}")]
    Violation {
        state: ConnectionState,
        input: String,
    },

    /// A match URI could not be parsed.
    #[error("invalid match uri: {0}")]
    InvalidUri(String),
}

/// Recoverable command errors.
///
/// The `#[error]` text of each variant is exactly what gets sent back to
/// the client, so keep these in sync with the command grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A `CREATE` option token did not contain exactly one `=`.
    #[error("Malformed option syntax")]
    MalformedOption,

    /// `CREATE` without a `num_players` option.
    #[error("Missing num_players option")]
    MissingNumPlayers,

    /// `num_players` was not an integer in the supported range.
    #[error("Invalid num_players value")]
    InvalidNumPlayers,

    /// `max_turns` was not an integer in the allowed range.
    #[error("Invalid max_turns value")]
    InvalidMaxTurns,
}
