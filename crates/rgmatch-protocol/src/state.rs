//! Connection protocol states and the state-name prefix rule.
//!
//! Every server→client payload starts with the name of the connection's
//! state at the moment it is sent, followed by a space:
//!
//! ```text
//! JOINED rg-match://127.0.0.1:8007/aB
//! TURN <snapshot bytes>
//! ```
//!
//! That lets the client know which transition just happened without any
//! other bookkeeping. The prefix is applied in one place,
//! [`ConnectionState::frame`], at the point of transmission.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The per-connection protocol state.
///
/// ```text
/// CONNECTED → JOINED → STARTED → TURN ⟲ → ENDED
///      └─────────┴─────────┴───────┴────→ DISCONNECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Joined,
    Started,
    Turn,
    Ended,
    Disconnected,
}

impl ConnectionState {
    /// The state name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Joined => "JOINED",
            Self::Started => "STARTED",
            Self::Turn => "TURN",
            Self::Ended => "ENDED",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Builds an outbound payload: `<STATE> <payload>`.
    pub fn frame(self, payload: &[u8]) -> Vec<u8> {
        let name = self.as_str().as_bytes();
        let mut out = Vec::with_capacity(name.len() + 1 + payload.len());
        out.extend_from_slice(name);
        out.push(b' ');
        out.extend_from_slice(payload);
        out
    }

    /// Splits a server payload into its state prefix and the rest.
    pub fn split_reply(data: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        let (head, rest) = match data.iter().position(|b| *b == b' ') {
            Some(i) => (&data[..i], &data[i + 1..]),
            None => (data, &data[data.len()..]),
        };
        let name = std::str::from_utf8(head)
            .map_err(|_| ProtocolError::InvalidMessage("non-text state prefix".into()))?;
        Ok((name.parse()?, rest))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTED" => Ok(Self::Connected),
            "JOINED" => Ok(Self::Joined),
            "STARTED" => Ok(Self::Started),
            "TURN" => Ok(Self::Turn),
            "ENDED" => Ok(Self::Ended),
            "DISCONNECTED" => Ok(Self::Disconnected),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown state {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prefixes_state_name() {
        assert_eq!(ConnectionState::Connected.frame(b"Hello, r1"), b"CONNECTED Hello, r1");
        assert_eq!(ConnectionState::Joined.frame(b""), b"JOINED ");
    }

    #[test]
    fn test_split_reply_keeps_binary_payload_intact() {
        let framed = ConnectionState::Turn.frame(&[0, b' ', 255]);
        let (state, rest) = ConnectionState::split_reply(&framed).unwrap();
        assert_eq!(state, ConnectionState::Turn);
        assert_eq!(rest, &[0, b' ', 255]);
    }

    #[test]
    fn test_split_reply_without_payload() {
        let (state, rest) = ConnectionState::split_reply(b"ENDED").unwrap();
        assert_eq!(state, ConnectionState::Ended);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_split_reply_unknown_state() {
        assert!(ConnectionState::split_reply(b"LOBBY hi").is_err());
    }
}
