//! Codec trait and implementations for the wire schemas.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The rest of the system doesn't care HOW [`Settings`](crate::Settings),
//! [`StateSnapshot`](crate::StateSnapshot), or
//! [`ActionBatch`](crate::ActionBatch) are serialized. It just needs
//! something that implements [`Codec`].
//!
//! Two implementations ship with the crate:
//!
//! - [`BincodeCodec`]: compact binary, the default on the wire.
//! - [`JsonCodec`]: human-readable, handy when debugging a client.
//!
//! Both peers of a match must use the same codec.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec value is shared by
/// every connection task on the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, carry trailing data, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// BincodeCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses bincode's standard configuration
/// (variable-length integers, little endian).
///
/// ```rust
/// use rgmatch_protocol::{BincodeCodec, Codec, StateSnapshot};
///
/// let codec = BincodeCodec;
/// let snapshot = StateSnapshot::new(3);
/// let bytes = codec.encode(&snapshot).unwrap();
/// let decoded: StateSnapshot = codec.decode(&bytes).unwrap();
/// assert_eq!(snapshot, decoded);
/// ```
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        let (value, read) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())
                .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        // A payload is exactly one value; leftovers mean the peer and we
        // disagree about the schema.
        if read != data.len() {
            return Err(ProtocolError::Decode(format!(
                "{} trailing bytes",
                data.len() - read
            )));
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Larger than bincode, but you can read it in a packet capture.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, ActionBatch, GameSettings, Location, Robot, Settings, StateSnapshot};

    fn sample_batch() -> ActionBatch {
        let robot = Robot {
            robot_id: 11,
            location: Location::new(3, 4),
            hitpoints: 50,
            owner_slot: 0,
        };
        let mut batch = ActionBatch::new(5);
        batch.push(&robot, Action::attack(Location::new(3, 5)));
        batch.push(&robot, Action::GUARD);
        batch
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_carries_optional_target() {
        let codec = BincodeCodec;
        let bytes = codec.encode(&sample_batch()).unwrap();
        let decoded: ActionBatch = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.actions[0].action.target, Some(Location::new(3, 5)));
        assert_eq!(decoded.actions[1].action.target, None);
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_rejects_trailing_bytes() {
        let codec = BincodeCodec;
        let mut bytes = codec.encode(&StateSnapshot::new(1)).unwrap();
        bytes.push(0);
        let result: Result<StateSnapshot, _> = codec.decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_rejects_truncated_payload() {
        let codec = BincodeCodec;
        let settings = Settings {
            game: GameSettings {
                board_size: 19,
                obstacles: vec![Location::new(0, 0); 4],
                spawns: vec![Location::new(1, 1); 4],
                spawn_period: 10,
                player_count: 2,
                spawn_amount: 5,
                max_turns: 100,
            },
            player_slot: 1,
        };
        let bytes = codec.encode(&settings).unwrap();
        let result: Result<Settings, _> = codec.decode(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }

    #[cfg(all(feature = "bincode", feature = "json"))]
    #[test]
    fn test_bincode_is_smaller_than_json() {
        let batch = sample_batch();
        let bin = BincodeCodec.encode(&batch).unwrap();
        let json = JsonCodec.encode(&batch).unwrap();
        assert!(bin.len() < json.len());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_shape_of_action() {
        let bytes = JsonCodec.encode(&Action::move_to(Location::new(1, 2))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "MOVE");
        assert_eq!(value["target"]["x"], 1);
        assert_eq!(value["target"]["y"], 2);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_decode_garbage_fails() {
        let result: Result<ActionBatch, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
