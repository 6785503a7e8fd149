//! Wire protocol for rgmatch.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Commands** ([`Command`], [`CreateOptions`]): the text grammar a
//!   client sends inside each framed unit.
//! - **States** ([`ConnectionState`]): the per-connection protocol state
//!   whose name prefixes every server payload.
//! - **Schemas** ([`Settings`], [`StateSnapshot`], [`ActionBatch`]): the
//!   structured messages carried as binary payloads.
//! - **Codecs** ([`Codec`], [`BincodeCodec`], [`JsonCodec`]): how those
//!   schemas become bytes.
//! - **Errors** ([`ProtocolError`], [`CommandError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (framed bytes) → Protocol (Command / schemas) → Match orchestration
//! ```
//!
//! The protocol layer knows nothing about sockets or matches.

mod codec;
mod command;
mod error;
mod state;
mod types;
mod uri;

#[cfg(feature = "bincode")]
pub use codec::BincodeCodec;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::{Command, CreateOptions};
pub use error::{CommandError, ProtocolError};
pub use state::ConnectionState;
pub use types::{
    Action, ActionBatch, ActionKind, ActionSet, GameSettings, Location, MatchId, Robot,
    RobotAction, Settings, Slot, StateSnapshot,
};
pub use uri::{MATCH_SCHEME, MatchUri};
