//! # rgmatch
//!
//! A server that hosts turn-based robot matches between remote clients.
//!
//! Clients speak a small text protocol over netstring-framed TCP. Every
//! server reply starts with the client's connection state
//! (`CONNECTED`, `JOINED`, `STARTED`, `TURN`, `ENDED`, `DISCONNECTED`).
//! Game rules are plugged in through the [`Engine`](rgmatch_game::Engine)
//! trait; wire schemas are encoded with any [`Codec`](rgmatch_protocol::Codec).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rgmatch::prelude::*;
//!
//! // Implement Engine for your rules, then:
//! // let server = MatchServerBuilder::new()
//! //     .bind("0.0.0.0", 8007)
//! //     .build(MyEngine, BincodeCodec)
//! //     .await?;
//! // server.run().await
//! ```

mod client;
mod config;
mod error;
mod handler;
mod server;

pub use client::{Brain, GuardBrain, MatchClient, MatchReport};
pub use config::{MatchDefaults, ServerConfig};
pub use error::{ClientError, ServerError};
pub use server::{MatchServer, MatchServerBuilder};

/// Everything needed to run a server or client.
pub mod prelude {
    pub use crate::{
        Brain, ClientError, GuardBrain, MatchClient, MatchDefaults, MatchReport, MatchServer,
        MatchServerBuilder, ServerConfig, ServerError,
    };
    pub use rgmatch_game::{Engine, EngineError, MatchConfig, MatchPhase, MatchRegistry};
    #[cfg(feature = "bincode")]
    pub use rgmatch_protocol::BincodeCodec;
    #[cfg(feature = "json")]
    pub use rgmatch_protocol::JsonCodec;
    pub use rgmatch_protocol::{
        Action, ActionBatch, ActionKind, ActionSet, Codec, ConnectionState, GameSettings,
        Location, MatchId, MatchUri, Robot, RobotAction, Settings, Slot, StateSnapshot,
    };
}
