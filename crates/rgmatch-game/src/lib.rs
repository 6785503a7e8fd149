//! Match lifecycle management for rgmatch.
//!
//! Each match runs as an isolated Tokio task (actor model) that owns its
//! roster, turn counter and pending actions. Connections talk to it only
//! through a [`MatchHandle`]; it talks back only through [`MatchEvent`]s.
//!
//! # Key types
//!
//! - [`Engine`]: the game rules, consumed through two calls
//! - [`MatchRegistry`]: creates matches, hands out ids, looks them up
//! - [`MatchHandle`]: send commands to a running match actor
//! - [`MatchPhase`]: lifecycle state machine
//! - [`MatchConfig`]: capacity and turn limit

mod config;
mod engine;
mod error;
mod orchestrator;
mod registry;

pub use config::{MatchConfig, MatchPhase};
pub use engine::{Engine, EngineError};
pub use error::MatchError;
pub use orchestrator::{
    MatchEvent, MatchHandle, MatchInfo, MemberInfo, MemberSender, Seat, StartOutcome,
    SubmitOutcome, TerminateReason, sanitize_actions,
};
pub use registry::{IdGenerator, MatchRegistry};
