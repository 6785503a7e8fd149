//! The `Engine` trait: the boundary to the game rules.
//!
//! The match layer never looks inside a snapshot beyond robot ownership.
//! Board geometry, movement, combat and spawning all live behind this
//! trait and are called at exactly two points: once when the match starts
//! and once per resolved turn.

use rgmatch_protocol::{ActionSet, GameSettings, StateSnapshot};

/// Failure inside the engine. Fatal to the match that hit it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("engine failure: {0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Turn-resolution rules for a match.
///
/// One engine value is shared by every match on the server, so it must be
/// `Send + Sync` and should be stateless or internally synchronized.
/// Resolution is expected to be deterministic; a failed call is never
/// retried.
pub trait Engine: Send + Sync + 'static {
    /// Builds the shared settings for a new match.
    fn game_settings(&self, player_count: u8, max_turns: u32) -> GameSettings;

    /// Produces the spawn-phase snapshot when the match starts.
    fn initial_state(&self, settings: &GameSettings) -> Result<StateSnapshot, EngineError>;

    /// Applies one turn of combined actions to `state`.
    ///
    /// `actions` holds exactly one entry per robot on the board, keyed by
    /// the robot's location. The returned snapshot's `turn` field is
    /// overwritten by the match.
    fn resolve(
        &self,
        settings: &GameSettings,
        state: &StateSnapshot,
        actions: &ActionSet,
    ) -> Result<StateSnapshot, EngineError>;
}
