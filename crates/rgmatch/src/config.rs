//! Server configuration.

use std::time::Duration;

use rgmatch_protocol::CommandError;
use rgmatch_transport::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

/// Turn limits applied to `CREATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDefaults {
    /// Used when `CREATE` has no `max_turns` option.
    pub max_turns: u32,

    /// Largest `max_turns` a client may ask for.
    pub max_turns_limit: u32,
}

impl MatchDefaults {
    /// Picks the turn limit for a new match.
    ///
    /// # Errors
    /// [`CommandError::InvalidMaxTurns`] if `requested` is outside
    /// `1..=max_turns_limit`.
    pub fn max_turns_for(&self, requested: Option<u32>) -> Result<u32, CommandError> {
        match requested {
            None => Ok(self.max_turns),
            Some(n) if (1..=self.max_turns_limit).contains(&n) => Ok(n),
            Some(_) => Err(CommandError::InvalidMaxTurns),
        }
    }
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            max_turns: 100,
            max_turns_limit: 1000,
        }
    }
}

/// Everything the server needs besides the engine and codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host advertised in match URIs. Also the bind address.
    pub host: String,

    /// Port to listen on. `0` picks a free port; URIs then carry the
    /// port actually bound.
    pub port: u16,

    /// Open connections beyond this are greeted, told the server is full
    /// and closed.
    pub max_connections: usize,

    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,

    /// Largest inbound payload accepted.
    pub max_frame_len: usize,

    pub matches: MatchDefaults,
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8007,
            max_connections: 8,
            idle_timeout: Duration::from_secs(65536),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            matches: MatchDefaults::default(),
        }
    }
}
