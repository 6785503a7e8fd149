//! Match configuration and phase machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Per-match parameters fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Number of player slots (1 or 2).
    pub capacity: u8,

    /// The match finishes once the turn counter exceeds this.
    pub max_turns: u32,
}

impl MatchConfig {
    pub fn new(capacity: u8) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            max_turns: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a match.
///
/// Phases only move forward:
///
/// ```text
/// Forming → Ready → Running → Finished
///    └────────┴────────┴────→ Aborted
/// ```
///
/// - **Forming**: accepting joins, roster not full yet.
/// - **Ready**: roster full, waiting for a `START`.
/// - **Running**: turns are being played.
/// - **Finished**: the turn counter passed `max_turns`.
/// - **Aborted**: a member left or the engine failed.
///
/// `Finished` and `Aborted` are terminal. A match in a terminal phase has
/// already been removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Forming,
    Ready,
    Running,
    Finished,
    Aborted,
}

impl MatchPhase {
    /// Returns `true` if the match still accepts players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Forming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// The phase that follows on the normal path, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Forming => Some(Self::Ready),
            Self::Ready => Some(Self::Running),
            Self::Running => Some(Self::Finished),
            Self::Finished | Self::Aborted => None,
        }
    }

    /// Forward by one step, or to `Aborted` from any non-terminal phase.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Aborted && !self.is_terminal())
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forming => write!(f, "FORMING"),
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_next_follows_strict_order() {
        assert_eq!(MatchPhase::Forming.next(), Some(MatchPhase::Ready));
        assert_eq!(MatchPhase::Ready.next(), Some(MatchPhase::Running));
        assert_eq!(MatchPhase::Running.next(), Some(MatchPhase::Finished));
        assert_eq!(MatchPhase::Finished.next(), None);
        assert_eq!(MatchPhase::Aborted.next(), None);
    }

    #[test]
    fn test_phase_can_transition_to() {
        assert!(MatchPhase::Forming.can_transition_to(MatchPhase::Ready));
        assert!(!MatchPhase::Forming.can_transition_to(MatchPhase::Running));
        assert!(!MatchPhase::Running.can_transition_to(MatchPhase::Ready));
        assert!(!MatchPhase::Finished.can_transition_to(MatchPhase::Forming));
    }

    #[test]
    fn test_abort_reachable_from_any_live_phase() {
        for phase in [MatchPhase::Forming, MatchPhase::Ready, MatchPhase::Running] {
            assert!(phase.can_transition_to(MatchPhase::Aborted), "{phase}");
        }
        assert!(!MatchPhase::Finished.can_transition_to(MatchPhase::Aborted));
        assert!(!MatchPhase::Aborted.can_transition_to(MatchPhase::Aborted));
    }

    #[test]
    fn test_phase_is_joinable() {
        assert!(MatchPhase::Forming.is_joinable());
        assert!(!MatchPhase::Ready.is_joinable());
        assert!(!MatchPhase::Running.is_joinable());
        assert!(!MatchPhase::Aborted.is_joinable());
    }

    #[test]
    fn test_match_config_builder() {
        let config = MatchConfig::new(1).with_max_turns(3);
        assert_eq!(config.capacity, 1);
        assert_eq!(config.max_turns, 3);
        assert_eq!(MatchConfig::default().max_turns, 100);
    }
}
