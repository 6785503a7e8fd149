//! The three message schemas that cross the network boundary.
//!
//! - [`Settings`]: sent once per connection when the match starts.
//! - [`StateSnapshot`]: the board after each turn.
//! - [`ActionBatch`]: one player's orders for one turn.
//!
//! Each is a plain serde type. Which bytes they become depends on the
//! [`Codec`](crate::Codec); the layout of the fields does not.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A player slot: the 0-based roster position inside a match.
pub type Slot = u8;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifier of a live match.
///
/// Short and alphanumeric so it can be typed by hand and embedded
/// verbatim in a match URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Validates `s` as a match id: non-empty, ASCII letters and digits only.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the id.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; ids are never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Board geometry
// ---------------------------------------------------------------------------

/// A board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonally adjacent locations.
    pub fn neighbours(self) -> [Location; 4] {
        [
            Location::new(self.x + 1, self.y),
            Location::new(self.x - 1, self.y),
            Location::new(self.x, self.y + 1),
            Location::new(self.x, self.y - 1),
        ]
    }

    /// Manhattan distance.
    pub fn distance(self, other: Location) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Match configuration shared by every player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Width and height of the square board.
    pub board_size: u32,
    /// Impassable tiles.
    pub obstacles: Vec<Location>,
    /// Tiles where new robots appear.
    pub spawns: Vec<Location>,
    /// A spawn wave happens every `spawn_period` turns.
    pub spawn_period: u32,
    /// Number of players in the match.
    pub player_count: u8,
    /// Robots spawned per player per wave.
    pub spawn_amount: u32,
    /// The match ends once the turn counter exceeds this.
    pub max_turns: u32,
}

/// Settings as sent to one player: the shared configuration plus the
/// slot that player controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub game: GameSettings,
    pub player_slot: Slot,
}

impl Settings {
    pub fn for_slot(game: &GameSettings, player_slot: Slot) -> Self {
        Self {
            game: game.clone(),
            player_slot,
        }
    }
}

// ---------------------------------------------------------------------------
// State snapshot
// ---------------------------------------------------------------------------

/// One robot on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub robot_id: u32,
    pub location: Location,
    pub hitpoints: i32,
    pub owner_slot: Slot,
}

/// The board at a given turn. Produced by the engine, never mutated
/// after it is broadcast.
///
/// Robots travel as a list; at most one robot occupies a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub turn: u32,
    pub robots: Vec<Robot>,
}

impl StateSnapshot {
    pub fn new(turn: u32) -> Self {
        Self {
            turn,
            robots: Vec::new(),
        }
    }

    /// The robot standing on `location`, if any.
    pub fn robot_at(&self, location: Location) -> Option<&Robot> {
        self.robots.iter().find(|r| r.location == location)
    }

    /// Robots controlled by `slot`.
    pub fn owned_by(&self, slot: Slot) -> impl Iterator<Item = &Robot> {
        self.robots.iter().filter(move |r| r.owner_slot == slot)
    }

    /// Robots keyed by location.
    pub fn by_location(&self) -> BTreeMap<Location, &Robot> {
        self.robots.iter().map(|r| (r.location, r)).collect()
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What a robot does this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Guard,
    Move,
    Attack,
    Suicide,
}

impl ActionKind {
    /// Whether this kind of action is aimed at a location.
    pub fn needs_target(self) -> bool {
        matches!(self, Self::Move | Self::Attack)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Guard => "GUARD",
            Self::Move => "MOVE",
            Self::Attack => "ATTACK",
            Self::Suicide => "SUICIDE",
        };
        f.write_str(s)
    }
}

/// An action: a kind and an optional target. Every action has this
/// shape, including the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub target: Option<Location>,
}

impl Action {
    /// The action given to a robot that received no orders.
    pub const GUARD: Action = Action {
        kind: ActionKind::Guard,
        target: None,
    };

    pub const SUICIDE: Action = Action {
        kind: ActionKind::Suicide,
        target: None,
    };

    pub fn move_to(target: Location) -> Self {
        Self {
            kind: ActionKind::Move,
            target: Some(target),
        }
    }

    pub fn attack(target: Location) -> Self {
        Self {
            kind: ActionKind::Attack,
            target: Some(target),
        }
    }

    /// Checks that the action is well formed and returns its canonical
    /// form: MOVE and ATTACK must carry a target, GUARD and SUICIDE lose
    /// any target they were sent with.
    pub fn normalized(self) -> Result<Self, String> {
        if self.kind.needs_target() {
            if self.target.is_none() {
                return Err(format!("{} without a target", self.kind));
            }
            Ok(self)
        } else {
            Ok(Self {
                kind: self.kind,
                target: None,
            })
        }
    }
}

/// One robot's orders inside an [`ActionBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotAction {
    pub robot_id: u32,
    pub location: Location,
    pub action: Action,
}

/// Every order one player sends for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBatch {
    pub turn: u32,
    pub actions: Vec<RobotAction>,
}

impl ActionBatch {
    pub fn new(turn: u32) -> Self {
        Self {
            turn,
            actions: Vec::new(),
        }
    }

    /// Adds orders for the robot at `robot`'s location.
    pub fn push(&mut self, robot: &Robot, action: Action) {
        self.actions.push(RobotAction {
            robot_id: robot.robot_id,
            location: robot.location,
            action,
        });
    }
}

/// Actions keyed by the location of the robot performing them.
///
/// This is what the engine consumes: the per-player batches of a turn,
/// sanitized and merged.
pub type ActionSet = BTreeMap<Location, Action>;
