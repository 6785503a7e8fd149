//! A small deterministic robot arena, used as the reference [`Engine`].
//!
//! The board is a 19x19 square walled in by obstacles. Spawn tiles form
//! the ring one step inside the wall. Every `spawn_period` turns a wave
//! clears the spawn tiles and drops fresh robots onto them.
//!
//! Resolution order for a turn:
//!   1. Moves (contested or blocked moves are cancelled)
//!   2. Attacks and suicides, applied simultaneously
//!   3. Dead robots are removed
//!   4. Spawn wave, if due

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rgmatch_game::{Engine, EngineError};
use rgmatch_protocol::{
    Action, ActionKind, ActionSet, GameSettings, Location, Robot, Slot, StateSnapshot,
};

pub const BOARD_SIZE: u32 = 19;
pub const SPAWN_PERIOD: u32 = 10;
pub const SPAWN_AMOUNT: u32 = 5;
pub const HITPOINTS: i32 = 50;
pub const ATTACK_DAMAGE: i32 = 9;
pub const SUICIDE_DAMAGE: i32 = 15;

/// The reference rules. The seed makes spawn placement reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArenaEngine {
    seed: u64,
}

impl ArenaEngine {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, turn: u32) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ u64::from(turn).rotate_left(32))
    }

    /// Whether a wave lands on `turn`. Turn 1 always gets one.
    fn is_spawn_turn(settings: &GameSettings, turn: u32) -> bool {
        settings.spawn_period > 0 && turn % settings.spawn_period == 1 % settings.spawn_period
    }

    /// Zero-based number of the wave landing on `turn`.
    fn wave_index(settings: &GameSettings, turn: u32) -> u32 {
        turn.saturating_sub(1) / settings.spawn_period.max(1)
    }

    /// Clears the spawn tiles and places `spawn_amount` robots per player.
    fn spawn_wave(&self, settings: &GameSettings, robots: &mut Vec<Robot>, turn: u32) {
        let spawns: BTreeSet<Location> = settings.spawns.iter().copied().collect();
        robots.retain(|r| !spawns.contains(&r.location));

        let mut free: Vec<Location> = settings.spawns.clone();
        free.shuffle(&mut self.rng_for(turn));

        let players = u32::from(settings.player_count.max(1));
        let wanted = (settings.spawn_amount * players) as usize;
        // Each wave owns a block of ids, so ids are never reused after a wave
        // clears the board.
        let block = settings.spawns.len() as u32;
        let wave_base = Self::wave_index(settings, turn) * block + 1;
        let alive_max = robots.iter().map(|r| r.robot_id).max().unwrap_or(0);
        let mut next_id = wave_base.max(alive_max + 1);

        for (i, location) in free.into_iter().take(wanted).enumerate() {
            robots.push(Robot {
                robot_id: next_id,
                location,
                hitpoints: HITPOINTS,
                owner_slot: (i as u32 % players) as Slot,
            });
            next_id += 1;
        }
        tracing::debug!(turn, robots = robots.len(), "spawn wave");
    }
}

fn is_inside(size: u32, location: Location) -> bool {
    let size = size as i32;
    (0..size).contains(&location.x) && (0..size).contains(&location.y)
}

/// Cancels moves until every remaining one is uncontested.
///
/// A move fails when another robot wants the same tile, when the tile
/// holds a robot that stays put, or when two robots would swap places.
fn resolve_moves(
    settings: &GameSettings,
    robots: &[Robot],
    actions: &ActionSet,
) -> BTreeMap<Location, Location> {
    let obstacles: BTreeSet<Location> = settings.obstacles.iter().copied().collect();

    let mut dest: BTreeMap<Location, Location> = robots
        .iter()
        .map(|robot| {
            let from = robot.location;
            let to = match actions.get(&from) {
                Some(Action {
                    kind: ActionKind::Move,
                    target: Some(target),
                }) if from.distance(*target) == 1
                    && is_inside(settings.board_size, *target)
                    && !obstacles.contains(target) =>
                {
                    *target
                }
                _ => from,
            };
            (from, to)
        })
        .collect();

    loop {
        let mut claims: BTreeMap<Location, usize> = BTreeMap::new();
        for to in dest.values() {
            *claims.entry(*to).or_default() += 1;
        }

        let blocked: Vec<Location> = dest
            .iter()
            .filter(|&(from, to)| {
                from != to
                    && (claims[to] > 1
                        || dest.get(to) == Some(to)
                        || dest.get(to) == Some(from))
            })
            .map(|(from, _)| *from)
            .collect();

        if blocked.is_empty() {
            return dest;
        }
        for from in blocked {
            dest.insert(from, from);
        }
    }
}

fn guarded(damage: i32, action: Action) -> i32 {
    if action.kind == ActionKind::Guard {
        damage / 2
    } else {
        damage
    }
}

impl Engine for ArenaEngine {
    fn game_settings(&self, player_count: u8, max_turns: u32) -> GameSettings {
        let edge = BOARD_SIZE as i32 - 1;
        let mut obstacles = Vec::new();
        let mut spawns = Vec::new();
        for x in 0..=edge {
            for y in 0..=edge {
                let location = Location::new(x, y);
                if x == 0 || y == 0 || x == edge || y == edge {
                    obstacles.push(location);
                } else if x == 1 || y == 1 || x == edge - 1 || y == edge - 1 {
                    spawns.push(location);
                }
            }
        }

        GameSettings {
            board_size: BOARD_SIZE,
            obstacles,
            spawns,
            spawn_period: SPAWN_PERIOD,
            player_count,
            spawn_amount: SPAWN_AMOUNT,
            max_turns,
        }
    }

    fn initial_state(&self, settings: &GameSettings) -> Result<StateSnapshot, EngineError> {
        let mut robots = Vec::new();
        self.spawn_wave(settings, &mut robots, 1);
        Ok(StateSnapshot { turn: 1, robots })
    }

    fn resolve(
        &self,
        settings: &GameSettings,
        state: &StateSnapshot,
        actions: &ActionSet,
    ) -> Result<StateSnapshot, EngineError> {
        let occupied: BTreeSet<Location> = state.robots.iter().map(|r| r.location).collect();
        if occupied.len() != state.robots.len() {
            return Err(EngineError::new(format!(
                "turn {}: two robots share a location",
                state.turn
            )));
        }

        let dest = resolve_moves(settings, &state.robots, actions);
        let action_of = |robot: &Robot| actions.get(&robot.location).copied().unwrap_or(Action::GUARD);

        // Robots after moving, each paired with the action it was given.
        let mut moved: Vec<(Robot, Action)> = state
            .robots
            .iter()
            .map(|robot| {
                let action = action_of(robot);
                let mut robot = robot.clone();
                robot.location = dest[&robot.location];
                (robot, action)
            })
            .collect();
        let index: BTreeMap<Location, usize> = moved
            .iter()
            .enumerate()
            .map(|(i, (robot, _))| (robot.location, i))
            .collect();

        let mut damage = vec![0; moved.len()];
        let mut suicided = BTreeSet::new();
        for (i, (robot, action)) in moved.iter().enumerate() {
            match (action.kind, action.target) {
                (ActionKind::Attack, Some(target)) if robot.location.distance(target) == 1 => {
                    if let Some(&victim) = index.get(&target) {
                        let (other, other_action) = &moved[victim];
                        if other.owner_slot != robot.owner_slot {
                            damage[victim] += guarded(ATTACK_DAMAGE, *other_action);
                        }
                    }
                }
                (ActionKind::Suicide, _) => {
                    suicided.insert(i);
                    for near in robot.location.neighbours() {
                        if let Some(&victim) = index.get(&near) {
                            let (other, other_action) = &moved[victim];
                            if other.owner_slot != robot.owner_slot {
                                damage[victim] += guarded(SUICIDE_DAMAGE, *other_action);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        for (i, (robot, _)) in moved.iter_mut().enumerate() {
            robot.hitpoints -= damage[i];
        }
        let mut robots: Vec<Robot> = moved
            .into_iter()
            .enumerate()
            .filter(|(i, (robot, _))| !suicided.contains(i) && robot.hitpoints > 0)
            .map(|(_, (robot, _))| robot)
            .collect();

        let next_turn = state.turn + 1;
        if Self::is_spawn_turn(settings, next_turn) {
            self.spawn_wave(settings, &mut robots, next_turn);
        }

        Ok(StateSnapshot {
            turn: next_turn,
            robots,
        })
    }
}
