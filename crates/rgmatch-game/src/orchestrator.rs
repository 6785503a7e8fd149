//! Match actor: an isolated Tokio task that owns one match.
//!
//! Every join, start, submit and abort for a match goes through its
//! command channel and is handled one at a time. That is what makes the
//! turn barrier exactly-once: when two members submit at the same moment,
//! the second command is only looked at after the first has been fully
//! applied, so exactly one of them sees every slot filled.
//!
//! The actor never touches sockets. It pushes [`MatchEvent`]s to each
//! member's outbound channel, and the connection task turns those into
//! state transitions and frames.

use std::sync::Arc;

use rgmatch_protocol::{
    Action, ActionBatch, ActionSet, ConnectionState, GameSettings, MatchId, MatchUri, Settings,
    Slot, StateSnapshot,
};
use rgmatch_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{Engine, MatchConfig, MatchError, MatchPhase, MatchRegistry};

/// Why the match is telling a member to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    /// The final snapshot has been delivered.
    Finished,
    /// Another member left a live match.
    PeerDisconnected,
    /// The engine failed to produce a snapshot.
    EngineFailure,
}

impl TerminateReason {
    /// Notice text sent to the member before its connection is closed.
    /// `None` means close without a notice.
    pub fn notice(self) -> Option<&'static str> {
        match self {
            Self::Finished => None,
            Self::PeerDisconnected => Some("Player disconnected from match."),
            Self::EngineFailure => Some("Match aborted: turn resolution failed."),
        }
    }
}

/// An outbound event from the match actor to a member's connection.
#[derive(Debug, Clone)]
pub enum MatchEvent {
    /// The match is running. Move to `STARTED` and send these settings.
    Started(Settings),
    /// A turn was resolved. `state` is `TURN`, or `ENDED` on the last one.
    Snapshot {
        state: ConnectionState,
        snapshot: StateSnapshot,
    },
    /// Close the connection.
    Terminate(TerminateReason),
}

/// Channel sender for delivering events to a member.
pub type MemberSender = mpsc::UnboundedSender<MatchEvent>;

/// Where a successful join put the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub slot: Slot,
    pub uri: MatchUri,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call moved the match to `Running`.
    Started,
    /// Another member started it first.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored; other slots are still empty.
    Waiting,
    /// This submission filled the last slot and the turn was resolved.
    Resolved { turn: u32 },
}

/// One roster entry as reported by [`MatchHandle::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub conn_id: ConnectionId,
    pub name: String,
    pub slot: Slot,
}

/// A snapshot of match metadata (not the board).
#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub id: MatchId,
    pub uri: MatchUri,
    pub phase: MatchPhase,
    pub capacity: u8,
    pub turn: u32,
    pub members: Vec<MemberInfo>,
}

impl MatchInfo {
    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    /// `<id> (<n>/<cap>)`
    pub fn occupancy(&self) -> String {
        format!("{} ({}/{})", self.id, self.player_count(), self.capacity)
    }

    /// `<uri> (<n>/<cap>) <name> <connId>, <name> <connId>`
    pub fn roster_line(&self) -> String {
        let members = self
            .members
            .iter()
            .map(|m| format!("{} {}", m.name, m.conn_id))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} ({}/{}) {}",
            self.uri,
            self.player_count(),
            self.capacity,
            members
        )
    }
}

/// Commands sent to a match actor through its channel.
pub(crate) enum MatchCommand {
    Join {
        conn_id: ConnectionId,
        name: String,
        sender: MemberSender,
        reply: oneshot::Sender<Result<Seat, MatchError>>,
    },
    Start {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<StartOutcome, MatchError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<StateSnapshot>>,
    },
    Submit {
        conn_id: ConnectionId,
        batch: ActionBatch,
        reply: oneshot::Sender<Result<SubmitOutcome, MatchError>>,
    },
    Info {
        reply: oneshot::Sender<MatchInfo>,
    },
    Abort {
        origin: Option<ConnectionId>,
    },
}

/// Handle to a running match actor.
///
/// Cheap to clone. The registry holds one per live match and each member
/// connection keeps its own copy.
#[derive(Clone)]
pub struct MatchHandle {
    id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl std::fmt::Debug for MatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchHandle").field("id", &self.id).finish()
    }
}

impl MatchHandle {
    pub fn id(&self) -> &MatchId {
        &self.id
    }

    /// Takes the next free slot for `conn_id`.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        name: String,
        sender: MemberSender,
    ) -> Result<Seat, MatchError> {
        self.request(|reply| MatchCommand::Join {
            conn_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Starts the match once every slot is taken.
    pub async fn start(&self, conn_id: ConnectionId) -> Result<StartOutcome, MatchError> {
        self.request(|reply| MatchCommand::Start { conn_id, reply })
            .await?
    }

    /// The latest snapshot, or `None` before the match has started.
    pub async fn snapshot(&self) -> Result<Option<StateSnapshot>, MatchError> {
        self.request(|reply| MatchCommand::Snapshot { reply }).await
    }

    /// Stores `conn_id`'s actions for the current turn, resolving the turn
    /// if that fills the last slot.
    pub async fn submit(
        &self,
        conn_id: ConnectionId,
        batch: ActionBatch,
    ) -> Result<SubmitOutcome, MatchError> {
        self.request(|reply| MatchCommand::Submit {
            conn_id,
            batch,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<MatchInfo, MatchError> {
        self.request(|reply| MatchCommand::Info { reply }).await
    }

    /// Aborts the match. Every member except `origin` is told to close.
    ///
    /// Idempotent: aborting a match that has already ended does nothing.
    pub async fn abort(&self, origin: Option<ConnectionId>) {
        let _ = self.sender.send(MatchCommand::Abort { origin }).await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MatchCommand,
    ) -> Result<T, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| MatchError::Unavailable(self.id.clone()))?;
        reply_rx
            .await
            .map_err(|_| MatchError::Unavailable(self.id.clone()))
    }
}

struct Member {
    conn_id: ConnectionId,
    name: String,
    sender: MemberSender,
}

/// The internal match state. Runs inside a Tokio task.
struct MatchActor<E: Engine> {
    id: MatchId,
    uri: MatchUri,
    config: MatchConfig,
    phase: MatchPhase,
    roster: Vec<Member>,
    settings: GameSettings,
    turn: u32,
    snapshot: Option<StateSnapshot>,
    /// One entry per slot; `None` until that slot submits this turn.
    pending: Vec<Option<ActionSet>>,
    engine: Arc<E>,
    registry: MatchRegistry<E>,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl<E: Engine> MatchActor<E> {
    /// Runs the actor loop until the match reaches a terminal phase.
    async fn run(mut self) {
        tracing::info!(match_id = %self.id, capacity = self.config.capacity, "match actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                MatchCommand::Join {
                    conn_id,
                    name,
                    sender,
                    reply,
                } => {
                    let result = self.handle_join(conn_id, name, sender);
                    let _ = reply.send(result);
                }
                MatchCommand::Start { conn_id, reply } => {
                    let result = self.handle_start(conn_id).await;
                    let _ = reply.send(result);
                }
                MatchCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot.clone());
                }
                MatchCommand::Submit {
                    conn_id,
                    batch,
                    reply,
                } => {
                    let result = self.handle_submit(conn_id, batch).await;
                    let _ = reply.send(result);
                }
                MatchCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                MatchCommand::Abort { origin } => {
                    self.abort(origin, TerminateReason::PeerDisconnected).await;
                }
            }

            if self.phase.is_terminal() {
                break;
            }
        }

        // Covers the case where every handle was dropped without an abort.
        self.registry.remove(&self.id).await;
        tracing::info!(match_id = %self.id, phase = %self.phase, "match actor stopped");
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        name: String,
        sender: MemberSender,
    ) -> Result<Seat, MatchError> {
        if self.roster.iter().any(|m| m.conn_id == conn_id) {
            return Err(MatchError::AlreadyJoined(conn_id, self.id.clone()));
        }
        if !self.phase.is_joinable() || self.roster.len() >= usize::from(self.config.capacity) {
            return Err(MatchError::Full(self.id.clone()));
        }

        let slot = self.roster.len() as Slot;
        self.roster.push(Member {
            conn_id,
            name,
            sender,
        });
        tracing::info!(
            match_id = %self.id,
            %conn_id,
            slot,
            players = self.roster.len(),
            "player joined"
        );

        if self.roster.len() == usize::from(self.config.capacity) {
            self.transition(MatchPhase::Ready);
        }

        Ok(Seat {
            slot,
            uri: self.uri.clone(),
        })
    }

    async fn handle_start(&mut self, conn_id: ConnectionId) -> Result<StartOutcome, MatchError> {
        self.slot_of(conn_id)?;
        match self.phase {
            MatchPhase::Forming => return Err(MatchError::NotFull(self.id.clone())),
            MatchPhase::Running => return Ok(StartOutcome::AlreadyRunning),
            MatchPhase::Finished | MatchPhase::Aborted => {
                return Err(MatchError::InvalidState(format!(
                    "cannot start match in phase {}",
                    self.phase
                )));
            }
            MatchPhase::Ready => {}
        }

        self.transition(MatchPhase::Running);
        let mut initial = match self.engine.initial_state(&self.settings) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(match_id = %self.id, error = %e, "initial state failed");
                self.abort(None, TerminateReason::EngineFailure).await;
                return Err(e.into());
            }
        };
        self.turn = 1;
        initial.turn = self.turn;
        self.snapshot = Some(initial);
        self.pending = vec![None; usize::from(self.config.capacity)];

        for (slot, member) in self.roster.iter().enumerate() {
            let settings = Settings::for_slot(&self.settings, slot as Slot);
            let _ = member.sender.send(MatchEvent::Started(settings));
        }
        tracing::info!(match_id = %self.id, %conn_id, "match started");

        Ok(StartOutcome::Started)
    }

    async fn handle_submit(
        &mut self,
        conn_id: ConnectionId,
        batch: ActionBatch,
    ) -> Result<SubmitOutcome, MatchError> {
        let slot = self.slot_of(conn_id)?;
        let current = match (&self.snapshot, self.phase) {
            (Some(snapshot), MatchPhase::Running) => snapshot,
            _ => {
                return Err(MatchError::InvalidState(format!(
                    "cannot submit actions in phase {}",
                    self.phase
                )));
            }
        };
        if batch.turn != self.turn {
            return Err(MatchError::InvalidActions(format!(
                "batch is for turn {}, current turn is {}",
                batch.turn, self.turn
            )));
        }

        let actions = sanitize_actions(current, slot, &batch)?;
        let entry = &mut self.pending[usize::from(slot)];
        if entry.is_some() {
            tracing::debug!(match_id = %self.id, %conn_id, turn = self.turn, "resubmission replaces earlier batch");
        }
        *entry = Some(actions);

        if self.pending.iter().any(Option::is_none) {
            tracing::debug!(match_id = %self.id, %conn_id, turn = self.turn, "waiting for other players");
            return Ok(SubmitOutcome::Waiting);
        }

        self.resolve_turn().await
    }

    /// Merges every slot's actions and asks the engine for the next board.
    async fn resolve_turn(&mut self) -> Result<SubmitOutcome, MatchError> {
        let mut combined = ActionSet::new();
        for entry in &mut self.pending {
            combined.extend(entry.take().unwrap_or_default());
        }

        let next = match &self.snapshot {
            Some(current) => self.engine.resolve(&self.settings, current, &combined),
            None => return Err(MatchError::InvalidState("no snapshot to resolve".into())),
        };
        let mut next = match next {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(match_id = %self.id, turn = self.turn, error = %e, "turn resolution failed");
                self.abort(None, TerminateReason::EngineFailure).await;
                return Err(e.into());
            }
        };

        self.turn += 1;
        next.turn = self.turn;
        let finished = self.turn > self.config.max_turns;
        let state = if finished {
            ConnectionState::Ended
        } else {
            ConnectionState::Turn
        };

        for member in &self.roster {
            let _ = member.sender.send(MatchEvent::Snapshot {
                state,
                snapshot: next.clone(),
            });
        }
        tracing::info!(
            match_id = %self.id,
            turn = self.turn,
            robots = next.robots.len(),
            "turn resolved"
        );
        self.snapshot = Some(next);

        if finished {
            self.transition(MatchPhase::Finished);
            self.registry.remove(&self.id).await;
            self.broadcast_terminate(None, TerminateReason::Finished);
            tracing::info!(match_id = %self.id, turns = self.config.max_turns, "match finished");
        }

        Ok(SubmitOutcome::Resolved { turn: self.turn })
    }

    async fn abort(&mut self, origin: Option<ConnectionId>, reason: TerminateReason) {
        if self.phase.is_terminal() {
            return;
        }
        self.transition(MatchPhase::Aborted);
        self.registry.remove(&self.id).await;
        self.broadcast_terminate(origin, reason);
        tracing::info!(
            match_id = %self.id,
            origin = ?origin,
            reason = ?reason,
            "match aborted"
        );
    }

    fn broadcast_terminate(&self, origin: Option<ConnectionId>, reason: TerminateReason) {
        for member in self.roster.iter().filter(|m| Some(m.conn_id) != origin) {
            let _ = member.sender.send(MatchEvent::Terminate(reason));
        }
    }

    fn transition(&mut self, to: MatchPhase) {
        debug_assert!(
            self.phase.can_transition_to(to),
            "{} -> {}",
            self.phase,
            to
        );
        tracing::debug!(match_id = %self.id, from = %self.phase, %to, "phase change");
        self.phase = to;
    }

    fn slot_of(&self, conn_id: ConnectionId) -> Result<Slot, MatchError> {
        self.roster
            .iter()
            .position(|m| m.conn_id == conn_id)
            .map(|i| i as Slot)
            .ok_or_else(|| MatchError::NotMember(conn_id, self.id.clone()))
    }

    fn info(&self) -> MatchInfo {
        MatchInfo {
            id: self.id.clone(),
            uri: self.uri.clone(),
            phase: self.phase,
            capacity: self.config.capacity,
            turn: self.turn,
            members: self
                .roster
                .iter()
                .enumerate()
                .map(|(slot, m)| MemberInfo {
                    conn_id: m.conn_id,
                    name: m.name.clone(),
                    slot: slot as Slot,
                })
                .collect(),
        }
    }
}

/// Restricts `batch` to the robots `slot` owns on `snapshot`.
///
/// Every owned robot gets exactly one action: the submitted one if there
/// is one at its location, otherwise [`Action::GUARD`]. Orders for robots
/// the slot doesn't own are dropped. When a location appears twice the
/// later entry wins.
///
/// # Errors
/// [`MatchError::InvalidActions`] if any submitted action is malformed
/// (MOVE or ATTACK without a target).
pub fn sanitize_actions(
    snapshot: &StateSnapshot,
    slot: Slot,
    batch: &ActionBatch,
) -> Result<ActionSet, MatchError> {
    let mut submitted = ActionSet::new();
    for order in &batch.actions {
        let action = order.action.normalized().map_err(|why| {
            MatchError::InvalidActions(format!("robot at {}: {why}", order.location))
        })?;
        submitted.insert(order.location, action);
    }

    Ok(snapshot
        .owned_by(slot)
        .map(|robot| {
            let action = submitted
                .get(&robot.location)
                .copied()
                .unwrap_or(Action::GUARD);
            (robot.location, action)
        })
        .collect())
}

/// Spawns a new match actor task and returns a handle to it.
pub(crate) fn spawn_match<E: Engine>(
    id: MatchId,
    uri: MatchUri,
    config: MatchConfig,
    engine: Arc<E>,
    registry: MatchRegistry<E>,
    channel_size: usize,
) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let settings = engine.game_settings(config.capacity, config.max_turns);

    let actor = MatchActor {
        id: id.clone(),
        uri,
        config,
        phase: MatchPhase::Forming,
        roster: Vec::with_capacity(usize::from(config.capacity)),
        settings,
        turn: 0,
        snapshot: None,
        pending: Vec::new(),
        engine,
        registry,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    MatchHandle { id, sender: tx }
}
