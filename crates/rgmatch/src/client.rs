//! Reference client: plays one match from connect to `ENDED`.
//!
//! The client is driven entirely by the state prefix of each reply. It
//! names itself, creates or joins a match, keeps sending `START` until
//! the match is full, then answers every snapshot with the batch its
//! [`Brain`] produces.

use std::collections::BTreeMap;
use std::time::Duration;

use rgmatch_protocol::{
    Action, ActionBatch, Codec, ConnectionState, MatchUri, Settings, StateSnapshot,
};
use rgmatch_transport::{Connection, FramePolicy, TcpConnection};

use crate::ClientError;

/// Decides what a player's robots do each turn.
pub trait Brain: Send {
    fn act(&mut self, settings: &Settings, snapshot: &StateSnapshot) -> ActionBatch;
}

/// Every owned robot guards, every turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardBrain;

impl Brain for GuardBrain {
    fn act(&mut self, settings: &Settings, snapshot: &StateSnapshot) -> ActionBatch {
        let mut batch = ActionBatch::new(snapshot.turn);
        for robot in snapshot.owned_by(settings.player_slot) {
            batch.push(robot, Action::GUARD);
        }
        batch
    }
}

/// What the client saw over one complete match.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub match_uri: MatchUri,
    pub settings: Settings,
    /// Every snapshot received, by turn. The last entry is the final board.
    pub history: BTreeMap<u32, StateSnapshot>,
}

impl MatchReport {
    pub fn final_snapshot(&self) -> Option<&StateSnapshot> {
        self.history.values().next_back()
    }
}

/// Connects to a match server and plays a single match.
pub struct MatchClient<B: Brain, C: Codec> {
    name: String,
    brain: B,
    codec: C,
    start_retry: Duration,
}

impl<B: Brain, C: Codec> MatchClient<B, C> {
    pub fn new(name: impl Into<String>, brain: B, codec: C) -> Self {
        Self {
            name: name.into(),
            brain,
            codec,
            start_retry: Duration::from_secs(1),
        }
    }

    /// How long to wait before each `START` while the match is filling.
    pub fn start_retry(mut self, delay: Duration) -> Self {
        self.start_retry = delay;
        self
    }

    /// Plays the match at `uri`. Without a match id a new two-player match
    /// is created on that server.
    ///
    /// # Errors
    /// [`ClientError::Rejected`] if the server is full, the join or create
    /// fails, or the match is aborted. [`ClientError::ConnectionLost`] if
    /// the connection closes before `ENDED`.
    pub async fn play(&mut self, uri: &MatchUri) -> Result<MatchReport, ClientError> {
        let conn = TcpConnection::connect(&uri.addr(), FramePolicy::Exclusive).await?;
        tracing::info!(%uri, name = %self.name, "connected");

        let mut connected_replies = 0;
        let mut match_uri: Option<MatchUri> = None;
        let mut settings: Option<Settings> = None;
        let mut history = BTreeMap::new();

        loop {
            let Some(data) = conn.recv().await? else {
                return Err(ClientError::ConnectionLost);
            };
            let (state, body) = ConnectionState::split_reply(&data)?;

            match state {
                ConnectionState::Connected => {
                    let text = String::from_utf8_lossy(body);
                    match connected_replies {
                        0 => {
                            tracing::debug!(%text, "greeted");
                            conn.send(format!("NAME {}", self.name).as_bytes()).await?;
                        }
                        1 => match &uri.match_id {
                            Some(id) => {
                                tracing::info!(match_id = %id, "joining match");
                                conn.send(format!("JOIN {id}").as_bytes()).await?;
                            }
                            None => {
                                tracing::info!("creating match");
                                conn.send(b"CREATE num_players=2").await?;
                            }
                        },
                        _ => return Err(ClientError::Rejected(text.into_owned())),
                    }
                    connected_replies += 1;
                }
                ConnectionState::Joined => {
                    let text = String::from_utf8_lossy(body);
                    if match_uri.is_none() {
                        let first = text.split(' ').next().unwrap_or_default();
                        match_uri = Some(first.parse()?);
                        tracing::info!(uri = %first, "joined");
                    } else {
                        tracing::debug!(%text, "waiting for players");
                    }
                    tokio::time::sleep(self.start_retry).await;
                    conn.send(b"START").await?;
                }
                ConnectionState::Started => {
                    let received: Settings = self.codec.decode(body)?;
                    tracing::info!(slot = received.player_slot, "match started");
                    settings = Some(received);
                    conn.send(b"TURN").await?;
                }
                ConnectionState::Turn => {
                    let snapshot: StateSnapshot = self.codec.decode(body)?;
                    let Some(settings) = &settings else {
                        return Err(ClientError::Unexpected("snapshot before settings".into()));
                    };
                    tracing::debug!(turn = snapshot.turn, robots = snapshot.robots.len(), "running turn");

                    let batch = self.brain.act(settings, &snapshot);
                    let mut message = b"TURN ".to_vec();
                    message.extend(self.codec.encode(&batch)?);
                    history.insert(snapshot.turn, snapshot);
                    conn.send(&message).await?;
                }
                ConnectionState::Ended => {
                    let snapshot: StateSnapshot = self.codec.decode(body)?;
                    tracing::info!(turn = snapshot.turn, "match finished");
                    history.insert(snapshot.turn, snapshot);
                    let _ = conn.close().await;

                    return match (match_uri, settings) {
                        (Some(match_uri), Some(settings)) => Ok(MatchReport {
                            match_uri,
                            settings,
                            history,
                        }),
                        _ => Err(ClientError::Unexpected("ENDED before start".into())),
                    };
                }
                ConnectionState::Disconnected => {
                    let text = String::from_utf8_lossy(body).into_owned();
                    return Err(ClientError::Rejected(text));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgmatch_protocol::{GameSettings, Location, Robot};

    #[test]
    fn test_guard_brain_orders_only_own_robots() {
        let settings = Settings {
            game: GameSettings {
                board_size: 19,
                obstacles: Vec::new(),
                spawns: Vec::new(),
                spawn_period: 10,
                player_count: 2,
                spawn_amount: 5,
                max_turns: 100,
            },
            player_slot: 1,
        };
        let robot = |id, x, owner| Robot {
            robot_id: id,
            location: Location::new(x, 1),
            hitpoints: 50,
            owner_slot: owner,
        };
        let snapshot = StateSnapshot {
            turn: 4,
            robots: vec![robot(1, 1, 0), robot(2, 2, 1), robot(3, 3, 1)],
        };

        let batch = GuardBrain.act(&settings, &snapshot);
        assert_eq!(batch.turn, 4);
        let ids: Vec<u32> = batch.actions.iter().map(|a| a.robot_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(batch.actions.iter().all(|a| a.action == Action::GUARD));
    }
}
