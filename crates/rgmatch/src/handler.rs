//! Per-connection handler: the protocol state machine.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Greet the peer, or turn it away if the server is full
//!   2. Loop: wait for either an inbound unit or an event from the match
//!   3. Dispatch the unit against the connection's current state
//!   4. On exit, abort any match the connection still belongs to
//!
//! Every outbound payload goes through [`Session::send`], which prefixes
//! the connection's current state name.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use rgmatch_game::{
    Engine, MatchConfig, MatchError, MatchEvent, MatchHandle, MemberSender, StartOutcome,
};
use rgmatch_protocol::{
    ActionBatch, Codec, Command, CommandError, ConnectionState, CreateOptions, MatchId,
    ProtocolError, StateSnapshot,
};
use rgmatch_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ServerError;
use crate::server::ServerState;

/// Whether the handler loop keeps going after a unit or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
    /// The match actor is gone. Deliver whatever it queued for us, then close.
    Orphaned,
}

/// Drop guard that releases the connection slot and aborts the match the
/// connection still belongs to when the handler exits.
///
/// Since `Drop` is synchronous, the abort is a fire-and-forget task.
struct ConnectionGuard<E: Engine, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<E, C>>,
    joined: Option<MatchHandle>,
}

impl<E: Engine, C: Codec> Drop for ConnectionGuard<E, C> {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        if let Some(handle) = self.joined.take() {
            let origin = self.conn_id;
            tokio::spawn(async move {
                handle.abort(Some(origin)).await;
            });
        }
    }
}

/// State owned by one connection task.
struct Session<'a, E: Engine, C: Codec> {
    conn: &'a TcpConnection,
    conn_id: ConnectionId,
    protocol: ConnectionState,
    name: String,
    guard: ConnectionGuard<E, C>,
    events: MemberSender,
    /// Every snapshot sent to this connection, by turn.
    history: BTreeMap<u32, StateSnapshot>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<E: Engine, C: Codec>(
    conn: TcpConnection,
    state: Arc<ServerState<E, C>>,
) -> Result<(), ServerError> {
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let open = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!(%conn_id, %peer, open, "connection opened");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        conn: &conn,
        conn_id,
        protocol: ConnectionState::Connected,
        name: "Unnamed Player".to_string(),
        guard: ConnectionGuard {
            conn_id,
            state: Arc::clone(&state),
            joined: None,
        },
        events: events_tx,
        history: BTreeMap::new(),
    };

    session
        .reply(&format!(
            "Welcome! There are currently {open} open connections."
        ))
        .await?;
    if open > state.config.max_connections {
        session.protocol = ConnectionState::Disconnected;
        session.reply("Sorry, too many players connected!").await?;
        let _ = conn.close().await;
        tracing::info!(%conn_id, open, "connection refused, server full");
        return Ok(());
    }

    let result = session.run(&mut events_rx).await;

    let _ = conn.close().await;
    tracing::info!(
        %conn_id,
        name = %session.name,
        state = %session.protocol,
        snapshots = session.history.len(),
        last_turn = ?session.history.keys().next_back(),
        "connection closed"
    );
    // The guard drops with the session and aborts the match if still joined.
    result
}

impl<E: Engine, C: Codec> Session<'_, E, C> {
    fn server(&self) -> &ServerState<E, C> {
        &self.guard.state
    }

    async fn run(
        &mut self,
        events_rx: &mut mpsc::UnboundedReceiver<MatchEvent>,
    ) -> Result<(), ServerError> {
        let conn = self.conn;
        let idle = self.server().config.idle_timeout;
        let mut deadline = Instant::now() + idle;

        loop {
            let flow = tokio::select! {
                inbound = tokio::time::timeout_at(deadline, conn.recv()) => {
                    match inbound {
                        Ok(Ok(Some(data))) => {
                            deadline = Instant::now() + idle;
                            self.on_unit(&data).await?
                        }
                        Ok(Ok(None)) => {
                            tracing::info!(conn_id = %self.conn_id, "peer closed connection");
                            Flow::Close
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(conn_id = %self.conn_id, error = %e, "receive failed");
                            return Err(e.into());
                        }
                        Err(_) => {
                            tracing::info!(conn_id = %self.conn_id, "connection timed out");
                            Flow::Close
                        }
                    }
                }
                Some(event) = events_rx.recv() => self.on_event(event).await?,
            };

            match flow {
                Flow::Continue => {}
                Flow::Close => return Ok(()),
                Flow::Orphaned => return self.drain_events(events_rx).await,
            }
        }
    }

    /// Handles events the match queued before it stopped, up to the first
    /// one that closes the connection.
    async fn drain_events(
        &mut self,
        events_rx: &mut mpsc::UnboundedReceiver<MatchEvent>,
    ) -> Result<(), ServerError> {
        while let Ok(event) = events_rx.try_recv() {
            if self.on_event(event).await? != Flow::Continue {
                break;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Dispatches one inbound unit against the current state.
    async fn on_unit(&mut self, data: &[u8]) -> Result<Flow, ServerError> {
        tracing::trace!(conn_id = %self.conn_id, state = %self.protocol, len = data.len(), "<<");
        let command = Command::parse(data);

        match (self.protocol, command) {
            (ConnectionState::Connected, Err(e)) => {
                self.reply(&e.to_string()).await?;
                Ok(Flow::Continue)
            }
            (ConnectionState::Connected, Ok(command)) => {
                self.on_connected(command).await?;
                Ok(Flow::Continue)
            }
            (ConnectionState::Joined, Ok(Command::Start)) => self.on_start().await,
            // The broadcast start can overtake a second START.
            (ConnectionState::Started, Ok(Command::Start)) => Ok(Flow::Continue),
            (ConnectionState::Started, Ok(Command::Turn)) => self.on_turn_request().await,
            (ConnectionState::Turn, Ok(Command::SubmitTurn(payload))) => {
                self.on_submit(&payload).await
            }
            (state, command) => {
                let input = command
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|e| e.to_string());
                Ok(self.violation(ProtocolError::Violation { state, input }))
            }
        }
    }

    async fn on_connected(&mut self, command: Command) -> Result<(), ServerError> {
        match command {
            Command::Name(name) => {
                let reply = format!("Hello, {name}");
                self.name = name;
                self.reply(&reply).await
            }
            Command::Create(options) => self.on_create(&options).await,
            Command::Join(id) => {
                let found = self.server().registry.get(&id).await;
                match found {
                    Ok(handle) => self.join(handle).await,
                    Err(_) => self.reply("Match does not exist!").await,
                }
            }
            Command::List => self.list_matches().await,
            Command::Players(id) => self.list_players(&id).await,
            Command::Start | Command::Turn | Command::SubmitTurn(_) | Command::Unknown => {
                self.reply("Invalid command").await
            }
        }
    }

    async fn on_create(&mut self, options: &CreateOptions) -> Result<(), ServerError> {
        let config = match self.match_config(options) {
            Ok(config) => config,
            Err(e) => return self.reply(&e.to_string()).await,
        };
        let handle = self.server().registry.create(config).await;
        self.join(handle).await
    }

    fn match_config(&self, options: &CreateOptions) -> Result<MatchConfig, CommandError> {
        let capacity = options.num_players()?;
        let max_turns = self
            .server()
            .config
            .matches
            .max_turns_for(options.max_turns()?)?;
        Ok(MatchConfig::new(capacity).with_max_turns(max_turns))
    }

    async fn join(&mut self, handle: MatchHandle) -> Result<(), ServerError> {
        let result = handle
            .join(self.conn_id, self.name.clone(), self.events.clone())
            .await;
        match result {
            Ok(seat) => {
                tracing::info!(
                    conn_id = %self.conn_id,
                    match_id = %handle.id(),
                    slot = seat.slot,
                    "joined match"
                );
                self.guard.joined = Some(handle);
                self.protocol = ConnectionState::Joined;
                self.reply(&seat.uri.to_string()).await
            }
            Err(MatchError::Full(_)) => self.reply("Match is full!").await,
            Err(MatchError::NotFound(_) | MatchError::Unavailable(_)) => {
                self.reply("Match does not exist!").await
            }
            Err(e) => self.reply(&e.to_string()).await,
        }
    }

    async fn list_matches(&self) -> Result<(), ServerError> {
        let infos = self.server().registry.list().await;
        if infos.is_empty() {
            return self.reply("No matches created.").await;
        }
        let listing = infos
            .iter()
            .map(|info| info.occupancy())
            .collect::<Vec<_>>()
            .join(", ");
        self.reply(&listing).await
    }

    async fn list_players(&self, id: &MatchId) -> Result<(), ServerError> {
        let info = match self.server().registry.get(id).await {
            Ok(handle) => handle.info().await.ok(),
            Err(_) => None,
        };
        match info {
            Some(info) => self.reply(&info.roster_line()).await,
            None => self.reply("Match does not exist!").await,
        }
    }

    async fn on_start(&mut self) -> Result<Flow, ServerError> {
        let Some(handle) = self.guard.joined.clone() else {
            return Ok(self.violation(ProtocolError::InvalidMessage(
                "joined without a match".into(),
            )));
        };

        match handle.start(self.conn_id).await {
            // Settings arrive as a MatchEvent.
            Ok(StartOutcome::Started | StartOutcome::AlreadyRunning) => Ok(Flow::Continue),
            Err(MatchError::NotFull(_)) => {
                let roster = match handle.info().await {
                    Ok(info) => info.roster_line(),
                    Err(e) => return Ok(self.match_failed(&e, "roster unavailable")),
                };
                self.reply(&format!("Match is not full! {roster}")).await?;
                Ok(Flow::Continue)
            }
            // The match told everyone, including us, to terminate.
            Err(MatchError::Engine(_)) => Ok(Flow::Continue),
            Err(e) => Ok(self.match_failed(&e, "start failed")),
        }
    }

    async fn on_turn_request(&mut self) -> Result<Flow, ServerError> {
        let snapshot = match &self.guard.joined {
            Some(handle) => handle.snapshot().await,
            None => Ok(None),
        };
        match snapshot {
            Ok(Some(snapshot)) => {
                self.protocol = ConnectionState::Turn;
                self.send_snapshot(snapshot).await?;
                Ok(Flow::Continue)
            }
            Ok(None) => Ok(self.violation(ProtocolError::InvalidMessage(
                "TURN before the match has a snapshot".into(),
            ))),
            Err(e) => Ok(self.match_failed(&e, "snapshot unavailable")),
        }
    }

    async fn on_submit(&mut self, payload: &[u8]) -> Result<Flow, ServerError> {
        let batch: ActionBatch = match self.server().codec.decode(payload) {
            Ok(batch) => batch,
            Err(e) => return Ok(self.violation(e)),
        };
        let Some(handle) = self.guard.joined.clone() else {
            return Ok(self.violation(ProtocolError::InvalidMessage(
                "actions without a match".into(),
            )));
        };

        match handle.submit(self.conn_id, batch).await {
            Ok(outcome) => {
                tracing::debug!(conn_id = %self.conn_id, ?outcome, "actions accepted");
                Ok(Flow::Continue)
            }
            Err(MatchError::InvalidActions(why)) => {
                Ok(self.violation(ProtocolError::InvalidMessage(why)))
            }
            Err(MatchError::Engine(_)) => Ok(Flow::Continue),
            Err(e) => Ok(self.match_failed(&e, "submit failed")),
        }
    }

    /// Closes after a match request failed. A match that stopped mid-request
    /// may still have a terminate notice queued for this connection.
    fn match_failed(&self, error: &MatchError, what: &str) -> Flow {
        tracing::info!(conn_id = %self.conn_id, error = %error, "{}", what);
        match error {
            MatchError::Unavailable(_) => Flow::Orphaned,
            _ => Flow::Close,
        }
    }

    /// Logs a fatal protocol error. The connection closes and the guard
    /// aborts the match.
    fn violation(&self, error: ProtocolError) -> Flow {
        tracing::warn!(
            conn_id = %self.conn_id,
            state = %self.protocol,
            error = %error,
            "protocol violation, closing connection"
        );
        Flow::Close
    }

    // -----------------------------------------------------------------------
    // Match events
    // -----------------------------------------------------------------------

    async fn on_event(&mut self, event: MatchEvent) -> Result<Flow, ServerError> {
        match event {
            MatchEvent::Started(settings) => {
                self.protocol = ConnectionState::Started;
                let payload = self.server().codec.encode(&settings)?;
                self.send(&payload).await?;
                tracing::debug!(conn_id = %self.conn_id, slot = settings.player_slot, "settings sent");
                Ok(Flow::Continue)
            }
            MatchEvent::Snapshot { state, snapshot } => {
                self.protocol = state;
                self.send_snapshot(snapshot).await?;
                Ok(Flow::Continue)
            }
            MatchEvent::Terminate(reason) => {
                // The match already ended; nothing left to abort.
                self.guard.joined = None;
                if let Some(notice) = reason.notice() {
                    self.protocol = ConnectionState::Disconnected;
                    self.reply(notice).await?;
                }
                tracing::debug!(conn_id = %self.conn_id, ?reason, "terminated by match");
                Ok(Flow::Close)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    async fn send_snapshot(&mut self, snapshot: StateSnapshot) -> Result<(), ServerError> {
        let payload = self.server().codec.encode(&snapshot)?;
        self.history.insert(snapshot.turn, snapshot);
        self.send(&payload).await
    }

    async fn reply(&self, text: &str) -> Result<(), ServerError> {
        self.send(text.as_bytes()).await
    }

    /// Sends `payload` prefixed with the current state name.
    async fn send(&self, payload: &[u8]) -> Result<(), ServerError> {
        tracing::trace!(conn_id = %self.conn_id, state = %self.protocol, len = payload.len(), ">>");
        let framed = self.protocol.frame(payload);
        self.conn.send(&framed).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use rgmatch_game::{EngineError, MatchRegistry};
    use rgmatch_protocol::{ActionSet, BincodeCodec, GameSettings, Location};
    use rgmatch_transport::{FramePolicy, TcpTransport, Transport};

    use super::*;
    use crate::ServerConfig;

    struct EmptyBoard;

    impl Engine for EmptyBoard {
        fn game_settings(&self, player_count: u8, max_turns: u32) -> GameSettings {
            GameSettings {
                board_size: 4,
                obstacles: Vec::new(),
                spawns: vec![Location::new(1, 1)],
                spawn_period: 10,
                player_count,
                spawn_amount: 1,
                max_turns,
            }
        }

        fn initial_state(&self, _settings: &GameSettings) -> Result<StateSnapshot, EngineError> {
            Ok(StateSnapshot::new(1))
        }

        fn resolve(
            &self,
            _settings: &GameSettings,
            state: &StateSnapshot,
            _actions: &ActionSet,
        ) -> Result<StateSnapshot, EngineError> {
            Ok(state.clone())
        }
    }

    type TestState = ServerState<EmptyBoard, BincodeCodec>;

    /// A connected socket pair: (client side, server side).
    async fn socket_pair() -> (TcpConnection, TcpConnection) {
        let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap().to_string();
        let (client, server) = tokio::join!(
            TcpConnection::connect(&addr, FramePolicy::Queue),
            transport.accept()
        );
        (client.unwrap(), server.unwrap())
    }

    fn server_state() -> Arc<TestState> {
        Arc::new(ServerState {
            registry: MatchRegistry::new(Arc::new(EmptyBoard), "127.0.0.1", 8007),
            codec: BincodeCodec,
            config: ServerConfig::default(),
            // Accounts for the session built below.
            connections: AtomicUsize::new(1),
        })
    }

    fn session<'a>(
        conn: &'a TcpConnection,
        state: &Arc<TestState>,
        protocol: ConnectionState,
        events: MemberSender,
    ) -> Session<'a, EmptyBoard, BincodeCodec> {
        Session {
            conn,
            conn_id: conn.id(),
            protocol,
            name: "tester".to_string(),
            guard: ConnectionGuard {
                conn_id: conn.id(),
                state: Arc::clone(state),
                joined: None,
            },
            events,
            history: BTreeMap::new(),
        }
    }

    async fn recv_text(conn: &TcpConnection) -> String {
        let data = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        String::from_utf8(data).unwrap()
    }

    #[tokio::test]
    async fn test_vanished_match_still_delivers_its_notice() {
        let (client, server) = socket_pair().await;
        let state = server_state();

        let handle = state.registry.create(MatchConfig::new(2)).await;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (peer_tx, _peer_rx) = mpsc::unbounded_channel();
        let peer = ConnectionId::new(u64::MAX);
        handle
            .join(server.id(), "tester".into(), events_tx.clone())
            .await
            .unwrap();
        handle.join(peer, "peer".into(), peer_tx).await.unwrap();
        handle.start(peer).await.unwrap();
        assert!(matches!(
            events_rx.recv().await,
            Some(MatchEvent::Started(_))
        ));

        // The peer leaves; the actor queues our notice and stops.
        handle.abort(Some(peer)).await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.info().await.is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let mut session = session(&server, &state, ConnectionState::Turn, events_tx);
        session.guard.joined = Some(handle);

        let mut unit = b"TURN ".to_vec();
        unit.extend(BincodeCodec.encode(&ActionBatch::new(1)).unwrap());
        assert_eq!(session.on_unit(&unit).await.unwrap(), Flow::Orphaned);

        session.drain_events(&mut events_rx).await.unwrap();
        assert_eq!(
            recv_text(&client).await,
            "DISCONNECTED Player disconnected from match."
        );
        assert_eq!(session.protocol, ConnectionState::Disconnected);
        assert!(session.guard.joined.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_input_closes_in_late_states() {
        let (_client, server) = socket_pair().await;
        let state = server_state();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        for protocol in [ConnectionState::Turn, ConnectionState::Ended] {
            let mut session = session(&server, &state, protocol, events_tx.clone());
            for unit in [&b"LIST"[..], b"TURN", b"START", b"NAME bob"] {
                assert_eq!(
                    session.on_unit(unit).await.unwrap(),
                    Flow::Close,
                    "{protocol} + {}",
                    String::from_utf8_lossy(unit)
                );
            }
            // Offsets the decrement when this session drops.
            state.connections.fetch_add(1, Ordering::SeqCst);
        }
    }
}
