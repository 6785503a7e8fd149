//! Match registry: creates, tracks, and looks up live matches.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;
use rgmatch_protocol::{MatchId, MatchUri};
use tokio::sync::Mutex;

use crate::orchestrator::spawn_match;
use crate::{Engine, MatchConfig, MatchError, MatchHandle, MatchInfo};

/// Default command channel size for match actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// IdGenerator
// ---------------------------------------------------------------------------

/// Produces short alphanumeric match ids.
///
/// Candidates are drawn at the current minimum length. A collision with a
/// live id raises the minimum by one before the next draw, so ids only
/// get longer while the server is busy. [`IdGenerator::reset`] brings the
/// floor back to one character.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    min_len: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { min_len: 1 }
    }

    /// Length of the next candidate.
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Draws ids until one is not live.
    pub fn generate<R: Rng>(
        &mut self,
        rng: &mut R,
        is_live: impl Fn(&MatchId) -> bool,
    ) -> MatchId {
        loop {
            let candidate: String = (0..self.min_len)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect();
            match MatchId::parse(&candidate) {
                Some(id) if !is_live(&id) => return id,
                _ => self.min_len += 1,
            }
        }
    }

    pub fn reset(&mut self) {
        self.min_len = 1;
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MatchRegistry
// ---------------------------------------------------------------------------

struct RegistryInner {
    matches: BTreeMap<MatchId, MatchHandle>,
    ids: IdGenerator,
}

/// Every live match on the server, keyed by id.
///
/// The registry is process-scoped state: one instance is created with the
/// server and shared by every connection task. It is cheap to clone. The
/// lock only guards insert, delete and lookup; it is never held while
/// waiting on a match actor.
pub struct MatchRegistry<E: Engine> {
    inner: Arc<Mutex<RegistryInner>>,
    engine: Arc<E>,
    host: Arc<str>,
    port: u16,
}

impl<E: Engine> Clone for MatchRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            engine: Arc::clone(&self.engine),
            host: Arc::clone(&self.host),
            port: self.port,
        }
    }
}

impl<E: Engine> MatchRegistry<E> {
    /// Creates an empty registry. `host` and `port` are what match URIs
    /// advertise.
    pub fn new(engine: Arc<E>, host: &str, port: u16) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                matches: BTreeMap::new(),
                ids: IdGenerator::new(),
            })),
            engine,
            host: Arc::from(host),
            port,
        }
    }

    /// The URI a match with this id is reachable at.
    pub fn uri_for(&self, id: &MatchId) -> MatchUri {
        MatchUri::for_match(&self.host, self.port, id.clone())
    }

    /// Creates a new match under a fresh id and starts its actor.
    pub async fn create(&self, config: MatchConfig) -> MatchHandle {
        let mut inner = self.inner.lock().await;
        let RegistryInner { matches, ids } = &mut *inner;
        let id = ids.generate(&mut rand::rng(), |candidate| {
            matches.contains_key(candidate)
        });

        let handle = spawn_match(
            id.clone(),
            self.uri_for(&id),
            config,
            Arc::clone(&self.engine),
            self.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        matches.insert(id.clone(), handle.clone());
        tracing::info!(
            match_id = %id,
            capacity = config.capacity,
            max_turns = config.max_turns,
            "match created"
        );
        handle
    }

    /// Looks up a live match.
    ///
    /// # Errors
    /// [`MatchError::NotFound`] if no live match has this id.
    pub async fn get(&self, id: &MatchId) -> Result<MatchHandle, MatchError> {
        self.inner
            .lock()
            .await
            .matches
            .get(id)
            .cloned()
            .ok_or_else(|| MatchError::NotFound(id.clone()))
    }

    /// Removes a match. Returns `false` if it was already gone.
    ///
    /// When the last match is removed the id floor goes back to one
    /// character.
    pub async fn remove(&self, id: &MatchId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.matches.remove(id).is_some();
        if removed {
            tracing::info!(match_id = %id, live = inner.matches.len(), "match removed");
        }
        if inner.matches.is_empty() {
            inner.ids.reset();
        }
        removed
    }

    /// Returns cloned handles to all live matches.
    pub async fn handles(&self) -> Vec<MatchHandle> {
        self.inner.lock().await.matches.values().cloned().collect()
    }

    /// Info for every live match, ordered by id.
    ///
    /// Matches that end while being queried are skipped.
    pub async fn list(&self) -> Vec<MatchInfo> {
        let handles = self.handles().await;
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.matches.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Length of the next generated id.
    pub async fn id_floor(&self) -> usize {
        self.inner.lock().await.ids.min_len()
    }
}
