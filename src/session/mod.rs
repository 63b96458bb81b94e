//! Evolution sessions and their registry.
//!
//! Each session is an independent engine with its own state; only the
//! session's generation loop mutates it. The registry is a plain map behind
//! a lock that guards inserts and removals, never per-engine work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use crate::engine::{EvolutionSnapshot, GpEngine, Observer, StopToken, Update};
use crate::error::EngineError;

/// Handle to one running (or runnable) evolution.
#[derive(Clone)]
pub struct Session {
    id: String,
    engine: Arc<Mutex<GpEngine>>,
    stop: StopToken,
}

impl Session {
    pub fn new(id: impl Into<String>, engine: GpEngine) -> Self {
        let stop = engine.stop_token();
        Self {
            id: id.into(),
            engine: Arc::new(Mutex::new(engine)),
            stop,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> Arc<Mutex<GpEngine>> {
        self.engine.clone()
    }

    /// Run the generation loop to completion, streaming updates to the
    /// observer. Returns the terminal payload.
    pub async fn evolve(&self, observer: &mut (dyn Observer + Send)) -> Update {
        GpEngine::evolve(self.engine.clone(), observer).await
    }

    /// Request a cooperative stop. Idempotent, non-blocking, observed at
    /// the next generation boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Capture a deep-copied snapshot between generations.
    pub async fn checkpoint_state(&self) -> EvolutionSnapshot {
        self.engine.lock().await.checkpoint_state()
    }

    /// Replace the engine state with a previously captured snapshot.
    pub async fn restore(&self, snapshot: EvolutionSnapshot) -> Result<(), EngineError> {
        self.engine.lock().await.restore(snapshot)
    }
}

/// Shared map from session id to handle.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: StdMutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns the previous holder of the id, if any.
    pub fn insert(&self, session: Session) -> Option<Session> {
        self.sessions
            .lock()
            .expect("session registry lock")
            .insert(session.id().to_string(), session)
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions
            .lock()
            .expect("session registry lock")
            .get(id)
            .cloned()
    }

    /// Remove a session (on stop, error, or finalization).
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions
            .lock()
            .expect("session registry lock")
            .remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .expect("session registry lock")
            .keys()
            .cloned()
            .collect()
    }
}
