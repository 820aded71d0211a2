//! Session Memory Store
//!
//! Holds bounded conversation history per session. Histories are trimmed
//! to the most recent N turns on every save (FIFO by fixed window, not by
//! access pattern) and live for the process lifetime until explicitly
//! cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default number of turns retained per session
pub const DEFAULT_SESSION_WINDOW: usize = 10;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message in a session's conversational history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Process-wide session store with a FIFO history window
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
    window: usize,
}

impl SessionStore {
    pub fn new(window: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            window,
        }
    }

    /// Turns retained per session
    pub fn window(&self) -> usize {
        self.window
    }

    /// History for a session, oldest-first. Empty when the session is unknown.
    pub fn get_history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a history, silently dropping all but the most recent N turns
    pub fn save_history(&self, session_id: &str, mut history: Vec<Turn>) {
        if history.len() > self.window {
            history.drain(..history.len() - self.window);
        }
        self.sessions
            .write()
            .expect("session lock poisoned")
            .insert(session_id.to_string(), history);
    }

    /// Remove a session entirely. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .expect("session lock poisoned")
            .remove(session_id)
            .is_some()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_WINDOW)
    }
}
