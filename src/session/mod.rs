//! In-memory session map keyed by a per-connection session id.
//!
//! Grounded on the teacher's `session/session_manager.rs` (`SessionState`
//! with `created_at`/`last_activity`, `is_timed_out()` computed against
//! `SystemTime::now()`), narrowed to the fixed-TTL session spec §4.7
//! requires and without the teacher's richer status/metrics fields.

use crate::error::{DbError, Result};
use crate::identity::User;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub created_at: i64,
    pub expires_at: i64,
}

fn now_epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, id: &str, user: User) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(id) {
            return Err(DbError::SessionAlreadyExists);
        }
        let now = now_epoch_secs();
        sessions.insert(
            id.to_string(),
            Session { user, created_at: now, expires_at: now + SESSION_TTL_SECS },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Session> {
        let sessions = self.sessions.read();
        let session = sessions.get(id).ok_or(DbError::ExpiredSession)?;
        if now_epoch_secs() > session.expires_at {
            return Err(DbError::ExpiredSession);
        }
        Ok(session.clone())
    }

    /// Persists an in-place mutation of the session's user (e.g. after
    /// `assign_role`/`divest_role`/`setNamespace`). No-op on a missing id.
    pub fn update_user(&self, id: &str, user: User) {
        if let Some(session) = self.sessions.write().get_mut(id) {
            session.user = user;
        }
    }

    pub fn delete(&self, id: &str) {
        self.sessions.write().remove(id);
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
