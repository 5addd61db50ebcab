//! Session manager (spec §4.4 "Session manager").
//!
//! Grounded on `services/token_blacklist_service.rs`'s `TokenBlacklistService`:
//! a `DashMap`-backed table with a spawned background cleanup loop, adapted
//! from "blacklisted jti" to "live session record."

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::Identity;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub id: String,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
    pub is_active: bool,
}

/// Thread-safe, in-memory session table with periodic expiry cleanup.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, Session>>,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        let manager = Self {
            sessions: Arc::new(DashMap::new()),
            timeout,
        };

        let sessions = manager.sessions.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                let now = Utc::now();
                sessions.retain(|_, s| s.is_active || s.expires_at > now);
                tracing::debug!(remaining = sessions.len(), "session table cleanup pass");
            }
        });

        manager
    }

    pub fn create_session(&self, identity: Identity, metadata: HashMap<String, String>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            identity,
            created_at: now,
            last_activity: now,
            expires_at: now + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::hours(1)),
            metadata,
            is_active: true,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Returns the live session after refreshing `last_activity`, or `None`
    /// if absent or expired (in which case the record is invalidated).
    pub fn get_session(&self, id: &str) -> Option<Session> {
        let mut entry = self.sessions.get_mut(id)?;
        if !entry.is_active || entry.expires_at <= Utc::now() {
            entry.is_active = false;
            return None;
        }
        entry.last_activity = Utc::now();
        Some(entry.clone())
    }

    pub fn extend_session(&self, id: &str) -> Option<Session> {
        let mut entry = self.sessions.get_mut(id)?;
        let now = Utc::now();
        if !entry.is_active || entry.expires_at <= now {
            entry.is_active = false;
            return None;
        }
        entry.last_activity = now;
        entry.expires_at = now + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::hours(1));
        Some(entry.clone())
    }

    pub fn invalidate_session(&self, id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.is_active = false;
        }
    }

    pub fn cleanup_expired_sessions(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, s| s.is_active || s.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
