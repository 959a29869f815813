//! In-memory registry of configurator sessions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::preview::PreviewChannel;
use super::session::{ConfiguratorSession, EngineContext, SessionError};

/// Live sessions keyed by id, bounded in number and idle time
pub struct SessionRegistry {
    context: Arc<EngineContext>,
    sessions: DashMap<Uuid, Arc<ConfiguratorSession>>,
    max_sessions: usize,
    idle_timeout: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(context: Arc<EngineContext>, max_sessions: usize, idle_timeout: std::time::Duration) -> Self {
        let idle_timeout = chrono::Duration::from_std(idle_timeout).unwrap_or_else(|_| chrono::Duration::days(365));

        SessionRegistry {
            context,
            sessions: DashMap::new(),
            max_sessions,
            idle_timeout,
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Open a new session on the configuration step
    pub fn create(&self) -> Result<Arc<ConfiguratorSession>, SessionError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::Capacity(self.max_sessions));
        }

        let session = Arc::new(ConfiguratorSession::new(self.context.clone(), PreviewChannel::new()));
        self.sessions.insert(session.id(), session.clone());
        info!(session_id = %session.id(), active = self.sessions.len(), "Session created");

        Ok(session)
    }

    /// Look up a session and mark it active
    pub fn get(&self, id: Uuid) -> Result<Arc<ConfiguratorSession>, SessionError> {
        let session = self
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::NotFound(id))?;
        session.touch();
        Ok(session)
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session closed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for longer than the timeout as of `now`
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.signed_duration_since(session.last_active()) <= self.idle_timeout);
        let evicted = before.saturating_sub(self.sessions.len());

        if evicted > 0 {
            info!(evicted = evicted, active = self.sessions.len(), "Evicted idle sessions");
        } else {
            debug!(active = self.sessions.len(), "No idle sessions to evict");
        }
        evicted
    }
}
