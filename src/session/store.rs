use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ColumnRoles, ForecastMethod, ForecastResult, Table};

#[derive(Debug, Clone, Serialize)]
pub struct StoredForecast {
    pub method: ForecastMethod,
    pub periods: usize,
    pub result: ForecastResult,
    pub generated_at: DateTime<Utc>,
}

/// One uploaded table with the state derived from it.
#[derive(Debug, Clone)]
pub struct Session {
    pub table: Arc<Table>,
    pub roles: ColumnRoles,
    pub forecast: Option<StoredForecast>,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// In-memory sessions keyed by id. Readers get a snapshot; the table itself
/// is shared and never mutated after upload.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Store a table under a fresh id, evicting the least recently used
    /// session when the store is full.
    pub async fn create(&self, table: Table, roles: ColumnRoles) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_access)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            info!(session_id = %oldest, "Evicted session to make room");
        }

        sessions.insert(
            id,
            Session {
                table: Arc::new(table),
                roles,
                forecast: None,
                created_at: now,
                last_access: now,
            },
        );
        debug!(session_id = %id, total = sessions.len(), "Session created");
        id
    }

    /// Snapshot of a session. Refreshes its last access time.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        session.last_access = Utc::now();
        Some(session.clone())
    }

    /// Replace the stored forecast. Returns false when the session is gone.
    pub async fn set_forecast(&self, id: Uuid, forecast: StoredForecast) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                session.forecast = Some(forecast);
                session.last_access = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    pub async fn purge_expired(&self, ttl: Duration) -> usize {
        match Utc::now().checked_sub_signed(ttl) {
            Some(cutoff) => self.purge_idle_since(cutoff).await,
            None => 0,
        }
    }

    async fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_access >= cutoff);
        before - sessions.len()
    }
}
