use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::session::SessionStore;

/// Longest idle time a session may be given; larger settings are clamped.
const MAX_TTL_DAYS: i64 = 36_500;

pub fn spawn_background_jobs(sessions: SessionStore, config: SessionConfig) {
    let ttl = session_ttl(config.ttl_secs);
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.purge_interval_secs.max(1)));
        loop {
            ticker.tick().await;
            purge_sessions(&sessions, ttl).await;
        }
    });

    info!("Background jobs started");
}

async fn purge_sessions(sessions: &SessionStore, ttl: chrono::Duration) -> usize {
    let purged = sessions.purge_expired(ttl).await;
    if purged > 0 {
        let remaining = sessions.len().await;
        info!(purged, remaining, "Purged expired sessions");
    }
    purged
}

fn session_ttl(secs: u64) -> chrono::Duration {
    let max = chrono::Duration::days(MAX_TTL_DAYS);
    match i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds) {
        Some(ttl) if ttl <= max => ttl,
        _ => {
            warn!(ttl_secs = secs, max_days = MAX_TTL_DAYS, "Session TTL too large, clamping");
            max
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnRoles, Table};

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_session_ttl_clamps() {
        assert_eq!(session_ttl(3600), chrono::Duration::seconds(3600));
        assert_eq!(session_ttl(u64::MAX), chrono::Duration::days(MAX_TTL_DAYS));
        assert_eq!(session_ttl(i64::MAX as u64), chrono::Duration::days(MAX_TTL_DAYS));
    }

    #[tokio::test]
    async fn test_purge_future_is_send() {
        let store = SessionStore::new(4);
        let purge = purge_sessions(&store, chrono::Duration::hours(1));
        assert_send(&purge);
        assert_eq!(purge.await, 0);
    }

    #[tokio::test]
    async fn test_background_purge_runs() {
        let store = SessionStore::new(4);
        store.create(Table::default(), ColumnRoles::default()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let config = SessionConfig {
            ttl_secs: 0,
            ..SessionConfig::default()
        };
        spawn_background_jobs(store.clone(), config);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len().await, 0);
    }
}
