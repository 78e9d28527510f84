//! The Reaper — a single long-lived background task that evicts peers whose
//! last-seen heartbeat exceeds the liveness threshold.
//!
//! Same shape as [`crate::persistence::spawn_health_probe`]: a
//! `tokio::time::interval` loop that never terminates on an ordinary error,
//! only on the handle being dropped/aborted by the caller.

use std::time::Duration;

use crate::peers::ActivePeerTable;

/// How often the reaper wakes to scan for stale sessions.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A session idle for longer than this is evicted.
pub const EVICTION_THRESHOLD_SECS: u64 = 120;

/// Spawn the reaper task. Evicted sessions are logged and silently dropped;
/// no storage mutation occurs (sessions are purely in-memory).
pub fn spawn(peers: ActivePeerTable) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = peers.evict_stale(EVICTION_THRESHOLD_SECS);
            for session in evicted {
                tracing::info!(
                    name = %session.user_name,
                    last_active = session.last_active,
                    "reaped stale session"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_threshold_is_two_minutes() {
        assert_eq!(EVICTION_THRESHOLD_SECS, 120);
        assert_eq!(SWEEP_INTERVAL, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn spawned_task_runs_independently_of_callers() {
        let peers = ActivePeerTable::new(5);
        peers.add("alice", "tok1", "10.0.0.1", 1052).unwrap();

        let handle = spawn(peers.clone());
        // Fresh sessions are well within the threshold; the reaper must not
        // touch them before the first sweep interval elapses.
        tokio::task::yield_now().await;
        assert!(peers.is_active("alice"));
        handle.abort();
    }
}
