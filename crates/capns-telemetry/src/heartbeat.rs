// SPDX-License-Identifier: MIT OR Apache-2.0
//! A minimal heartbeat liveness tracker.
//!
//! spec.md §5 leaves the actual liveness policy out of scope ("a separate
//! liveness policy (not in this spec) can invoke `close()` on silent
//! peers") but the host/plugin still need *something* to drive that call
//! from. This is that something: last-seen timestamps keyed by peer id,
//! queried on demand rather than run as a background task.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks the last time each peer (by some caller-chosen key, e.g. a
/// child process id or a relay master index) was observed alive.
pub struct HeartbeatMonitor<K> {
    last_seen: Mutex<HashMap<K, Instant>>,
}

impl<K> Default for HeartbeatMonitor<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            last_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> HeartbeatMonitor<K>
where
    K: Eq + Hash + Clone,
{
    /// An empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` was just observed alive (a `HEARTBEAT` reply, or
    /// any other frame, arrived from it).
    pub fn touch(&self, key: K) {
        self.last_seen
            .lock()
            .expect("heartbeat monitor lock poisoned")
            .insert(key, Instant::now());
    }

    /// Drop a peer's bookkeeping entirely (it disconnected).
    pub fn forget(&self, key: &K) {
        self.last_seen.lock().expect("heartbeat monitor lock poisoned").remove(key);
    }

    /// `true` if `key` has never been seen, or was last seen longer than
    /// `timeout` ago.
    #[must_use]
    pub fn is_stale(&self, key: &K, timeout: Duration) -> bool {
        match self.last_seen.lock().expect("heartbeat monitor lock poisoned").get(key) {
            Some(seen) => seen.elapsed() > timeout,
            None => true,
        }
    }

    /// Every tracked key whose last-seen time exceeds `timeout`; the
    /// caller is expected to call `close()` on each.
    #[must_use]
    pub fn stale_keys(&self, timeout: Duration) -> Vec<K> {
        self.last_seen
            .lock()
            .expect("heartbeat monitor lock poisoned")
            .iter()
            .filter(|(_, seen)| seen.elapsed() > timeout)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_key_is_stale() {
        let monitor: HeartbeatMonitor<&str> = HeartbeatMonitor::new();
        assert!(monitor.is_stale(&"peer-a", Duration::from_secs(30)));
    }

    #[test]
    fn touched_key_is_not_stale_under_timeout() {
        let monitor: HeartbeatMonitor<&str> = HeartbeatMonitor::new();
        monitor.touch("peer-a");
        assert!(!monitor.is_stale(&"peer-a", Duration::from_secs(30)));
    }

    #[test]
    fn touched_key_is_stale_past_zero_timeout() {
        let monitor: HeartbeatMonitor<&str> = HeartbeatMonitor::new();
        monitor.touch("peer-a");
        std::thread::sleep(Duration::from_millis(5));
        assert!(monitor.is_stale(&"peer-a", Duration::from_millis(0)));
    }

    #[test]
    fn forget_removes_the_entry() {
        let monitor: HeartbeatMonitor<&str> = HeartbeatMonitor::new();
        monitor.touch("peer-a");
        monitor.forget(&"peer-a");
        assert!(monitor.is_stale(&"peer-a", Duration::from_secs(30)));
    }

    #[test]
    fn stale_keys_lists_only_expired_entries() {
        let monitor: HeartbeatMonitor<&str> = HeartbeatMonitor::new();
        monitor.touch("fresh");
        assert!(monitor.stale_keys(Duration::from_secs(30)).is_empty());
        assert!(monitor.stale_keys(Duration::from_secs(0)).contains(&"fresh"));
    }
}
