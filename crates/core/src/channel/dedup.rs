//! Time-bounded deduplication of status events.

use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// Seen-key cache with a fixed retention window.
///
/// Keys are retained for the TTL after first sight, then evicted by a single
/// sweep pass piggybacked on inserts. This keeps memory bounded under a
/// message storm without spawning a timer per entry.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    seen: HashMap<String, Instant>,
    last_sweep: Instant,
}

impl DedupCache {
    /// Create a cache with the given retention window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    /// Record a key. Returns `true` if this is the first sight within the
    /// retention window, `false` for a duplicate that should be dropped.
    ///
    /// Duplicates do not refresh the retention window; the first-sight time
    /// wins.
    pub fn insert(&mut self, key: &str) -> bool {
        self.maybe_sweep();

        let now = Instant::now();
        match self.seen.get(key) {
            Some(first_seen) if now.duration_since(*first_seen) < self.ttl => false,
            _ => {
                self.seen.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Number of retained keys (expired entries may linger until the next
    /// sweep).
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True when no keys are retained.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Evict expired entries, at most once per TTL interval.
    fn maybe_sweep(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_sweep) < self.ttl {
            return;
        }
        let ttl = self.ttl;
        self.seen
            .retain(|_, first_seen| now.duration_since(*first_seen) < ttl);
        self.last_sweep = now;
    }
}
