use crate::store::Store;
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    time::{Duration, Instant},
};

pub const DECAY_WINDOW: Duration = Duration::from_secs(3600);

pub const PLAY_LIMIT: u32 = 60;
pub const RATING_LIMIT: u32 = 30;
pub const REPORT_LIMIT: u32 = 10;
pub const SAVE_LIMIT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    due: Instant,
    key: String,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Approximate sliding-window limiter. Each grant increments a persisted
/// per-(nickname, action) counter and schedules its own decrement one window
/// later, so a burst decays grant by grant rather than all at once. Decrements
/// are fire-and-forget: a nickname change mid-session strands the old counter,
/// which simply drains on its own schedule.
#[derive(Debug, Default)]
pub struct RateLimiter {
    pending: BinaryHeap<Reverse<Pending>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or deny one unit for `(nickname, action)`. Denial does not
    /// consume anything.
    pub fn allow(
        &mut self,
        store: &Store,
        nickname: &str,
        action: &str,
        limit: u32,
        now: Instant,
    ) -> bool {
        self.poll(store, now);
        let key = counter_key(nickname, action);
        let count: u32 = store.get(&key, 0);
        if count >= limit {
            tracing::debug!(action, count, limit, "rate limit hit");
            return false;
        }
        if let Err(err) = store.set(&key, &(count + 1)) {
            tracing::warn!(action, %err, "failed to persist rate counter");
        }
        self.pending.push(Reverse(Pending {
            due: now + DECAY_WINDOW,
            key,
        }));
        true
    }

    /// Apply every decrement whose window has elapsed.
    pub fn poll(&mut self, store: &Store, now: Instant) {
        while let Some(Reverse(next)) = self.pending.peek() {
            if next.due > now {
                break;
            }
            let Some(Reverse(entry)) = self.pending.pop() else {
                break;
            };
            let count: u32 = store.get(&entry.key, 0);
            if count <= 1 {
                store.remove(&entry.key);
            } else if let Err(err) = store.set(&entry.key, &(count - 1)) {
                tracing::warn!(key = %entry.key, %err, "failed to decay rate counter");
            }
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn counter_key(nickname: &str, action: &str) -> String {
    format!("ratelimit-{}-{}", sanitize(nickname), sanitize(action))
}

fn sanitize(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        }
    }
    if out.is_empty() {
        out.push_str("anon");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store, RateLimiter) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store, RateLimiter::new())
    }

    #[test]
    fn burst_beyond_limit_is_denied() {
        let (_dir, store, mut limiter) = setup();
        let now = Instant::now();
        let results: Vec<bool> = (0..3)
            .map(|_| limiter.allow(&store, "player", "save", 2, now))
            .collect();
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn denial_does_not_consume_a_slot() {
        let (_dir, store, mut limiter) = setup();
        let now = Instant::now();
        assert!(limiter.allow(&store, "player", "save", 1, now));
        assert!(!limiter.allow(&store, "player", "save", 1, now));
        // Only the single grant has a scheduled decrement.
        assert_eq!(limiter.pending_len(), 1);
    }

    #[test]
    fn grants_decay_individually_after_the_window() {
        let (_dir, store, mut limiter) = setup();
        let start = Instant::now();
        assert!(limiter.allow(&store, "player", "save", 2, start));
        let later = start + Duration::from_secs(1800);
        assert!(limiter.allow(&store, "player", "save", 2, later));
        assert!(!limiter.allow(&store, "player", "save", 2, later));

        // First grant's hour elapses; one slot frees up, not both.
        let after_first = start + DECAY_WINDOW + Duration::from_secs(1);
        assert!(limiter.allow(&store, "player", "save", 2, after_first));
        assert!(!limiter.allow(&store, "player", "save", 2, after_first));
    }

    #[test]
    fn actions_and_users_are_isolated() {
        let (_dir, store, mut limiter) = setup();
        let now = Instant::now();
        assert!(limiter.allow(&store, "player", "save", 1, now));
        assert!(!limiter.allow(&store, "player", "save", 1, now));
        assert!(limiter.allow(&store, "player", "rating", 1, now));
        assert!(limiter.allow(&store, "guest", "save", 1, now));
    }

    #[test]
    fn renamed_user_starts_fresh() {
        let (_dir, store, mut limiter) = setup();
        let now = Instant::now();
        assert!(limiter.allow(&store, "old name", "save", 1, now));
        assert!(!limiter.allow(&store, "old name", "save", 1, now));
        assert!(limiter.allow(&store, "new name", "save", 1, now));
    }
}
