//! Duplicate suppression for browser download events.
//!
//! Browsers fire several "created" events for one logical download (redirects,
//! retries, prerendered pages). Two strategies are combined:
//!
//! - a **tracker** set of URLs already queued or sent, kept until the native
//!   download completes (plus a grace delay), the dispatch fails, or eviction
//!   pressure pushes it out;
//! - a **window** map of URL → last-seen instant rejecting repeat events that
//!   arrive within a short window of each other.
//!
//! The tracker is bounded: once it holds `capacity` URLs, the oldest 20% (by
//! insertion order) are evicted before the next insert. The window map is
//! pruned on every check so it only holds URLs seen within one window.
//!
//! Nothing here is persisted. A fresh process starts with an empty guard.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default maximum number of tracked URLs.
pub const DEFAULT_TRACKER_CAPACITY: usize = 1000;

/// Default window during which repeat events for a URL are suppressed.
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(5);

/// Share of the tracker kept on eviction (80%, so the oldest 20% go).
const RETAIN_PERCENT: usize = 80;

/// Result of [`DedupGuard::check_and_remember`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    /// First sighting; the URL is now tracked.
    Fresh,
    /// The URL is already in the tracker.
    Tracked,
    /// Another event for the URL arrived within the window.
    WithinWindow,
}

#[derive(Debug, Default)]
struct DedupState {
    /// Insertion order, oldest first. Mirrors `members` exactly.
    order: VecDeque<String>,
    members: HashSet<String>,
    last_seen: HashMap<String, Instant>,
}

/// Bounded, time-windowed duplicate tracker.
#[derive(Debug)]
pub struct DedupGuard {
    capacity: usize,
    window: Duration,
    state: Mutex<DedupState>,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKER_CAPACITY, DEFAULT_DUPLICATE_WINDOW)
    }
}

impl DedupGuard {
    /// Creates a guard. A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            state: Mutex::new(DedupState::default()),
        }
    }

    /// Maximum number of tracked URLs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if the URL is tracked or was seen within the window.
    #[must_use]
    pub fn is_duplicate(&self, url: &str) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        self.prune_window(&mut state, now);
        state.members.contains(url) || state.last_seen.contains_key(url)
    }

    /// Atomically checks both strategies and, for a fresh URL, tracks it.
    ///
    /// Every call refreshes the URL's last-seen instant, so a burst of events
    /// keeps being suppressed until it goes quiet for a full window.
    pub fn check_and_remember(&self, url: &str) -> DedupVerdict {
        let now = Instant::now();
        let mut state = self.lock();
        self.prune_window(&mut state, now);

        let seen_recently = state.last_seen.insert(url.to_string(), now).is_some();
        let verdict = if state.members.contains(url) {
            DedupVerdict::Tracked
        } else if seen_recently {
            DedupVerdict::WithinWindow
        } else {
            self.insert(&mut state, url);
            DedupVerdict::Fresh
        };

        debug!(url, ?verdict, tracked = state.members.len(), "dedup check");
        verdict
    }

    /// Adds a URL to the tracker, evicting the oldest entries at capacity.
    pub fn remember(&self, url: &str) {
        let mut state = self.lock();
        self.insert(&mut state, url);
    }

    /// Removes a URL from the tracker. Its window entry expires on its own.
    pub fn forget(&self, url: &str) {
        let mut state = self.lock();
        if state.members.remove(url) {
            state.order.retain(|entry| entry != url);
        }
        debug!(url, tracked = state.members.len(), "forgot url");
    }

    /// True if the URL is in the tracker (ignores the window).
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.lock().members.contains(url)
    }

    /// Number of tracked URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked URLs, oldest first.
    #[must_use]
    pub fn tracked(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// Drops all state.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.order.clear();
        state.members.clear();
        state.last_seen.clear();
    }

    fn insert(&self, state: &mut DedupState, url: &str) {
        if state.members.contains(url) {
            return;
        }
        if state.members.len() >= self.capacity {
            let keep = self.capacity * RETAIN_PERCENT / 100;
            let evict = state.members.len().saturating_sub(keep);
            for old in state.order.drain(..evict) {
                state.members.remove(&old);
            }
            debug!(evicted = evict, kept = state.members.len(), "dedup tracker at capacity");
        }
        state.members.insert(url.to_string());
        state.order.push_back(url.to_string());
    }

    fn prune_window(&self, state: &mut DedupState, now: Instant) {
        let window = self.window;
        state
            .last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to reuse.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
