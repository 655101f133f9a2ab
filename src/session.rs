//! Session Access Counter (spec §4.3).
//!
//! A reference counter for session-ids with a per-key idle timer. Used by
//! the stateful Streamable-HTTP adapter to know when a session has had no
//! outstanding requests for `sessionTimeout` milliseconds.
//!
//! Modeled on the teacher's use of `DashMap` for per-connection tracking
//! in `transport::http::HttpTransport` (sharded, per-key atomic access
//! rather than one global mutex), with the timer arming/cancellation
//! handled via `JoinHandle::abort` the way an idle-timeout guard would be
//! expressed in any tokio codebase.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

struct Entry {
    count: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    entries: DashMap<String, Entry>,
    timeout: Option<Duration>,
    on_expire: Box<dyn Fn(String) + Send + Sync>,
}

/// Reference-counts session-ids and fires `on_expire(key)` after a key's
/// count has sat at zero for `timeout`.
///
/// Cheaply `Clone`: clones share the same underlying map and callback.
#[derive(Clone)]
pub struct SessionAccessCounter {
    inner: Arc<Inner>,
}

impl SessionAccessCounter {
    /// Creates a counter. `timeout` of `None` disables idle expiry
    /// entirely (matches §4.6: "If unset, sessions persist until the
    /// transport closes, errors, or a DELETE is processed").
    pub fn new(timeout: Option<Duration>, on_expire: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                timeout,
                on_expire: Box::new(on_expire),
            }),
        }
    }

    /// Increments the counter for `key`. If the counter was at zero, any
    /// armed idle timer is cancelled.
    pub fn inc(&self, key: &str, reason: &str) {
        let mut entry = self
            .inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { count: 0, timer: None });
        let was_zero = entry.count == 0;
        entry.count += 1;
        if was_zero {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
        debug!(key, reason, count = entry.count, "session counter inc");
    }

    /// Decrements the counter for `key` (never below zero). If the count
    /// reaches zero and a timeout is configured, arms a single-shot timer.
    pub fn dec(&self, key: &str, reason: &str) {
        let mut arm_timeout = None;
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
            if entry.count == 0 {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                arm_timeout = self.inner.timeout;
            }
        }
        debug!(key, reason, "session counter dec");
        if let Some(timeout) = arm_timeout {
            self.arm_timer(key, timeout);
        }
    }

    fn arm_timer(&self, key: &str, timeout: Duration) {
        let inner = Arc::clone(&self.inner);
        let key_owned = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // Only fire if the entry is still present — `clear` or a
            // cancelling `inc` would have aborted this task first, but a
            // defensive remove-then-check costs nothing.
            if inner.entries.remove(&key_owned).is_some() {
                (inner.on_expire)(key_owned);
            }
        });
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.timer = Some(handle);
        }
    }

    /// Cancels any timer and removes `key` entirely. If `fire` is true,
    /// `on_expire(key)` is invoked synchronously from the caller's
    /// context (used for explicit DELETE / transport-close cleanup where
    /// the caller already knows the session is gone).
    pub fn clear(&self, key: &str, fire: bool, reason: &str) {
        if let Some((_, entry)) = self.inner.entries.remove(key) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
        debug!(key, reason, fire, "session counter clear");
        if fire {
            (self.inner.on_expire)(key.to_string());
        }
    }

    /// Current reference count for `key`, or 0 if untracked.
    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        self.inner.entries.get(key).map_or(0, |e| e.count)
    }
}
