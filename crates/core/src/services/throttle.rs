//! Submission throttling keyed by submitter identity.
//!
//! The counter is optimistic: checked before validation work, incremented
//! only after a fully successful submission, so validation failures never
//! consume the submitter's budget. Approximate consistency is acceptable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Per-key counter window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

/// Per-submitter submission counter with a fixed time window.
#[derive(Clone)]
pub struct SubmissionThrottle {
    window: Duration,
    states: Arc<RwLock<HashMap<String, WindowState>>>,
}

impl SubmissionThrottle {
    /// Create a throttle with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current count for a key; 0 once the window has expired.
    pub async fn count(&self, key: &str) -> u32 {
        let states = self.states.read().await;
        states
            .get(key)
            .filter(|s| s.window_start.elapsed() < self.window)
            .map_or(0, |s| s.count)
    }

    /// Record one successful submission for a key.
    pub async fn increment(&self, key: &str) {
        let mut states = self.states.write().await;
        let now = Instant::now();

        let state = states.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(state.window_start) >= self.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count += 1;
    }

    /// Forget a key.
    pub async fn reset(&self, key: &str) {
        self.states.write().await.remove(key);
    }

    /// Drop expired windows.
    pub async fn cleanup(&self) {
        let window = self.window;
        self.states
            .write()
            .await
            .retain(|_, state| state.window_start.elapsed() < window);
    }
}
