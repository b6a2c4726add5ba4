// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Rate limiting for outbound API calls
//!
//! A single `RateLimiter` is shared (behind an `Arc`) by the search and
//! extraction clients. Each key ("search", "llm") has its own sliding window:
//! a call admitted at `t` holds a slot for `[t, t + window)`, and no more than
//! `max_calls` slots are held at once.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Limiter key used by the search client
pub const SEARCH_KEY: &str = "search";
/// Limiter key used by the extraction client
pub const LLM_KEY: &str = "llm";

/// Maximum calls per sliding window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_calls: u32,
    pub window_seconds: f64,
}

impl RateLimit {
    pub fn new(max_calls: u32, window_seconds: f64) -> Self {
        Self {
            max_calls,
            window_seconds,
        }
    }

    /// Window length; negative or non-finite values collapse to zero (unlimited)
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_seconds).unwrap_or(Duration::ZERO)
    }
}

struct SlidingWindow {
    max_calls: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new(limit: RateLimit) -> Self {
        Self {
            max_calls: limit.max_calls.max(1) as usize,
            window: limit.window(),
            admitted: VecDeque::new(),
        }
    }

    /// Admit a call at `now`, or return how long until the oldest slot frees up
    fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.expire(now);

        if self.admitted.len() < self.max_calls {
            self.admitted.push_back(now);
            return Ok(());
        }

        match self.admitted.front() {
            Some(&oldest) => Err((oldest + self.window).saturating_duration_since(now)),
            None => Ok(()),
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&front) = self.admitted.front() {
            if front + self.window <= now {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Keyed sliding-window rate limiter
pub struct RateLimiter {
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter with no configured keys (every key is unthrottled)
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Create the limiter shared by the search and extraction clients
    pub fn for_clients(search: RateLimit, llm: RateLimit) -> Self {
        Self::new()
            .with_limit(SEARCH_KEY, search)
            .with_limit(LLM_KEY, llm)
    }

    /// Configure (or replace) the limit for a key
    pub fn with_limit(mut self, key: &str, limit: RateLimit) -> Self {
        self.windows
            .get_mut()
            .insert(key.to_string(), SlidingWindow::new(limit));
        self
    }

    /// Wait until a call under `key` is permitted
    ///
    /// Never fails: callers are delayed, not rejected. Keys without a
    /// configured limit return immediately.
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let Some(window) = windows.get_mut(key) else {
                    return;
                };
                match window.try_admit(Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };

            debug!(key, wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls currently holding a slot under `key`
    pub async fn in_window(&self, key: &str) -> usize {
        let mut windows = self.windows.lock().await;
        match windows.get_mut(key) {
            Some(window) => {
                window.expire(Instant::now());
                window.admitted.len()
            }
            None => 0,
        }
    }
}
