//! services/web/src/adapters/rate_limit.rs
//!
//! An in-process fixed-window implementation of the `RateLimiter` port. Counters
//! live in memory, so limits apply per server instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matchmaking_core::domain::{RateLimitDecision, RateLimitPolicy};
use matchmaking_core::ports::{PortResult, RateLimiter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Window {
    /// Unix timestamp (seconds) at which this window ends.
    reset_at: i64,
    count: u32,
}

#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request for `key` at `now`.
    pub async fn check_at(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let now_secs = now.timestamp();
        let window_secs = i64::try_from(policy.window_secs).unwrap_or(i64::MAX).max(1);

        let mut windows = self.windows.lock().await;
        let window = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.reset_at <= now_secs {
                    *w = Window {
                        reset_at: now_secs.saturating_add(window_secs),
                        count: 0,
                    };
                }
            })
            .or_insert(Window {
                reset_at: now_secs.saturating_add(window_secs),
                count: 0,
            });

        let allowed = window.count < policy.limit;
        if allowed {
            window.count += 1;
        }
        RateLimitDecision {
            allowed,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(window.count),
            reset_at: window.reset_at,
        }
    }

    /// Drops windows that ended before `now`. Returns how many were removed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let now_secs = now.timestamp();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now_secs);
        before - windows.len()
    }

    /// Periodically drops expired windows until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep_at(Utc::now()).await;
                        if removed > 0 {
                            debug!("Swept {} expired rate-limit windows", removed);
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str, policy: &RateLimitPolicy) -> PortResult<RateLimitDecision> {
        Ok(self.check_at(key, policy, Utc::now()).await)
    }
}
