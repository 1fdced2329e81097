use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::minutes(5),
            max_attempts: 5,
        }
    }
}

#[derive(Debug)]
struct AttemptWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl AttemptWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_attempts(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }
}

/// Sliding-window limiter keyed by an arbitrary string (login name).
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, AttemptWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Records an attempt for `key`; returns false once the window is full.
    pub async fn check_rate_limit(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        let mut windows = self.windows.write().await;
        let window = windows.entry(key).or_insert_with(AttemptWindow::new);

        window.cleanup_old_attempts(self.config.window_size);

        if window.timestamps.len() < self.config.max_attempts as usize {
            window.timestamps.push(Utc::now());
            true
        } else {
            false
        }
    }

    /// Forget attempts for `key`, e.g. after a successful login.
    pub async fn reset(&self, key: &str) {
        self.windows.write().await.remove(&key.to_lowercase());
    }

    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        windows.retain(|_, window| {
            window.cleanup_old_attempts(self.config.window_size);
            !window.timestamps.is_empty()
        });
    }
}
