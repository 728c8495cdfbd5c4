use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Fixed-window request limiter shared by every call a client makes.
///
/// A capacity of zero disables limiting.
#[derive(Debug)]
pub struct RateLimit {
    // The number of requests that can be made in the time period.
    capacity: u64,
    period: Duration,

    window: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    start: Instant,
    used: u64,
}

impl RateLimit {
    pub fn new(num: u64, per: Duration) -> Self {
        Self {
            capacity: num,
            period: per,
            window: Mutex::new(Window {
                start: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Takes a token if one is left, otherwise returns how long until the
    /// current window closes.
    pub fn try_ready(&self) -> Result<(), Duration> {
        if self.capacity == 0 {
            return Ok(());
        }

        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(window.start);

        if elapsed >= self.period {
            window.start = now;
            window.used = 0;
        }

        if window.used < self.capacity {
            window.used += 1;
            Ok(())
        } else {
            Err(self.period.saturating_sub(elapsed))
        }
    }

    pub async fn ready(&self) {
        while let Err(wait) = self.try_ready() {
            sleep(wait).await;
        }
    }
}
