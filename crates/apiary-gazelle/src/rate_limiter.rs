// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::trace;

use crate::error::{GazelleError, Result};

/// Token bucket shared by every caller of one tracker's API.
///
/// Gazelle trackers usually allow 5 calls every 10 seconds; the default of
/// 2 calls every 4 seconds spreads calls out further. The bucket holds
/// `capacity` permits. A single background task hands each permit back
/// `period` after it was taken, so no rolling window of `period` ever sees more
/// than `capacity` calls and the bucket never grows beyond `capacity`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    issued: mpsc::UnboundedSender<Instant>,
    capacity: usize,
    period: Duration,
}

impl RateLimiter {
    /// Create a limiter issuing at most `capacity` permits per `period`.
    ///
    /// Must be called from within a Tokio runtime, the refill task is spawned here.
    pub fn new(capacity: usize, period: Duration) -> Self {
        let capacity = capacity.max(1);
        let permits = Arc::new(Semaphore::new(capacity));
        let (issued, pending) = mpsc::unbounded_channel();
        tokio::spawn(refill(Arc::downgrade(&permits), pending, period));

        Self {
            permits,
            issued,
            capacity,
            period,
        }
    }

    /// 2 calls every 4 seconds.
    pub fn gazelle_default() -> Self {
        Self::new(2, Duration::from_secs(4))
    }

    /// Wait until a call may be made. This is the only place API callers suspend.
    pub async fn acquire(&self) -> Result<()> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GazelleError::RateLimiterClosed)?;
        permit.forget();

        if self.issued.send(Instant::now()).is_err() {
            // nothing would ever return the permit
            self.permits.close();
            return Err(GazelleError::RateLimiterClosed);
        }
        trace!(
            target: "gazelle",
            available = self.permits.available_permits(),
            "rate limiter permit acquired"
        );
        Ok(())
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

async fn refill(
    permits: Weak<Semaphore>,
    mut pending: mpsc::UnboundedReceiver<Instant>,
    period: Duration,
) {
    while let Some(issued_at) = pending.recv().await {
        sleep_until(issued_at + period).await;
        let Some(permits) = permits.upgrade() else {
            break;
        };
        permits.add_permits(1);
    }
    trace!(target: "gazelle", "rate limiter refill task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn eleven_calls_at_two_per_four_seconds_take_over_twenty_seconds() {
        let limiter = RateLimiter::gazelle_default();
        let start = Instant::now();

        for _ in 0..11 {
            limiter.acquire().await.unwrap();
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(20),
            "expected >= 20s, got {:?}",
            elapsed
        );
        assert!(elapsed < Duration::from_secs(24));
    }

    #[tokio::test(start_paused = true)]
    async fn first_permits_are_immediate() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_capacity_per_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(4));
        let stamps = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..9 {
            let limiter = limiter.clone();
            let stamps = stamps.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await.unwrap();
                stamps.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stamps = stamps.lock().unwrap().clone();
        stamps.sort();
        assert_eq!(stamps.len(), 9);
        for window in stamps.windows(3) {
            assert!(
                window[2] - window[0] >= Duration::from_secs(4),
                "three permits within one period: {:?}",
                window
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refill_never_exceeds_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        limiter.acquire().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(limiter.available(), 2);
    }
}
