//! Request pacing shared by every worker
//!
//! Each request reserves the next free slot on one monotonic timeline, so the
//! configured delay bounds the request rate no matter how many workers run.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct PacerState {
    interval: Duration,
    next_slot: Option<Instant>,
}

#[derive(Debug)]
pub struct RequestPacer {
    state: Mutex<PacerState>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(PacerState {
                interval,
                next_slot: None,
            }),
        }
    }

    pub async fn interval(&self) -> Duration {
        self.state.lock().await.interval
    }

    /// Raises the interval to at least `interval`; never lowers it
    pub async fn raise_interval(&self, interval: Duration) {
        let mut state = self.state.lock().await;
        if interval > state.interval {
            state.interval = interval;
        }
    }

    /// Waits for this caller's slot
    pub async fn wait(&self) {
        let slot = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = match state.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            state.next_slot = Some(slot + state.interval);
            slot
        };

        if slot > Instant::now() {
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_requests_spaced_by_interval() {
        let pacer = RequestPacer::new(Duration::from_millis(100));
        let start = Instant::now();

        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_is_shared_across_tasks() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(50)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                tokio::spawn(async move { pacer.wait().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Four slots: 0, 50, 100, 150
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_wait() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let start = std::time::Instant::now();
        for _ in 0..10 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_raise_interval_never_lowers() {
        let pacer = RequestPacer::new(Duration::from_millis(200));
        pacer.raise_interval(Duration::from_millis(100)).await;
        assert_eq!(pacer.interval().await, Duration::from_millis(200));
        pacer.raise_interval(Duration::from_secs(1)).await;
        assert_eq!(pacer.interval().await, Duration::from_secs(1));
    }
}
