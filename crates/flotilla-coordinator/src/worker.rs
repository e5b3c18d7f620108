//! Cancellable fixed-interval worker.
//!
//! Every periodic coordinator task runs on this primitive: tick at a fixed
//! period, observe the shutdown token at tick boundaries, log start/stop.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn a worker running `task` every `period` until `shutdown` fires.
/// Fire-and-forget; the first run happens one full period after start.
pub fn spawn<F, Fut>(name: &'static str, period: Duration, shutdown: CancellationToken, task: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        info!(worker = name, period_secs = period.as_secs_f64(), "worker started");
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!(worker = name, "worker stopped");
                    return;
                }

                _ = ticker.tick() => {
                    debug!(worker = name, "worker running");
                    task().await;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let counter = count.clone();
        spawn(
            "test-worker",
            Duration::from_millis(10),
            shutdown.clone(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected at least 2 ticks, got {ticks}");

        // no further ticks after cancellation
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn first_tick_waits_one_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let counter = count.clone();
        spawn(
            "test-worker",
            Duration::from_millis(100),
            shutdown.clone(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        shutdown.cancel();
    }
}
