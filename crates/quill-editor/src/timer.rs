//! Cancellable timers.
//!
//! A [`TimerHandle`] owns a spawned task and aborts it when dropped, so a
//! timer lives exactly as long as the value holding it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Owned handle to a background timer task. Aborts the task on drop.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `callback` once after `delay`.
    ///
    /// The callback runs inside the timer task; anything that must outlive a
    /// later cancellation (like a save) should be spawned from it.
    pub fn after<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        })
    }

    /// Run `callback` every `period`, starting one period from now.
    pub fn every<F>(period: Duration, mut callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                callback();
            }
        })
    }

    /// Own an arbitrary background task.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    /// Stop the timer. Equivalent to dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }

    /// Returns `true` once the task has completed or been aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Clone + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inc = {
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, inc)
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_fires_once() {
        let (count, inc) = counter();
        let _timer = TimerHandle::after(Duration::from_millis(100), inc);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (count, inc) = counter();
        let timer = TimerHandle::after(Duration::from_millis(100), inc);

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_skips_immediate_tick() {
        let (count, inc) = counter();
        let _timer = TimerHandle::every(Duration::from_secs(5), inc);

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10_002)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
