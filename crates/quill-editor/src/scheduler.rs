//! Autosave scheduler.
//!
//! Owns the debounce and periodic timers and decides whether a save trigger
//! should become a write. The scheduler never performs I/O itself; the
//! session hands it callbacks that spawn saves.
//!
//! Decisions, in order:
//! 1. Background triggers are dropped while a publish suppresses autosave.
//! 2. Clean documents are not written.
//! 3. Offline saves are deferred: the pending flag is set for the reconnect path.
//! 4. After `max_failures` consecutive failures, debounce and periodic triggers
//!    wait out an exponential backoff. Explicit and reconnect saves do not.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::timer::TimerHandle;

/// Autosave timing and retry bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Whether debounce and periodic timers run at all.
    pub enabled: bool,
    /// Quiet period after the last edit.
    pub debounce: Duration,
    /// Period of the fallback timer.
    pub interval: Duration,
    /// Consecutive failures before backoff starts.
    pub max_failures: u32,
    /// First backoff delay.
    pub backoff_initial: Duration,
    /// Backoff cap.
    pub backoff_max: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(1500),
            interval: Duration::from_secs(5),
            max_failures: 5,
            backoff_initial: Duration::from_secs(10),
            backoff_max: Duration::from_secs(300),
        }
    }
}

/// What caused a save request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveTrigger {
    /// Debounce timer elapsed after the last edit.
    Debounce,
    /// Periodic fallback timer.
    Periodic,
    /// Connectivity returned with a deferred save pending.
    Reconnect,
    /// User asked to save now.
    Explicit,
}

impl SaveTrigger {
    /// Background triggers are dropped when busy and their errors are swallowed.
    #[must_use]
    pub fn is_background(self) -> bool {
        !matches!(self, Self::Explicit)
    }

    fn respects_backoff(self) -> bool {
        matches!(self, Self::Debounce | Self::Periodic)
    }
}

/// Outcome of [`AutosaveScheduler::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveDecision {
    /// Perform the write.
    Start,
    /// Nothing to write.
    SkipClean,
    /// A publish is running.
    SkipSuppressed,
    /// Offline; the pending flag is now set.
    DeferOffline,
    /// Backing off after repeated failures.
    SkipBackoff,
}

#[derive(Debug, Default)]
struct Gate {
    suppressed: bool,
    pending_offline_save: bool,
    consecutive_failures: u32,
    retry_after: Option<Instant>,
}

/// Autosave timers plus the gate that turns triggers into writes.
#[derive(Debug)]
pub struct AutosaveScheduler {
    config: SchedulerConfig,
    gate: Mutex<Gate>,
    debounce: Mutex<Option<TimerHandle>>,
    periodic: Mutex<Option<TimerHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AutosaveScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(Gate::default()),
            debounce: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Decide whether a trigger becomes a write.
    ///
    /// `needs_write` is the caller's dirtiness check (an explicit save of a
    /// never-persisted document also counts).
    pub fn decide(&self, trigger: SaveTrigger, needs_write: bool, online: bool) -> SaveDecision {
        let mut gate = lock(&self.gate);

        if trigger.is_background() && gate.suppressed {
            return SaveDecision::SkipSuppressed;
        }
        if !needs_write {
            return SaveDecision::SkipClean;
        }
        if !online {
            gate.pending_offline_save = true;
            return SaveDecision::DeferOffline;
        }
        if trigger.respects_backoff()
            && let Some(retry_after) = gate.retry_after
            && Instant::now() < retry_after
        {
            return SaveDecision::SkipBackoff;
        }
        SaveDecision::Start
    }

    /// Clear the offline flag, returning whether it was set.
    pub fn take_pending_offline(&self) -> bool {
        std::mem::take(&mut lock(&self.gate).pending_offline_save)
    }

    #[must_use]
    pub fn has_pending_offline(&self) -> bool {
        lock(&self.gate).pending_offline_save
    }

    /// Reset the failure streak.
    pub fn record_success(&self) {
        let mut gate = lock(&self.gate);
        gate.consecutive_failures = 0;
        gate.retry_after = None;
    }

    /// Extend the failure streak and, past the threshold, schedule a backoff.
    ///
    /// Returns the backoff delay, if one now applies.
    pub fn record_failure(&self) -> Option<Duration> {
        let mut gate = lock(&self.gate);
        gate.consecutive_failures = gate.consecutive_failures.saturating_add(1);

        let delay = self.backoff_for(gate.consecutive_failures)?;
        gate.retry_after = Some(Instant::now() + delay);
        Some(delay)
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        lock(&self.gate).consecutive_failures
    }

    /// Backoff after `failures` consecutive failures: none below the
    /// threshold, then `backoff_initial` doubling per further failure up to
    /// `backoff_max`.
    #[must_use]
    pub fn backoff_for(&self, failures: u32) -> Option<Duration> {
        let over = failures.checked_sub(self.config.max_failures)?;
        let factor = 2u32.saturating_pow(over.min(31));
        Some(
            self.config
                .backoff_initial
                .saturating_mul(factor)
                .min(self.config.backoff_max),
        )
    }

    /// Restart the debounce timer. Replacing the old handle cancels it.
    pub fn arm_debounce<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.config.enabled || lock(&self.gate).suppressed {
            return;
        }
        let timer = TimerHandle::after(self.config.debounce, callback);
        *lock(&self.debounce) = Some(timer);
    }

    /// Start the periodic timer unless it is already running.
    pub fn start_periodic<F>(&self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        if !self.config.enabled || lock(&self.gate).suppressed {
            return;
        }
        let mut periodic = lock(&self.periodic);
        if periodic.is_none() {
            *periodic = Some(TimerHandle::every(self.config.interval, callback));
        }
    }

    #[must_use]
    pub fn is_periodic_running(&self) -> bool {
        lock(&self.periodic).is_some()
    }

    #[must_use]
    pub fn is_debounce_armed(&self) -> bool {
        lock(&self.debounce)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Cancel both timers and drop background triggers until [`Self::resume`].
    pub fn suppress(&self) {
        lock(&self.gate).suppressed = true;
        self.cancel_all();
    }

    /// Accept background triggers again. Timers must be re-armed by the caller.
    pub fn resume(&self) {
        lock(&self.gate).suppressed = false;
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        lock(&self.gate).suppressed
    }

    /// Cancel both timers.
    pub fn cancel_all(&self) {
        // Take under the lock, drop outside it.
        let debounce = lock(&self.debounce).take();
        let periodic = lock(&self.periodic).take();
        drop(debounce);
        drop(periodic);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn scheduler() -> AutosaveScheduler {
        AutosaveScheduler::new(SchedulerConfig {
            max_failures: 2,
            backoff_initial: Duration::from_secs(10),
            backoff_max: Duration::from_secs(35),
            ..SchedulerConfig::default()
        })
    }

    #[test]
    fn test_clean_is_skipped() {
        let s = scheduler();

        assert_eq!(
            s.decide(SaveTrigger::Periodic, false, true),
            SaveDecision::SkipClean
        );
    }

    #[test]
    fn test_offline_sets_pending_flag() {
        let s = scheduler();

        assert_eq!(
            s.decide(SaveTrigger::Debounce, true, false),
            SaveDecision::DeferOffline
        );
        assert!(s.take_pending_offline());
        assert!(!s.take_pending_offline());
    }

    #[test]
    fn test_offline_clean_does_not_set_flag() {
        let s = scheduler();

        s.decide(SaveTrigger::Periodic, false, false);

        assert!(!s.has_pending_offline());
    }

    #[test]
    fn test_suppressed_drops_background_only() {
        let s = scheduler();
        s.suppress();

        assert_eq!(
            s.decide(SaveTrigger::Periodic, true, true),
            SaveDecision::SkipSuppressed
        );
        assert_eq!(
            s.decide(SaveTrigger::Reconnect, true, true),
            SaveDecision::SkipSuppressed
        );
        assert_eq!(
            s.decide(SaveTrigger::Explicit, true, true),
            SaveDecision::Start
        );

        s.resume();
        assert_eq!(
            s.decide(SaveTrigger::Periodic, true, true),
            SaveDecision::Start
        );
    }

    #[test]
    fn test_backoff_schedule() {
        let s = scheduler();

        assert_eq!(s.backoff_for(1), None);
        assert_eq!(s.backoff_for(2), Some(Duration::from_secs(10)));
        assert_eq!(s.backoff_for(3), Some(Duration::from_secs(20)));
        assert_eq!(s.backoff_for(4), Some(Duration::from_secs(35)));
        assert_eq!(s.backoff_for(u32::MAX), Some(Duration::from_secs(35)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_gates_timer_triggers_until_elapsed() {
        let s = scheduler();
        assert_eq!(s.record_failure(), None);
        assert_eq!(s.record_failure(), Some(Duration::from_secs(10)));

        assert_eq!(
            s.decide(SaveTrigger::Periodic, true, true),
            SaveDecision::SkipBackoff
        );
        assert_eq!(
            s.decide(SaveTrigger::Explicit, true, true),
            SaveDecision::Start
        );
        assert_eq!(
            s.decide(SaveTrigger::Reconnect, true, true),
            SaveDecision::Start
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            s.decide(SaveTrigger::Debounce, true, true),
            SaveDecision::Start
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_streak() {
        let s = scheduler();
        s.record_failure();
        s.record_failure();

        s.record_success();

        assert_eq!(s.consecutive_failures(), 0);
        assert_eq!(
            s.decide(SaveTrigger::Periodic, true, true),
            SaveDecision::Start
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_debounce_restarts_quiet_period() {
        let s = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let arm = |s: &AutosaveScheduler| {
            let fired = Arc::clone(&fired);
            s.arm_debounce(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        };

        arm(&s);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        arm(&s);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppress_cancels_timers() {
        let s = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            s.start_periodic(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(s.is_periodic_running());

        s.suppress();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert!(!s.is_periodic_running());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_arms_nothing() {
        let s = AutosaveScheduler::new(SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        });

        s.arm_debounce(|| {});
        s.start_periodic(|| {});

        assert!(!s.is_debounce_armed());
        assert!(!s.is_periodic_running());
    }
}
