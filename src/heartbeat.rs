//! Activity heartbeat.
//!
//! Turns a stream of user-activity calls into a rate-limited signal. The
//! heartbeat never schedules itself: with no activity nothing fires, with
//! continuous activity the action fires at most once per interval.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Rate-limited action, fired only from [`Heartbeat::beat`].
pub struct Heartbeat {
    interval: Duration,
    /// `None` until the first fire, so the first beat always fires.
    last_fired: Mutex<Option<Instant>>,
    action: Box<dyn Fn() + Send + Sync>,
}

impl Heartbeat {
    pub fn new<F>(interval: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            interval,
            last_fired: Mutex::new(None),
            action: Box::new(action),
        }
    }

    /// Record activity now. Returns whether the action fired.
    pub fn beat(&self) -> bool {
        self.beat_at(Instant::now())
    }

    /// Record activity at `now`.
    ///
    /// Fires iff no fire has happened yet or `now - last_fire >= interval`.
    pub fn beat_at(&self, now: Instant) -> bool {
        let should_fire = {
            let mut last = self
                .last_fired
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let due = match *last {
                None => true,
                Some(prev) => now.saturating_duration_since(prev) >= self.interval,
            };
            if due {
                *last = Some(now);
            }
            due
        };

        // Invoke outside the lock so a re-entrant beat cannot deadlock.
        if should_fire {
            (self.action)();
        }
        should_fire
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
