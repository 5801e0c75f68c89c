//! Polling scheduler and refresh countdown.
//!
//! One wall-clock deadline is the single reference clock: the poller stores
//! `next_refresh_at` and every displayed countdown field is derived from
//! `deadline - now` on demand. The dashboards this replaces ran a mutable
//! tick counter next to a wall-clock target and let the two drift apart.
//!
//! The returned [`PollerHandle`] owns the polling task and aborts it on
//! [`PollerHandle::stop`] and on drop, so a forgotten handle cannot leak an
//! interval. A hook that reports [`ApiError::AuthExpired`] stops the poller
//! from the inside — continuing to poll a dead session only produces a
//! redirect loop.
//!
//! Overlap between a tick-triggered load and a manual refresh is legal; the
//! collection's sequence guard decides which response lands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::telemetry::sanitize_for_log;

/// Time remaining until the next refresh, split for display. All fields are
/// derived from the same deadline delta; none can drift against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let total = (deadline - now).num_seconds().max(0);
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }

    pub fn is_elapsed(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.days > 0 {
            write!(
                f,
                "{}d {:02}:{:02}:{:02}",
                self.days, self.hours, self.minutes, self.seconds
            )
        } else {
            write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
        }
    }
}

pub struct Poller;

impl Poller {
    /// Spawn a polling task invoking `hook` every `interval`.
    ///
    /// The first invocation happens one full interval after start, matching
    /// the "auto-update" toggle this models (the caller has already loaded
    /// once by the time it enables polling).
    pub fn start<F, Fut>(interval: Duration, hook: F) -> PollerHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let chrono_interval = chrono::Duration::from_std(interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        let deadline = Arc::new(RwLock::new(Utc::now() + chrono_interval));
        let deadline_in_task = deadline.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval() fires immediately; consume that tick so the first
            // hook run lands a full interval from now.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let result = hook().await;
                *deadline_in_task.write() = Utc::now() + chrono_interval;

                match result {
                    Ok(()) => debug!("poll tick completed"),
                    Err(ApiError::AuthExpired) => {
                        info!("session expired, stopping poller");
                        break;
                    }
                    // Other failures are reported where the load settles
                    // (the collection's notifier); the next tick retries
                    // on schedule.
                    Err(e) => {
                        debug!(error = %sanitize_for_log(&e.to_string()), "poll tick failed");
                    }
                }
            }
        });

        PollerHandle { task, deadline }
    }
}

/// Owns the polling task; aborts it on `stop()` and on drop.
pub struct PollerHandle {
    task: JoinHandle<()>,
    deadline: Arc<RwLock<DateTime<Utc>>>,
}

impl PollerHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the task has ended (stopped itself after an expired session).
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    pub fn next_refresh_at(&self) -> DateTime<Utc> {
        *self.deadline.read()
    }

    pub fn countdown(&self) -> Countdown {
        Countdown::until(self.next_refresh_at(), Utc::now())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
