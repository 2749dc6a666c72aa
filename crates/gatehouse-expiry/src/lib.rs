//! Expiration scheduling for Gatehouse entity actors.
//!
//! Every session and token must eventually expire, and its state must be
//! cleared exactly once, even if the owning actor is evicted and later
//! reconstructed. This crate owns the choice between the two mechanisms
//! that make that happen:
//!
//! - a cheap **in-memory poll timer** for sub-minute lifetimes, lost
//!   when the actor unloads;
//! - a **durable reminder** for minute-plus lifetimes, surviving the
//!   actor and redelivered by the runtime.
//!
//! Exactly one mechanism is armed per actor instance at any time —
//! re-arming replaces, never stacks.
//!
//! # Integration
//!
//! [`ExpirySchedule`] is designed to sit inside an entity actor's
//! `tokio::select!` loop, next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = rx.recv() => { /* handle commands */ }
//!         tick = expiry.wait_for_tick() => {
//!             // poll-timer fired: check the record, clear, deactivate
//!         }
//!     }
//! }
//! ```
//!
//! Reminder firings arrive from the outside (via the runtime's delivery
//! stream) as ordinary commands; the schedule only contributes the
//! name-match guard for them.

use std::time::Duration;

use gatehouse_runtime::ReminderService;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Lifetimes below this use the poll timer; at or above it, a durable
/// reminder. Durable reminders don't support sub-minute precision
/// economically, so short lifetimes round up to the poll granularity.
pub const REMINDER_FLOOR: Duration = Duration::from_secs(60);

/// Initial delay and period of the poll timer.
///
/// A sub-minute lifetime thus expires on the first tick, roughly one
/// minute after creation — a deliberate approximation.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// The mechanism chosen for a given lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryMechanism {
    /// In-memory recurring timer. Dies with the actor task.
    PollTimer {
        /// Delay before the first tick.
        initial: Duration,
        /// Period between subsequent ticks.
        period: Duration,
    },
    /// Durable reminder registered with the runtime. Survives
    /// deactivation; delivered at-least-once, possibly late.
    DurableReminder {
        /// Delay before the first firing.
        due: Duration,
        /// Period between subsequent firings.
        period: Duration,
    },
}

/// Decides which mechanism a lifetime gets. Pure — no side effects.
///
/// - `lifetime < 1 minute` → [`ExpiryMechanism::PollTimer`] with both
///   initial delay and period fixed at one minute.
/// - otherwise → [`ExpiryMechanism::DurableReminder`] with due time and
///   period both equal to the lifetime.
pub fn plan(lifetime: Duration) -> ExpiryMechanism {
    if lifetime < REMINDER_FLOOR {
        ExpiryMechanism::PollTimer {
            initial: POLL_INTERVAL,
            period: POLL_INTERVAL,
        }
    } else {
        ExpiryMechanism::DurableReminder {
            due: lifetime,
            period: lifetime,
        }
    }
}

// ---------------------------------------------------------------------------
// Timer tick info
// ---------------------------------------------------------------------------

/// Information about a poll-timer firing, returned by
/// [`ExpirySchedule::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TimerTick {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The timer's period.
    pub period: Duration,
    /// How late the tick fired relative to its deadline.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PollState {
    next: TokioInstant,
    period: Duration,
}

/// The expiration mechanism armed for one actor instance.
///
/// One `ExpirySchedule` per actor. Owns the local poll timer and the
/// registration of the actor's durable reminder; guarantees the two are
/// mutually exclusive.
pub struct ExpirySchedule {
    reminders: ReminderService,
    kind: &'static str,
    key: String,
    reminder_name: &'static str,
    poll: Option<PollState>,
    reminder_armed: bool,
    tick_count: u64,
}

impl ExpirySchedule {
    /// Creates an unarmed schedule for the actor `kind`/`key`.
    ///
    /// `reminder_name` distinguishes this schedule's purpose from other
    /// reminders that might target the same logical actor; deliveries
    /// carrying any other name are foreign (see
    /// [`expects_reminder`](Self::expects_reminder)).
    pub fn new(
        reminders: ReminderService,
        kind: &'static str,
        key: impl Into<String>,
        reminder_name: &'static str,
    ) -> Self {
        Self {
            reminders,
            kind,
            key: key.into(),
            reminder_name,
            poll: None,
            reminder_armed: false,
            tick_count: 0,
        }
    }

    /// Arms the expiration mechanism for `lifetime`, replacing whatever
    /// was armed before.
    ///
    /// Replacement is total: switching to the poll timer cancels a
    /// pending reminder and vice versa, so exactly one path is ever
    /// live. Returns the installed mechanism.
    pub async fn arm(&mut self, lifetime: Duration) -> ExpiryMechanism {
        let mechanism = plan(lifetime);

        match mechanism {
            ExpiryMechanism::PollTimer { initial, period } => {
                if self.reminder_armed {
                    self.reminders
                        .cancel(self.kind, &self.key, self.reminder_name)
                        .await;
                    self.reminder_armed = false;
                }
                self.poll = Some(PollState {
                    next: TokioInstant::now() + initial,
                    period,
                });
                debug!(
                    kind = self.kind,
                    key = %self.key,
                    lifetime_secs = lifetime.as_secs(),
                    "poll timer armed"
                );
            }
            ExpiryMechanism::DurableReminder { due, period } => {
                self.poll = None;
                self.reminders
                    .register_or_update(
                        self.kind,
                        &self.key,
                        self.reminder_name,
                        due,
                        period,
                    )
                    .await;
                self.reminder_armed = true;
                debug!(
                    kind = self.kind,
                    key = %self.key,
                    due_secs = due.as_secs(),
                    "durable reminder armed"
                );
            }
        }

        mechanism
    }

    /// Cancels both expiration paths.
    ///
    /// Called once the record is cleared — nothing further should fire.
    /// Idempotent.
    pub async fn disarm(&mut self) {
        self.poll = None;
        if self.reminder_armed {
            self.reminders
                .cancel(self.kind, &self.key, self.reminder_name)
                .await;
            self.reminder_armed = false;
        }
    }

    /// Stops the local poll timer without touching the reminder.
    ///
    /// Used when a tick finds the record already gone: the timer must
    /// not keep firing, and there is no reminder to cancel on this path.
    pub fn stop_timer(&mut self) {
        self.poll = None;
    }

    /// Marks the durable reminder as armed without re-registering it.
    ///
    /// A reactivated actor starts with a fresh schedule but its
    /// reminder is still registered with the runtime — this reconnects
    /// the local view after the actor has confirmed the registration
    /// exists.
    pub fn restore_reminder(&mut self) {
        self.poll = None;
        self.reminder_armed = true;
    }

    /// Waits until the poll timer is due. Pends forever when no timer
    /// is armed, so it is always safe inside `tokio::select!` — the
    /// other branches still run.
    pub async fn wait_for_tick(&mut self) -> TimerTick {
        let Some(poll) = self.poll else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(poll.next).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(poll.next);
        self.tick_count += 1;

        // Schedule the next tick from now; a stalled actor doesn't get
        // a burst of catch-up ticks.
        self.poll = Some(PollState {
            next: now + poll.period,
            period: poll.period,
        });

        trace!(
            kind = self.kind,
            key = %self.key,
            tick = self.tick_count,
            "poll timer fired"
        );

        TimerTick {
            tick: self.tick_count,
            period: poll.period,
            late_by,
        }
    }

    /// Returns `true` if `name` is this schedule's reminder.
    ///
    /// The guard against stale or foreign reminders: a delivery whose
    /// name doesn't match must be ignored, never acted on.
    pub fn expects_reminder(&self, name: &str) -> bool {
        name == self.reminder_name
    }

    /// Whether the poll timer is currently armed.
    pub fn timer_armed(&self) -> bool {
        self.poll.is_some()
    }

    /// Whether the durable reminder is currently armed.
    pub fn reminder_armed(&self) -> bool {
        self.reminder_armed
    }

    /// The reminder name this schedule registers under.
    pub fn reminder_name(&self) -> &'static str {
        self.reminder_name
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Pure planning decisions — the async paths live in tests/.

    #[test]
    fn test_plan_sub_minute_lifetime_uses_poll_timer() {
        let mechanism = plan(Duration::from_secs(30));
        assert_eq!(
            mechanism,
            ExpiryMechanism::PollTimer {
                initial: POLL_INTERVAL,
                period: POLL_INTERVAL,
            }
        );
    }

    #[test]
    fn test_plan_just_below_floor_uses_poll_timer() {
        let mechanism = plan(Duration::from_secs(59));
        assert!(matches!(mechanism, ExpiryMechanism::PollTimer { .. }));
    }

    #[test]
    fn test_plan_at_floor_uses_reminder() {
        let mechanism = plan(Duration::from_secs(60));
        assert_eq!(
            mechanism,
            ExpiryMechanism::DurableReminder {
                due: Duration::from_secs(60),
                period: Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn test_plan_long_lifetime_due_equals_period_equals_lifetime() {
        let lifetime = Duration::from_secs(86_400);
        let mechanism = plan(lifetime);
        assert_eq!(
            mechanism,
            ExpiryMechanism::DurableReminder {
                due: lifetime,
                period: lifetime,
            }
        );
    }
}
