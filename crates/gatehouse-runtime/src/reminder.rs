//! Durable reminders: schedule entries that outlive actor tasks.
//!
//! A reminder is `(kind, key, name) → (due, period)`. The table lives in
//! the service, not in any actor, so an entry keeps firing even after
//! the actor that registered it was deactivated — the routing layer is
//! expected to reactivate the target and deliver the callback.
//!
//! # Delivery semantics
//!
//! At-least-once, possibly late. The dispatcher re-arms every fired
//! entry one period ahead and keeps firing until the entry is cancelled,
//! so a handler that crashes before cancelling will see the reminder
//! again. Handlers must therefore be idempotent: check record existence
//! first, and verify the reminder name against the expected one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace};

/// Default capacity of the delivery channel.
const DELIVERY_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Delivery types
// ---------------------------------------------------------------------------

/// Timing information handed to the reminder callback.
#[derive(Debug, Clone)]
pub struct ReminderTick {
    /// The period the entry was registered with.
    pub period: Duration,
    /// How far past the due instant the dispatcher fired. Zero in the
    /// common case; large values mean the runtime was stalled — the
    /// callback contract tolerates this.
    pub late_by: Duration,
}

/// A due reminder, emitted by the dispatcher for routing to its actor.
#[derive(Debug)]
pub struct ReminderDelivery {
    /// Entity kind of the target actor.
    pub kind: String,
    /// Key of the target actor.
    pub key: String,
    /// The name the reminder was registered under.
    pub name: String,
    /// Timing information for this firing.
    pub tick: ReminderTick,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReminderId {
    kind: String,
    key: String,
    name: String,
}

#[derive(Debug, Clone, Copy)]
struct ReminderEntry {
    due: TokioInstant,
    period: Duration,
}

struct Shared {
    entries: Mutex<HashMap<ReminderId, ReminderEntry>>,
    /// Wakes the dispatcher whenever the table changes, so a newly
    /// registered earlier deadline isn't slept past.
    changed: Notify,
}

/// Handle to the reminder schedule. Cheap to clone; all clones share
/// one table and one dispatcher.
#[derive(Clone)]
pub struct ReminderService {
    shared: Arc<Shared>,
}

impl ReminderService {
    /// Starts the service and its dispatcher task.
    ///
    /// Returns the handle and the delivery stream. The caller owns
    /// routing: read deliveries from the receiver and hand each to the
    /// actor it addresses (reactivating it if needed). The dispatcher
    /// stops when the receiver is dropped.
    pub fn start() -> (Self, mpsc::Receiver<ReminderDelivery>) {
        let (tx, rx) = mpsc::channel(DELIVERY_CHANNEL_SIZE);
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            changed: Notify::new(),
        });

        tokio::spawn(dispatch(Arc::clone(&shared), tx));

        (Self { shared }, rx)
    }

    /// Registers a reminder, or reschedules it if `(kind, key, name)`
    /// already exists.
    ///
    /// The first firing is `due` from now; subsequent firings follow
    /// every `period` until [`cancel`](Self::cancel). Re-registering
    /// replaces the previous schedule — entries never stack.
    pub async fn register_or_update(
        &self,
        kind: &str,
        key: &str,
        name: &str,
        due: Duration,
        period: Duration,
    ) {
        let id = ReminderId {
            kind: kind.to_string(),
            key: key.to_string(),
            name: name.to_string(),
        };
        let entry = ReminderEntry {
            due: TokioInstant::now() + due,
            period,
        };

        let mut entries = self.shared.entries.lock().await;
        let replaced = entries.insert(id, entry).is_some();
        drop(entries);

        debug!(
            kind, key, name,
            due_secs = due.as_secs(),
            period_secs = period.as_secs(),
            replaced,
            "reminder registered"
        );
        self.shared.changed.notify_one();
    }

    /// Cancels a reminder. Returns `true` if an entry was removed.
    ///
    /// Cancelling an unknown reminder is a no-op — the clear paths call
    /// this unconditionally.
    pub async fn cancel(&self, kind: &str, key: &str, name: &str) -> bool {
        let id = ReminderId {
            kind: kind.to_string(),
            key: key.to_string(),
            name: name.to_string(),
        };

        let mut entries = self.shared.entries.lock().await;
        let removed = entries.remove(&id).is_some();
        drop(entries);

        if removed {
            debug!(kind, key, name, "reminder cancelled");
            self.shared.changed.notify_one();
        }
        removed
    }

    /// Returns `true` if `(kind, key, name)` is currently scheduled.
    pub async fn is_registered(&self, kind: &str, key: &str, name: &str) -> bool {
        let id = ReminderId {
            kind: kind.to_string(),
            key: key.to_string(),
            name: name.to_string(),
        };
        self.shared.entries.lock().await.contains_key(&id)
    }

    /// Number of scheduled entries.
    pub async fn len(&self) -> usize {
        self.shared.entries.lock().await.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub async fn is_empty(&self) -> bool {
        self.shared.entries.lock().await.is_empty()
    }
}

/// The dispatcher loop: sleep until the earliest due entry, fire
/// everything due, re-arm, repeat.
async fn dispatch(shared: Arc<Shared>, tx: mpsc::Sender<ReminderDelivery>) {
    debug!("reminder dispatcher started");

    loop {
        // Earliest deadline across the table, if any.
        let next = {
            let entries = shared.entries.lock().await;
            entries.values().map(|e| e.due).min()
        };

        // Sleep until that deadline — or pend forever on an empty table.
        // A table change interrupts either wait and re-evaluates.
        tokio::select! {
            _ = shared.changed.notified() => continue,
            _ = async {
                match next {
                    Some(due) => time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }

        // Collect and re-arm everything that is due. Re-arming happens
        // before delivery so a slow consumer cannot lose the schedule.
        let now = TokioInstant::now();
        let due: Vec<(ReminderId, ReminderTick)> = {
            let mut entries = shared.entries.lock().await;
            let mut fired = Vec::new();
            for (id, entry) in entries.iter_mut() {
                if entry.due <= now {
                    let late_by = now.saturating_duration_since(entry.due);
                    // Next firing is one period from now, not from the
                    // missed deadline — no catch-up bursts.
                    entry.due = now + entry.period;
                    fired.push((
                        id.clone(),
                        ReminderTick {
                            period: entry.period,
                            late_by,
                        },
                    ));
                }
            }
            fired
        };

        for (id, tick) in due {
            trace!(
                kind = %id.kind,
                key = %id.key,
                name = %id.name,
                late_ms = tick.late_by.as_millis() as u64,
                "reminder due"
            );
            let delivery = ReminderDelivery {
                kind: id.kind,
                key: id.key,
                name: id.name,
                tick,
            };
            if tx.send(delivery).await.is_err() {
                debug!("delivery channel closed, reminder dispatcher stopping");
                return;
            }
        }
    }
}
