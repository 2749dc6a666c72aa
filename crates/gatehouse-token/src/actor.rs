//! Token actor: an isolated Tokio task that owns one token's record.
//!
//! Every operation against a token — create, verify, get, scheduled
//! callbacks — flows through the actor's command channel and is handled
//! strictly one at a time. That serialization is what makes "clear
//! exactly once" hold without any locking.

use std::sync::Arc;

use gatehouse_expiry::ExpirySchedule;
use gatehouse_model::{CreateTokenModel, TokenKind, TokenRecord};
use gatehouse_runtime::{PersistedState, ReminderService, ReminderTick, StateStore};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use crate::{ExpiryObserver, TokenError};

/// Commands sent to a token actor through its channel.
///
/// The `oneshot::Sender` in the query variants is the reply channel —
/// the handle sends a command and awaits the response on it. Reminder
/// deliveries carry no reply; they are routed in from the dispatcher.
pub(crate) enum TokenCommand {
    Create {
        model: CreateTokenModel,
        reply: oneshot::Sender<Result<(), TokenError>>,
    },
    Verify {
        reply: oneshot::Sender<Result<(), TokenError>>,
    },
    Get {
        reply: oneshot::Sender<Result<TokenRecord, TokenError>>,
    },
    Reminder {
        name: String,
        tick: ReminderTick,
    },
}

/// Handle to a running token actor. Cheap to clone.
///
/// A closed handle means the actor deactivated; the directory reacts by
/// spawning a fresh actor that reloads persisted state — that is the
/// reconstruction path.
#[derive(Clone)]
pub struct TokenHandle {
    kind: TokenKind,
    value: String,
    sender: mpsc::Sender<TokenCommand>,
}

impl TokenHandle {
    /// The token kind this handle addresses.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The token value this handle addresses.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns `true` if the actor task is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Creates the token: validate, write the record, arm expiry.
    pub async fn create(&self, model: CreateTokenModel) -> Result<(), TokenError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(TokenCommand::Create {
                model,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TokenError::Unavailable)?;
        reply_rx.await.map_err(|_| TokenError::Unavailable)?
    }

    /// Checks that the token still exists. Pure existence check — the
    /// record being present *is* the validity signal.
    pub async fn verify(&self) -> Result<(), TokenError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(TokenCommand::Verify { reply: reply_tx })
            .await
            .map_err(|_| TokenError::Unavailable)?;
        reply_rx.await.map_err(|_| TokenError::Unavailable)?
    }

    /// Returns the full record, or `NotFound` if absent/expired.
    pub async fn get(&self) -> Result<TokenRecord, TokenError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(TokenCommand::Get { reply: reply_tx })
            .await
            .map_err(|_| TokenError::Unavailable)?;
        reply_rx.await.map_err(|_| TokenError::Unavailable)?
    }

    /// Routes a reminder delivery into the actor.
    pub async fn deliver_reminder(
        &self,
        name: String,
        tick: ReminderTick,
    ) -> Result<(), TokenError> {
        self.sender
            .send(TokenCommand::Reminder { name, tick })
            .await
            .map_err(|_| TokenError::Unavailable)
    }
}

/// The internal token actor. Runs inside a Tokio task.
struct TokenActor<S: StateStore, O: ExpiryObserver> {
    kind: TokenKind,
    value: String,
    state: PersistedState<TokenRecord, S>,
    expiry: ExpirySchedule,
    observer: Arc<O>,
    receiver: mpsc::Receiver<TokenCommand>,
    /// Set by handlers that want the actor unloaded; the run loop exits
    /// after the current command completes.
    deactivate: bool,
}

impl<S: StateStore, O: ExpiryObserver> TokenActor<S, O> {
    /// Runs the actor loop until deactivation.
    async fn run(mut self) {
        tracing::debug!(kind = %self.kind, value = %self.value, "token actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd).await;
                }
                _tick = self.expiry.wait_for_tick() => {
                    self.on_timer_tick().await;
                }
            }

            if self.deactivate {
                break;
            }
        }

        tracing::debug!(kind = %self.kind, value = %self.value, "token actor stopped");
    }

    async fn handle_command(&mut self, cmd: TokenCommand) {
        match cmd {
            TokenCommand::Create { model, reply } => {
                let result = self.handle_create(model).await;
                let _ = reply.send(result);
            }
            TokenCommand::Verify { reply } => {
                let _ = reply.send(self.handle_verify());
            }
            TokenCommand::Get { reply } => {
                let _ = reply.send(self.handle_get());
            }
            TokenCommand::Reminder { name, tick } => {
                self.on_reminder(&name, tick).await;
            }
        }
    }

    /// Validates and writes a fresh record, then arms expiration.
    ///
    /// The write commits before the reply — a reported success means
    /// the record is durable. Re-creating while a previous lifecycle is
    /// pending replaces the old schedule; there is never more than one
    /// live expiration path.
    async fn handle_create(
        &mut self,
        model: CreateTokenModel,
    ) -> Result<(), TokenError> {
        if let Err(e) = model.validate() {
            // Malformed input: no state written, unload the actor.
            self.deactivate = true;
            return Err(e.into());
        }

        let lifetime = model.lifetime;
        self.state.set(TokenRecord {
            value: model.value,
            owner: model.owner,
            lifetime,
        });
        self.state.write().await?;

        let mechanism = self.expiry.arm(lifetime).await;

        tracing::info!(
            kind = %self.kind,
            value = %self.value,
            lifetime_secs = lifetime.as_secs(),
            mechanism = ?mechanism,
            "token created"
        );
        Ok(())
    }

    fn handle_verify(&mut self) -> Result<(), TokenError> {
        if !self.state.record_exists() {
            self.deactivate = true;
            return Err(TokenError::NotFound);
        }
        Ok(())
    }

    fn handle_get(&mut self) -> Result<TokenRecord, TokenError> {
        match self.state.record() {
            Some(record) => Ok(record.clone()),
            None => {
                self.deactivate = true;
                Err(TokenError::NotFound)
            }
        }
    }

    /// Poll-timer expiration: clear once, notify, unload.
    async fn on_timer_tick(&mut self) {
        if !self.state.record_exists() {
            // Already cleared by another path — stop polling and unload.
            self.expiry.stop_timer();
            self.deactivate = true;
            return;
        }

        self.expire().await;
    }

    /// Reminder expiration. Guards against stale and foreign deliveries
    /// before touching state.
    async fn on_reminder(&mut self, name: &str, _tick: ReminderTick) {
        if !self.state.record_exists() {
            // Redelivery after the record was already cleared: stop the
            // schedule and unload. No error, no double-notify.
            self.expiry.disarm().await;
            self.deactivate = true;
            return;
        }

        if !self.expiry.expects_reminder(name) || !self.expiry.reminder_armed() {
            tracing::warn!(
                kind = %self.kind,
                value = %self.value,
                delivered = name,
                expected = self.expiry.reminder_name(),
                "ignoring stale reminder"
            );
            return;
        }

        self.expire().await;
    }

    /// Clears the record, cancels the schedule, notifies the owner.
    async fn expire(&mut self) {
        let owner = self
            .state
            .record()
            .map(|r| r.owner.clone())
            .unwrap_or_default();

        if let Err(e) = self.state.clear().await {
            // Leave the schedule armed so the next firing retries.
            tracing::error!(
                kind = %self.kind,
                value = %self.value,
                error = %e,
                "failed to clear expired token state"
            );
            return;
        }

        self.expiry.disarm().await;

        if owner.is_unset() {
            tracing::info!(
                kind = %self.kind,
                value = %self.value,
                "ownerless token expired"
            );
        } else {
            tracing::info!(
                kind = %self.kind,
                value = %self.value,
                %owner,
                "token expired, notifying owner"
            );
            self.observer
                .token_expired(&owner, self.kind, &self.value)
                .await;
        }

        self.deactivate = true;
    }
}

/// Spawns a token actor and returns a handle to it.
///
/// The actor loads its persisted record before processing commands, so
/// a handle obtained right after a reactivation observes whatever state
/// the previous lifecycle committed.
pub(crate) fn spawn_token<S: StateStore, O: ExpiryObserver>(
    kind: TokenKind,
    value: String,
    store: Arc<S>,
    reminders: ReminderService,
    observer: Arc<O>,
    channel_size: usize,
) -> TokenHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let handle = TokenHandle {
        kind,
        value: value.clone(),
        sender: tx,
    };

    tokio::spawn(async move {
        let state = match PersistedState::load(store, kind.store_kind(), value.clone())
            .await
        {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    value = %value,
                    error = %e,
                    "token actor failed to load state"
                );
                return;
            }
        };

        let mut expiry = ExpirySchedule::new(
            reminders.clone(),
            kind.store_kind(),
            value.clone(),
            kind.reminder_name(),
        );
        // A reactivated actor rediscovers its pending reminder. The
        // in-memory poll timer does not survive deactivation.
        if reminders
            .is_registered(kind.store_kind(), &value, kind.reminder_name())
            .await
        {
            expiry.restore_reminder();
        }

        let actor = TokenActor {
            kind,
            value,
            state,
            expiry,
            observer,
            receiver: rx,
            deactivate: false,
        };
        actor.run().await;
    });

    handle
}

/// Generates a random 32-character hex token value (128 bits).
///
/// Convenience for callers that don't mint their own values. 128 bits
/// makes guessing a live token computationally infeasible.
pub fn generate_token_value() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
