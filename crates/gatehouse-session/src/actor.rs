//! Session actor: an isolated Tokio task that owns one session's record.
//!
//! All operations against a session — create, close, get, authorization
//! checks, last-access touches, scheduled callbacks — are serialized
//! through the actor's command channel. Authorization therefore always
//! observes whatever state a prior close or expiration has already
//! committed, and never a torn write.

use std::sync::Arc;

use chrono::Utc;
use gatehouse_expiry::ExpirySchedule;
use gatehouse_model::{CreateSessionModel, SessionRecord, SessionStatus};
use gatehouse_runtime::{PersistedState, ReminderService, ReminderTick, StateStore};
use tokio::sync::{mpsc, oneshot};

use crate::{SessionError, SessionOptions};

/// Store kind for session records.
pub const SESSION_STORE_KIND: &str = "session";

/// Reminder name for session expiration. Deliveries under any other
/// name are foreign to the session actor and ignored.
pub const SESSION_REMINDER_NAME: &str = "session-expiry";

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Create {
        model: CreateSessionModel,
        reply: oneshot::Sender<Result<SessionRecord, SessionError>>,
    },
    Close {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Get {
        reply: oneshot::Sender<Result<SessionRecord, SessionError>>,
    },
    Authorize {
        required_roles: Vec<String>,
        allow_anonymous: bool,
        reply: oneshot::Sender<bool>,
    },
    /// Update `last_access`. Fire-and-forget — no reply channel, so an
    /// admitted call is never blocked on the bookkeeping write.
    Touch,
    Reminder {
        name: String,
        tick: ReminderTick,
    },
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The session id this handle addresses.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if the actor task is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Creates a fresh session lifecycle, overwriting any prior record
    /// for this id. Returns the created record.
    pub async fn create(
        &self,
        model: CreateSessionModel,
    ) -> Result<SessionRecord, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Create {
                model,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Closes the session. What happens to the record depends on the
    /// configured close policy.
    pub async fn close(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Close { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Returns the session record, or `NotFound` if absent/expired.
    pub async fn get(&self) -> Result<SessionRecord, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Get { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// The authorization decision for this session.
    ///
    /// Semantics, in order:
    /// - `allow_anonymous` → authorized, regardless of session state;
    /// - no record, or status not Active → denied;
    /// - empty `required_roles` → any live session is enough;
    /// - otherwise **any-of**: holding at least one required role
    ///   authorizes the call (deliberately not all-of).
    pub async fn is_authorized(
        &self,
        required_roles: Vec<String>,
        allow_anonymous: bool,
    ) -> Result<bool, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Authorize {
                required_roles,
                allow_anonymous,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Updates `last_access`. Fire-and-forget; errors are ignored
    /// because admission must never depend on this write.
    pub async fn touch(&self) {
        let _ = self.sender.send(SessionCommand::Touch).await;
    }

    /// Routes a reminder delivery into the actor.
    pub async fn deliver_reminder(
        &self,
        name: String,
        tick: ReminderTick,
    ) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Reminder { name, tick })
            .await
            .map_err(|_| SessionError::Unavailable)
    }
}

/// The internal session actor. Runs inside a Tokio task.
struct SessionActor<S: StateStore> {
    id: String,
    state: PersistedState<SessionRecord, S>,
    expiry: ExpirySchedule,
    options: SessionOptions,
    receiver: mpsc::Receiver<SessionCommand>,
    deactivate: bool,
}

impl<S: StateStore> SessionActor<S> {
    async fn run(mut self) {
        tracing::debug!(id = %self.id, "session actor started");

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

        tracing::debug!(id = %self.id, "session actor stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Create { model, reply } => {
                let result = self.handle_create(model).await;
                let _ = reply.send(result);
            }
            SessionCommand::Close { reply } => {
                let result = self.handle_close().await;
                let _ = reply.send(result);
            }
            SessionCommand::Get { reply } => {
                let _ = reply.send(self.handle_get());
            }
            SessionCommand::Authorize {
                required_roles,
                allow_anonymous,
                reply,
            } => {
                let _ = reply.send(
                    self.handle_authorize(&required_roles, allow_anonymous),
                );
            }
            SessionCommand::Touch => {
                self.handle_touch().await;
            }
            SessionCommand::Reminder { name, tick } => {
                self.on_reminder(&name, tick).await;
            }
        }
    }

    /// Writes a fresh Active record and arms expiration.
    ///
    /// Any prior record for this id — Active, Closed, whatever — is
    /// overwritten: create means a new lifecycle, never a resume. The
    /// write commits before the reply, and re-arming replaces any
    /// pending schedule from the previous lifecycle.
    async fn handle_create(
        &mut self,
        model: CreateSessionModel,
    ) -> Result<SessionRecord, SessionError> {
        if let Err(e) = model.validate() {
            self.deactivate = true;
            return Err(e.into());
        }

        let now = Utc::now();
        let record = SessionRecord {
            id: self.id.clone(),
            email: model.email,
            created: now,
            last_access: now,
            closed: None,
            status: SessionStatus::Active,
            roles: model.roles,
            claims: model.claims,
            owner: model.owner,
        };
        self.state.set(record.clone());
        self.state.write().await?;

        self.expiry.arm(self.options.session_lifetime).await;

        tracing::info!(
            id = %self.id,
            lifetime_secs = self.options.session_lifetime.as_secs(),
            "session created"
        );
        Ok(record)
    }

    /// Transitions the session to Closed.
    ///
    /// With `clear_state_on_close` the record is cleared on the spot —
    /// indistinguishable from expiring now. Otherwise the Closed record
    /// stays queryable and the previously armed schedule clears it when
    /// the original deadline fires.
    async fn handle_close(&mut self) -> Result<(), SessionError> {
        let Some(record) = self.state.record_mut() else {
            self.deactivate = true;
            return Err(SessionError::NotFound);
        };

        record.status = SessionStatus::Closed;
        record.closed = Some(Utc::now());

        if self.options.clear_state_on_close {
            self.state.clear().await?;
            self.expiry.disarm().await;
            self.deactivate = true;
            tracing::info!(id = %self.id, "session closed, state cleared");
        } else {
            self.state.write().await?;
            tracing::info!(
                id = %self.id,
                "session closed, record retained until expiration"
            );
        }

        Ok(())
    }

    fn handle_get(&mut self) -> Result<SessionRecord, SessionError> {
        match self.state.record() {
            Some(record) => Ok(record.clone()),
            None => {
                self.deactivate = true;
                Err(SessionError::NotFound)
            }
        }
    }

    /// The pure authorization decision. See
    /// [`SessionHandle::is_authorized`] for the semantics.
    fn handle_authorize(
        &mut self,
        required_roles: &[String],
        allow_anonymous: bool,
    ) -> bool {
        if allow_anonymous {
            return true;
        }

        let Some(record) = self.state.record() else {
            // Dead state should not stay resident just to say "no".
            self.deactivate = true;
            return false;
        };

        if !record.status.is_active() {
            tracing::debug!(
                id = %self.id,
                status = %record.status,
                "authorization denied: session not active"
            );
            return false;
        }

        if required_roles.is_empty() {
            return true;
        }

        let authorized =
            record.has_any_role(required_roles.iter().map(String::as_str));
        if !authorized {
            tracing::debug!(
                id = %self.id,
                required = ?required_roles,
                held = ?record.roles,
                "authorization denied: no required role held"
            );
        }
        authorized
    }

    async fn handle_touch(&mut self) {
        let Some(record) = self.state.record_mut() else {
            return;
        };
        if !record.status.is_active() {
            return;
        }

        record.last_access = Utc::now();
        if let Err(e) = self.state.write().await {
            tracing::warn!(id = %self.id, error = %e, "last_access write failed");
        }
    }

    async fn on_timer_tick(&mut self) {
        if !self.state.record_exists() {
            self.expiry.stop_timer();
            self.deactivate = true;
            return;
        }

        self.expire().await;
    }

    async fn on_reminder(&mut self, name: &str, _tick: ReminderTick) {
        if !self.state.record_exists() {
            self.expiry.disarm().await;
            self.deactivate = true;
            return;
        }

        if !self.expiry.expects_reminder(name) || !self.expiry.reminder_armed() {
            tracing::warn!(
                id = %self.id,
                delivered = name,
                expected = self.expiry.reminder_name(),
                "ignoring stale reminder"
            );
            return;
        }

        self.expire().await;
    }

    /// Clears the record and stops the schedule. Expiration goes
    /// straight from whatever status the record held to "no record".
    async fn expire(&mut self) {
        if let Err(e) = self.state.clear().await {
            // Leave the schedule armed so the next firing retries.
            tracing::error!(
                id = %self.id,
                error = %e,
                "failed to clear expired session state"
            );
            return;
        }

        self.expiry.disarm().await;
        tracing::info!(id = %self.id, "session expired, state cleared");
        self.deactivate = true;
    }
}

/// Spawns a session actor and returns a handle to it.
///
/// The actor loads its persisted record before processing commands, so
/// reactivation observes the previous lifecycle's committed state.
pub(crate) fn spawn_session<S: StateStore>(
    id: String,
    store: Arc<S>,
    reminders: ReminderService,
    options: SessionOptions,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let handle = SessionHandle {
        id: id.clone(),
        sender: tx,
    };

    tokio::spawn(async move {
        let state =
            match PersistedState::load(store, SESSION_STORE_KIND, id.clone()).await
            {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(
                        id = %id,
                        error = %e,
                        "session actor failed to load state"
                    );
                    return;
                }
            };

        let mut expiry = ExpirySchedule::new(
            reminders.clone(),
            SESSION_STORE_KIND,
            id.clone(),
            SESSION_REMINDER_NAME,
        );
        if reminders
            .is_registered(SESSION_STORE_KIND, &id, SESSION_REMINDER_NAME)
            .await
        {
            expiry.restore_reminder();
        }

        let actor = SessionActor {
            id,
            state,
            expiry,
            options,
            receiver: rx,
            deactivate: false,
        };
        actor.run().await;
    });

    handle
}
