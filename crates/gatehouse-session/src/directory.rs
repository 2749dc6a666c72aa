//! Session directory: activates, tracks, and routes to session actors.

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_model::{CreateSessionModel, SessionRecord};
use gatehouse_runtime::{ReminderService, ReminderTick, StateStore};

use crate::actor::spawn_session;
use crate::{SessionError, SessionHandle, SessionOptions};

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 16;

/// Activates and tracks session actors, keyed by session id.
///
/// The `getOrActivate` index for sessions: at most one live actor per
/// id. Deactivated actors are respawned lazily from persisted state on
/// the next operation (or reminder delivery) that addresses them.
pub struct SessionDirectory<S: StateStore> {
    store: Arc<S>,
    reminders: ReminderService,
    options: SessionOptions,
    actors: HashMap<String, SessionHandle>,
}

impl<S: StateStore> SessionDirectory<S> {
    /// Creates an empty directory over the given store and reminder
    /// service.
    pub fn new(
        store: Arc<S>,
        reminders: ReminderService,
        options: SessionOptions,
    ) -> Self {
        Self {
            store,
            reminders,
            options: options.validated(),
            actors: HashMap::new(),
        }
    }

    /// The options every session actor runs with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Returns a live handle for `id`, activating the actor if it isn't
    /// running.
    pub fn session(&mut self, id: &str) -> SessionHandle {
        if let Some(handle) = self.actors.get(id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let handle = spawn_session(
            id.to_string(),
            Arc::clone(&self.store),
            self.reminders.clone(),
            self.options.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        self.actors.insert(id.to_string(), handle.clone());
        handle
    }

    /// Creates a fresh session lifecycle under `id`, reactivating the
    /// actor once if it raced a deactivation.
    pub async fn create(
        &mut self,
        id: &str,
        model: CreateSessionModel,
    ) -> Result<SessionRecord, SessionError> {
        match self.session(id).create(model.clone()).await {
            Err(SessionError::Unavailable) => self.session(id).create(model).await,
            other => other,
        }
    }

    /// Closes the session under `id`.
    pub async fn close(&mut self, id: &str) -> Result<(), SessionError> {
        match self.session(id).close().await {
            Err(SessionError::Unavailable) => self.session(id).close().await,
            other => other,
        }
    }

    /// Fetches the session record under `id`.
    pub async fn get(&mut self, id: &str) -> Result<SessionRecord, SessionError> {
        match self.session(id).get().await {
            Err(SessionError::Unavailable) => self.session(id).get().await,
            other => other,
        }
    }

    /// Asks the session actor for an authorization decision.
    pub async fn is_authorized(
        &mut self,
        id: &str,
        required_roles: Vec<String>,
        allow_anonymous: bool,
    ) -> Result<bool, SessionError> {
        let result = self
            .session(id)
            .is_authorized(required_roles.clone(), allow_anonymous)
            .await;
        match result {
            Err(SessionError::Unavailable) => {
                self.session(id)
                    .is_authorized(required_roles, allow_anonymous)
                    .await
            }
            other => other,
        }
    }

    /// Delivers a reminder to its session actor, reactivating it first
    /// if it was evicted.
    pub async fn deliver_reminder(
        &mut self,
        id: &str,
        name: &str,
        tick: ReminderTick,
    ) -> Result<(), SessionError> {
        let result = self
            .session(id)
            .deliver_reminder(name.to_string(), tick.clone())
            .await;
        match result {
            Err(SessionError::Unavailable) => {
                self.session(id).deliver_reminder(name.to_string(), tick).await
            }
            other => other,
        }
    }

    /// Drops handles whose actors have deactivated.
    pub fn prune(&mut self) {
        self.actors.retain(|_, handle| !handle.is_closed());
    }

    /// Number of tracked handles (live or not yet pruned).
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Returns `true` if no handles are tracked.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
