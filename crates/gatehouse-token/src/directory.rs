//! Token directory: activates, tracks, and routes to token actors.

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_model::{CreateTokenModel, TokenKind, TokenRecord};
use gatehouse_runtime::{ReminderService, ReminderTick, StateStore};

use crate::actor::spawn_token;
use crate::{ExpiryObserver, TokenError, TokenHandle};

/// Default command channel size for token actors.
const DEFAULT_CHANNEL_SIZE: usize = 16;

/// Activates and tracks token actors, keyed by `(kind, value)`.
///
/// This is the `getOrActivate` index for tokens: at most one live actor
/// per key at a time. An actor that deactivated leaves a closed handle
/// behind; the next operation spawns a replacement that reloads
/// persisted state — which is how an evicted token comes back when its
/// reminder finally fires.
pub struct TokenDirectory<S: StateStore, O: ExpiryObserver> {
    store: Arc<S>,
    reminders: ReminderService,
    observer: Arc<O>,
    actors: HashMap<(TokenKind, String), TokenHandle>,
}

impl<S: StateStore, O: ExpiryObserver> TokenDirectory<S, O> {
    /// Creates an empty directory over the given store and reminder
    /// service.
    pub fn new(store: Arc<S>, reminders: ReminderService, observer: Arc<O>) -> Self {
        Self {
            store,
            reminders,
            observer,
            actors: HashMap::new(),
        }
    }

    /// Returns a live handle for `kind`/`value`, activating the actor
    /// if it isn't running.
    pub fn token(&mut self, kind: TokenKind, value: &str) -> TokenHandle {
        if let Some(handle) = self.actors.get(&(kind, value.to_string())) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let handle = spawn_token(
            kind,
            value.to_string(),
            Arc::clone(&self.store),
            self.reminders.clone(),
            Arc::clone(&self.observer),
            DEFAULT_CHANNEL_SIZE,
        );
        self.actors
            .insert((kind, value.to_string()), handle.clone());
        handle
    }

    /// Creates a token, reactivating the actor once if it raced a
    /// deactivation.
    pub async fn create(
        &mut self,
        kind: TokenKind,
        model: CreateTokenModel,
    ) -> Result<(), TokenError> {
        let value = model.value.clone();
        match self.token(kind, &value).create(model.clone()).await {
            Err(TokenError::Unavailable) => {
                self.token(kind, &value).create(model).await
            }
            other => other,
        }
    }

    /// Verifies a token, reactivating the actor once if needed.
    pub async fn verify(
        &mut self,
        kind: TokenKind,
        value: &str,
    ) -> Result<(), TokenError> {
        match self.token(kind, value).verify().await {
            Err(TokenError::Unavailable) => self.token(kind, value).verify().await,
            other => other,
        }
    }

    /// Fetches a token record, reactivating the actor once if needed.
    pub async fn get(
        &mut self,
        kind: TokenKind,
        value: &str,
    ) -> Result<TokenRecord, TokenError> {
        match self.token(kind, value).get().await {
            Err(TokenError::Unavailable) => self.token(kind, value).get().await,
            other => other,
        }
    }

    /// Delivers a reminder to its token actor, reactivating it first if
    /// it was evicted — the runtime's obligation for durable reminders.
    pub async fn deliver_reminder(
        &mut self,
        kind: TokenKind,
        value: &str,
        name: &str,
        tick: ReminderTick,
    ) -> Result<(), TokenError> {
        let result = self
            .token(kind, value)
            .deliver_reminder(name.to_string(), tick.clone())
            .await;
        match result {
            Err(TokenError::Unavailable) => {
                self.token(kind, value)
                    .deliver_reminder(name.to_string(), tick)
                    .await
            }
            other => other,
        }
    }

    /// Drops handles whose actors have deactivated, freeing the map.
    ///
    /// Purely a memory optimization — closed handles are replaced
    /// lazily on access anyway.
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
