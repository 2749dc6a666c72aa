//! `Gatehouse` builder and facade.
//!
//! This is the entry point for embedding Gatehouse. It ties the layers
//! together: store → runtime → expiry → token/session actors → gate,
//! and owns the background task that routes reminder deliveries back
//! into the right actor (reactivating it first when it was evicted).

use std::sync::Arc;

use gatehouse_model::{
    CreateSessionModel, CreateTokenModel, SessionRecord, TokenKind,
    TokenRecord,
};
use gatehouse_runtime::{ReminderDelivery, ReminderService, StateStore};
use gatehouse_session::{
    SESSION_STORE_KIND, SessionDirectory, SessionOptions,
};
use gatehouse_token::{ExpiryObserver, NoopObserver, TokenDirectory};
use tokio::sync::{Mutex, mpsc};

use crate::{AuthorizationGate, GatehouseError};

/// Builder for configuring a [`Gatehouse`] instance.
///
/// # Example
///
/// ```rust,no_run
/// use gatehouse::prelude::*;
///
/// let gh = Gatehouse::builder()
///     .session_options(SessionOptions::default())
///     .build(MemoryStateStore::new());
/// ```
pub struct GatehouseBuilder<O: ExpiryObserver = NoopObserver> {
    session_options: SessionOptions,
    observer: O,
}

impl GatehouseBuilder<NoopObserver> {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            session_options: SessionOptions::default(),
            observer: NoopObserver,
        }
    }
}

impl Default for GatehouseBuilder<NoopObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ExpiryObserver> GatehouseBuilder<O> {
    /// Sets the deployment-wide session options.
    pub fn session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Installs the observer notified when owned tokens expire.
    pub fn expiry_observer<O2: ExpiryObserver>(
        self,
        observer: O2,
    ) -> GatehouseBuilder<O2> {
        GatehouseBuilder {
            session_options: self.session_options,
            observer,
        }
    }

    /// Wires everything over `store` and starts the background
    /// reminder routing.
    ///
    /// Must be called within a Tokio runtime — the reminder dispatcher
    /// and router run as spawned tasks.
    pub fn build<S: StateStore>(self, store: S) -> Gatehouse<S, O> {
        let store = Arc::new(store);
        let (reminders, delivery_rx) = ReminderService::start();

        let sessions = Arc::new(Mutex::new(SessionDirectory::new(
            Arc::clone(&store),
            reminders.clone(),
            self.session_options,
        )));
        let tokens = Arc::new(Mutex::new(TokenDirectory::new(
            Arc::clone(&store),
            reminders.clone(),
            Arc::new(self.observer),
        )));

        tokio::spawn(route_reminders(
            Arc::clone(&sessions),
            Arc::clone(&tokens),
            delivery_rx,
        ));

        let gate = AuthorizationGate::new(Arc::clone(&sessions));

        Gatehouse {
            store,
            reminders,
            sessions,
            tokens,
            gate,
        }
    }
}

/// Routes due reminders to their actors for as long as the service
/// delivers them.
async fn route_reminders<S: StateStore, O: ExpiryObserver>(
    sessions: Arc<Mutex<SessionDirectory<S>>>,
    tokens: Arc<Mutex<TokenDirectory<S, O>>>,
    mut rx: mpsc::Receiver<ReminderDelivery>,
) {
    while let Some(delivery) = rx.recv().await {
        if delivery.kind == SESSION_STORE_KIND {
            let mut dir = sessions.lock().await;
            if let Err(e) = dir
                .deliver_reminder(&delivery.key, &delivery.name, delivery.tick)
                .await
            {
                tracing::warn!(
                    key = %delivery.key,
                    error = %e,
                    "session reminder delivery failed"
                );
            }
        } else if let Some(kind) = TokenKind::from_store_kind(&delivery.kind) {
            let mut dir = tokens.lock().await;
            if let Err(e) = dir
                .deliver_reminder(kind, &delivery.key, &delivery.name, delivery.tick)
                .await
            {
                tracing::warn!(
                    key = %delivery.key,
                    error = %e,
                    "token reminder delivery failed"
                );
            }
        } else {
            tracing::warn!(kind = %delivery.kind, "unroutable reminder delivery");
        }
    }

    tracing::debug!("reminder routing stopped");
}

/// A wired Gatehouse instance.
///
/// Exposes the create/verify/close surface for sessions and tokens,
/// and the [`gate`](Self::gate) that protects arbitrary operations.
pub struct Gatehouse<S: StateStore, O: ExpiryObserver = NoopObserver> {
    store: Arc<S>,
    reminders: ReminderService,
    sessions: Arc<Mutex<SessionDirectory<S>>>,
    tokens: Arc<Mutex<TokenDirectory<S, O>>>,
    gate: AuthorizationGate<S>,
}

impl Gatehouse<gatehouse_runtime::MemoryStateStore, NoopObserver> {
    /// Creates a new builder.
    pub fn builder() -> GatehouseBuilder<NoopObserver> {
        GatehouseBuilder::new()
    }
}

impl<S: StateStore, O: ExpiryObserver> Gatehouse<S, O> {
    /// The authorization gate for protected operations.
    pub fn gate(&self) -> &AuthorizationGate<S> {
        &self.gate
    }

    /// The shared state store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The reminder schedule (mainly useful for inspection in tests).
    pub fn reminders(&self) -> &ReminderService {
        &self.reminders
    }

    // -- Sessions ---------------------------------------------------------

    /// Creates a fresh session lifecycle under `id`.
    pub async fn create_session(
        &self,
        id: &str,
        model: CreateSessionModel,
    ) -> Result<SessionRecord, GatehouseError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.create(id, model).await?)
    }

    /// Fetches the session record under `id`.
    pub async fn get_session(
        &self,
        id: &str,
    ) -> Result<SessionRecord, GatehouseError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.get(id).await?)
    }

    /// Closes the session under `id` per the configured close policy.
    pub async fn close_session(&self, id: &str) -> Result<(), GatehouseError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.close(id).await?)
    }

    // -- Tokens -----------------------------------------------------------

    /// Creates a verification token.
    pub async fn create_token(
        &self,
        kind: TokenKind,
        model: CreateTokenModel,
    ) -> Result<(), GatehouseError> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.create(kind, model).await?)
    }

    /// Verifies that a token still exists (and therefore hasn't
    /// expired).
    pub async fn verify_token(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> Result<(), GatehouseError> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.verify(kind, value).await?)
    }

    /// Fetches a token record.
    pub async fn get_token(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> Result<TokenRecord, GatehouseError> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.get(kind, value).await?)
    }
}
