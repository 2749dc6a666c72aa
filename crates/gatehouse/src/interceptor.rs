//! The authorization gate: per-call interception before any protected
//! operation executes.
//!
//! The flow for every protected call is:
//!   1. Anonymous-allowed operation → admit unconditionally
//!   2. Extract the session id from call metadata → absent is a hard
//!      failure, never "treat as anonymous"
//!   3. Ask the session actor for the authorization decision
//!   4. Admitted → fire-and-forget a last-access touch, run the
//!      operation; denied → reject before the operation runs

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_runtime::StateStore;
use gatehouse_session::{SessionDirectory, SessionError, SessionHandle};
use tokio::sync::Mutex;

use crate::AccessPolicy;

/// Metadata key under which the session id travels with a call.
pub const SESSION_ID_KEY: &str = "gh-session-id";

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Metadata carried by an inbound call.
///
/// The transport glue (HTTP headers, connection context, message
/// envelope) populates this; the gate only reads it. The framework
/// cares about [`SESSION_ID_KEY`], everything else rides along opaquely.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: HashMap<String, String>,
}

impl CallContext {
    /// An empty context — what an unauthenticated caller presents.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying `id` as the session id.
    pub fn with_session_id(id: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.insert(SESSION_ID_KEY, id);
        ctx
    }

    /// Sets a metadata entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Reads a metadata entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The session id, if the call carries one.
    pub fn session_id(&self) -> Option<&str> {
        self.get(SESSION_ID_KEY)
    }
}

// ---------------------------------------------------------------------------
// Errors and admissions
// ---------------------------------------------------------------------------

/// Why the gate rejected a call.
///
/// Distinct from a session `NotFound`: the caller of a protected
/// operation sees a rejection, not a lookup error — and never a crash.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The operation requires a session and the call carried no id.
    #[error("no session id present in the call context")]
    MissingSessionId,

    /// The session exists-or-not question was answered, and the answer
    /// was no: missing, not Active, or lacking every required role.
    #[error("session {session_id} is not authorized for this operation")]
    Denied {
        /// The session id the call presented.
        session_id: String,
    },

    /// The session actor could not be consulted at all.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How an admitted call got in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The operation admits anonymous callers.
    Anonymous,
    /// A live session authorized the call.
    Session(String),
}

// ---------------------------------------------------------------------------
// AuthorizationGate
// ---------------------------------------------------------------------------

/// Intercepts calls to protected operations and decides admission
/// against the live session state.
///
/// Cheap to clone; all clones consult the same session directory.
pub struct AuthorizationGate<S: StateStore> {
    sessions: Arc<Mutex<SessionDirectory<S>>>,
}

impl<S: StateStore> Clone for AuthorizationGate<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<S: StateStore> AuthorizationGate<S> {
    /// Creates a gate over the given session directory.
    pub fn new(sessions: Arc<Mutex<SessionDirectory<S>>>) -> Self {
        Self { sessions }
    }

    /// Decides whether a call under `policy` is admitted.
    ///
    /// On admission the session's `last_access` is updated
    /// fire-and-forget — the admission itself never waits for that
    /// write.
    pub async fn check(
        &self,
        ctx: &CallContext,
        policy: &AccessPolicy,
    ) -> Result<Admission, AuthError> {
        if policy.is_anonymous() {
            return Ok(Admission::Anonymous);
        }

        let Some(session_id) = ctx.session_id() else {
            tracing::debug!("rejected call without session id");
            return Err(AuthError::MissingSessionId);
        };

        let required: Vec<String> =
            policy.required_roles().iter().cloned().collect();

        // Take a handle and release the directory before awaiting the
        // actor, so one slow session never stalls unrelated calls.
        let mut handle = self.session_handle(session_id).await;
        let authorized = match handle
            .is_authorized(required.clone(), false)
            .await
        {
            Ok(decision) => decision,
            Err(SessionError::Unavailable) => {
                // The actor deactivated under us — reactivate once.
                handle = self.session_handle(session_id).await;
                handle.is_authorized(required, false).await?
            }
            Err(e) => return Err(e.into()),
        };

        if !authorized {
            tracing::debug!(session_id, "call rejected by session state");
            return Err(AuthError::Denied {
                session_id: session_id.to_string(),
            });
        }

        let touch = handle.clone();
        tokio::spawn(async move {
            touch.touch().await;
        });

        Ok(Admission::Session(session_id.to_string()))
    }

    /// Runs `operation` if and only if the call is admitted.
    ///
    /// The operation closure is not even invoked on rejection — the
    /// wrapped work cannot observe an unauthorized call.
    pub async fn invoke<F, Fut, T>(
        &self,
        ctx: &CallContext,
        policy: &AccessPolicy,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.check(ctx, policy).await?;
        Ok(operation().await)
    }

    async fn session_handle(&self, session_id: &str) -> SessionHandle {
        self.sessions.lock().await.session(session_id)
    }
}
