//! Record and model types persisted or exchanged by the framework.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// An opaque reference to another logical actor, e.g. the identity that
/// owns a verification token.
///
/// The framework never dereferences this itself — it only stores it and
/// hands it back to the host (for example to an expiry observer). The
/// default value is the *null reference*: a token with an unset owner is
/// valid and simply has nobody to notify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The kind of the referenced actor (e.g. `"user"`).
    pub kind: String,
    /// The referenced actor's key within its kind.
    pub key: String,
}

impl EntityRef {
    /// Creates a reference to the actor `kind`/`key`.
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Returns `true` if this is the null reference (no owner).
    pub fn is_unset(&self) -> bool {
        self.kind.is_empty() && self.key.is_empty()
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unset() {
            write!(f, "<unset>")
        } else {
            write!(f, "{}/{}", self.kind, self.key)
        }
    }
}

// ---------------------------------------------------------------------------
// TokenKind
// ---------------------------------------------------------------------------

/// The purpose of a verification token.
///
/// Each kind addresses its own keyspace in the store and registers its
/// reminders under its own name, so a password-reset token and an email
/// verification token with the same value never collide — and a reminder
/// fired for one kind is recognizably foreign to the other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum TokenKind {
    /// One-time token mailed out to confirm an email address.
    EmailVerification,
    /// One-time token for a password reset flow.
    PasswordReset,
}

impl TokenKind {
    /// The store kind string this token kind persists under.
    pub fn store_kind(&self) -> &'static str {
        match self {
            Self::EmailVerification => "token.email-verification",
            Self::PasswordReset => "token.password-reset",
        }
    }

    /// Resolves a store kind string back to the token kind.
    ///
    /// Used when routing reminder deliveries, which carry the store
    /// kind as plain text.
    pub fn from_store_kind(kind: &str) -> Option<Self> {
        match kind {
            "token.email-verification" => Some(Self::EmailVerification),
            "token.password-reset" => Some(Self::PasswordReset),
            _ => None,
        }
    }

    /// The durable reminder name used for this kind's expiration.
    ///
    /// Reminder delivery carries this name back; a mismatch marks the
    /// delivery as stale/foreign and it is ignored.
    pub fn reminder_name(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email-verification-expiry",
            Self::PasswordReset => "password-reset-expiry",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailVerification => write!(f, "EmailVerification"),
            Self::PasswordReset => write!(f, "PasswordReset"),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenRecord
// ---------------------------------------------------------------------------

/// The persisted record of a live verification token.
///
/// There is deliberately no stored expiry timestamp: the lifetime is a
/// time-to-live from creation, tracked entirely by the expiration
/// scheduler. A record that is absent from the store is indistinguishable
/// from an expired one — record existence *is* the validity signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The token value. Unique within its kind, immutable once created.
    pub value: String,

    /// The identity this token belongs to. May be unset, in which case
    /// expiration is terminal with no owner notification.
    #[serde(default)]
    pub owner: EntityRef,

    /// Time-to-live from the moment of creation.
    pub lifetime: Duration,
}

// ---------------------------------------------------------------------------
// ClaimValue
// ---------------------------------------------------------------------------

/// An opaque claim attached to a session, keyed by claim type.
///
/// The framework treats claims as inert key/value data — only the role
/// list participates in authorization decisions. `value_type` and
/// `issuer` are carried for hosts that need them and default to empty
/// when absent from older payloads.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct ClaimValue {
    /// The claim's value.
    pub value: String,

    /// Optional type tag for the value (e.g. a URI describing the
    /// encoding). Empty when unspecified.
    #[serde(default)]
    pub value_type: String,

    /// Optional issuer of the claim. Empty when unspecified.
    #[serde(default)]
    pub issuer: String,
}

impl ClaimValue {
    /// A plain claim with no type or issuer metadata.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a session record.
///
/// Transitions are monotonic:
///
/// ```text
/// Active ──(close)──→ Closed
///   │
///   └──(expiration)──→ record cleared
/// ```
///
/// Once a session is Closed or Expired it never returns to Active; a new
/// create call on the same id starts a fresh lifecycle by overwriting the
/// record entirely.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum SessionStatus {
    /// The session is live and can authorize calls.
    Active,
    /// The session was explicitly closed. Depending on configuration the
    /// record may remain queryable until its original deadline passes.
    Closed,
    /// Terminal expired marker, for stores that retain tombstones. The
    /// normal expiration path clears the record instead of writing this.
    Expired,
}

impl SessionStatus {
    /// Returns `true` if the session can authorize calls.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// The persisted record of a session.
///
/// Mutated only by the owning session actor; everything handed out to
/// callers is a copy. `claims` was added after the first layout and
/// defaults to empty when decoding older records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Caller-supplied session id, unique across sessions.
    pub id: String,

    /// Email associated with the session, when known.
    #[serde(default)]
    pub email: Option<String>,

    /// When this lifecycle was created.
    pub created: DateTime<Utc>,

    /// Last time an authorized call touched this session.
    pub last_access: DateTime<Utc>,

    /// When the session was explicitly closed, if it was.
    #[serde(default)]
    pub closed: Option<DateTime<Utc>>,

    /// Current lifecycle status.
    pub status: SessionStatus,

    /// Roles granted to this session, in the order supplied at creation.
    pub roles: Vec<String>,

    /// Arbitrary claims attached to the session, keyed by claim type.
    #[serde(default)]
    pub claims: BTreeMap<String, ClaimValue>,

    /// The identity behind this session. Unset is allowed.
    #[serde(default)]
    pub owner: EntityRef,
}

impl SessionRecord {
    /// Returns `true` if any of `required` appears in this session's
    /// role list.
    ///
    /// This is the *any-of* check used by authorization: holding one of
    /// the required roles suffices, the session does not need all of
    /// them.
    pub fn has_any_role<'a>(
        &self,
        required: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        required
            .into_iter()
            .any(|r| self.roles.iter().any(|have| have == r))
    }
}

// ---------------------------------------------------------------------------
// Create models
// ---------------------------------------------------------------------------

/// Input for creating a verification token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenModel {
    /// The token value. Must be non-empty.
    pub value: String,

    /// The identity the token belongs to. Unset is allowed.
    #[serde(default)]
    pub owner: EntityRef,

    /// Time-to-live. Must be greater than zero.
    pub lifetime: Duration,
}

impl CreateTokenModel {
    /// Checks the model for malformed input.
    ///
    /// Called by the token actor before anything is written; a failure
    /// here guarantees no partial state.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.value.trim().is_empty() {
            return Err(ModelError::EmptyTokenValue);
        }
        if self.lifetime.is_zero() {
            return Err(ModelError::ZeroLifetime);
        }
        Ok(())
    }
}

/// Input for creating a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionModel {
    /// Email to attach to the session, when known.
    #[serde(default)]
    pub email: Option<String>,

    /// Roles granted to the session.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Claims attached to the session, keyed by claim type.
    #[serde(default)]
    pub claims: BTreeMap<String, ClaimValue>,

    /// The identity behind this session. Unset is allowed.
    #[serde(default)]
    pub owner: EntityRef,
}

impl CreateSessionModel {
    /// Checks the model for malformed input.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ModelError::EmptyRole);
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
