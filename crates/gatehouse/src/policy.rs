//! Access policies: declared role requirements and their composition.
//!
//! Policies are plain metadata attached to operations and their
//! enclosing scopes (a whole service, a controller, a hub), resolved at
//! call-dispatch time. There is no inheritance hierarchy — just values
//! composed by [`AccessPolicy::compose`].

use std::collections::BTreeSet;

/// One declared access requirement.
///
/// Used both as an annotation on a scope or operation and as the
/// effective, composed requirement the gate evaluates.
///
/// The default policy requires an authenticated session with no
/// particular role — the "any live session suffices" case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    anonymous: bool,
    roles: BTreeSet<String>,
}

impl AccessPolicy {
    /// Requires an authenticated, Active session; no specific role.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Admits every caller, session or not.
    pub fn allow_anonymous() -> Self {
        Self {
            anonymous: true,
            roles: BTreeSet::new(),
        }
    }

    /// Requires a session holding `role`.
    pub fn require_role(role: impl Into<String>) -> Self {
        Self {
            anonymous: false,
            roles: BTreeSet::from([role.into()]),
        }
    }

    /// Adds another acceptable role to this policy.
    ///
    /// Multiple roles are **any-of**: a session holding at least one of
    /// them satisfies the policy.
    pub fn and_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Whether this policy admits anonymous callers.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// The roles this policy accepts (any-of). Empty means any
    /// authenticated session.
    pub fn required_roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Composes a chain of declared policies, outermost scope first,
    /// the operation's own annotation last.
    ///
    /// Rules:
    /// - An explicit anonymous annotation on the **operation itself**
    ///   (the last element) overrides everything inherited, for that
    ///   operation only.
    /// - Otherwise role requirements accumulate by **union** — an
    ///   operation inherits every enclosing scope's roles plus its own.
    ///   Scopes never override each other.
    /// - An empty chain is the default: authenticated, no roles.
    pub fn compose<'a>(chain: impl IntoIterator<Item = &'a AccessPolicy>) -> Self {
        let mut roles = BTreeSet::new();
        let mut last_anonymous = false;

        for policy in chain {
            roles.extend(policy.roles.iter().cloned());
            last_anonymous = policy.anonymous;
        }

        if last_anonymous {
            return Self::allow_anonymous();
        }

        Self {
            anonymous: false,
            roles,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
