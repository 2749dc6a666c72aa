//! Session configuration.

use std::time::Duration;

use tracing::warn;

/// Deployment-wide session behavior.
///
/// One instance configures every session actor in the process — the
/// close policy is deliberately not per-session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long a session lives after creation. Expiration clears the
    /// record through the scheduled path.
    ///
    /// Default: 30 days.
    pub session_lifetime: Duration,

    /// What an explicit close does with the record.
    ///
    /// - `true` (default): clear the persisted record immediately —
    ///   closing is equivalent to expiring now.
    /// - `false`: keep the record queryable as Closed until the
    ///   originally scheduled expiration clears it.
    pub clear_state_on_close: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_lifetime: Duration::from_secs(30 * 24 * 60 * 60),
            clear_state_on_close: true,
        }
    }
}

impl SessionOptions {
    /// Fixes out-of-range values so the options are safe to use.
    ///
    /// A zero lifetime would expire sessions at creation; it is
    /// replaced with the default and logged.
    pub fn validated(mut self) -> Self {
        if self.session_lifetime.is_zero() {
            warn!("session_lifetime of zero is not usable — using default");
            self.session_lifetime = Self::default().session_lifetime;
        }
        self
    }
}
