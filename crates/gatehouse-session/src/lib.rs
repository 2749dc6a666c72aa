//! Session actors for Gatehouse.
//!
//! This crate handles the lifecycle of authenticated sessions:
//!
//! 1. **Creation** — a caller-supplied id gets a fresh Active record
//!    with its claims and roles, and an armed expiration schedule
//! 2. **Authorization reads** — the [`is_authorized`](SessionHandle::is_authorized)
//!    decision the interceptor consults on every protected call
//! 3. **Closing** — explicit logout, with a deployment-wide choice
//!    between clearing immediately and letting the record linger as
//!    Closed until its original deadline
//! 4. **Expiration** — timer- or reminder-driven clear, idempotent
//!    under redelivery
//!
//! # How it fits in the stack
//!
//! ```text
//! Interceptor (above)  ← asks "may this call proceed?"
//!     ↕
//! Session layer (this crate)  ← owns the session record and its status
//!     ↕
//! Expiry + runtime (below)  ← schedule, store, reminders
//! ```

mod actor;
mod directory;
mod error;
mod options;

pub use actor::{SESSION_REMINDER_NAME, SESSION_STORE_KIND, SessionHandle};
pub use directory::SessionDirectory;
pub use error::SessionError;
pub use options::SessionOptions;
