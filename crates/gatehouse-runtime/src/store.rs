//! Durable per-actor state: the byte store and its typed wrapper.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::RuntimeError;

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// The durable key-value layer behind each actor's state.
///
/// Keys are `(kind, key)` pairs — the entity kind partitions the
/// keyspace so a session and a token with the same string key never
/// collide. Values are opaque bytes; encoding is the wrapper's job.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one store instance is shared across
/// every actor task in the process.
///
/// # Contract
///
/// - `write` must be durably committed when it returns — actors reply to
///   callers only after the write, so a reported success means the state
///   is on disk (or wherever the backend keeps it).
/// - `clear` of an absent key is a no-op, not an error. Expiration
///   handlers rely on this for idempotence under redelivery.
pub trait StateStore: Send + Sync + 'static {
    /// Reads the record bytes for `kind`/`key`, or `None` if absent.
    fn load(
        &self,
        kind: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, RuntimeError>> + Send;

    /// Durably writes the record bytes for `kind`/`key`.
    fn write(
        &self,
        kind: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Removes the record for `kind`/`key`. No-op when absent.
    fn clear(
        &self,
        kind: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Returns `true` if a record exists for `kind`/`key`.
    fn exists(
        &self,
        kind: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RuntimeError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-process [`StateStore`] backed by a hash map.
///
/// The single-node reference backend: state survives actor deactivation
/// (the map outlives every actor task) but not the process. Tests and
/// the demo run against this; production deployments plug in their own
/// store.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    async fn load(
        &self,
        kind: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, RuntimeError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&(kind.to_string(), key.to_string())).cloned())
    }

    async fn write(
        &self,
        kind: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RuntimeError> {
        let mut entries = self.entries.lock().await;
        entries.insert((kind.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn clear(&self, kind: &str, key: &str) -> Result<(), RuntimeError> {
        let mut entries = self.entries.lock().await;
        entries.remove(&(kind.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, kind: &str, key: &str) -> Result<bool, RuntimeError> {
        let entries = self.entries.lock().await;
        Ok(entries.contains_key(&(kind.to_string(), key.to_string())))
    }
}

// ---------------------------------------------------------------------------
// PersistedState
// ---------------------------------------------------------------------------

/// An actor's typed view of its durable record.
///
/// Owns the in-memory copy of the record and the `(kind, key)` address
/// it persists under. The actor mutates the copy and calls
/// [`write`](Self::write) to commit; nothing else in the process touches
/// this slot of the store.
///
/// Records are encoded as JSON so that field additions stay readable —
/// new optional fields decode via their serde defaults on older
/// payloads.
pub struct PersistedState<T, S> {
    store: Arc<S>,
    kind: &'static str,
    key: String,
    record: Option<T>,
}

impl<T, S> PersistedState<T, S>
where
    T: Serialize + DeserializeOwned,
    S: StateStore,
{
    /// Loads the record for `kind`/`key` from the store.
    ///
    /// Called on actor activation. An absent record is a normal outcome
    /// ([`record_exists`](Self::record_exists) returns `false`) — it
    /// means the entity was never created or already expired.
    pub async fn load(
        store: Arc<S>,
        kind: &'static str,
        key: impl Into<String>,
    ) -> Result<Self, RuntimeError> {
        let key = key.into();
        let record = match store.load(kind, &key).await? {
            Some(bytes) => {
                Some(serde_json::from_slice(&bytes).map_err(RuntimeError::Decode)?)
            }
            None => None,
        };
        Ok(Self {
            store,
            kind,
            key,
            record,
        })
    }

    /// Returns `true` if a record is present.
    ///
    /// This is the liveness signal: an absent record reads the same as
    /// an expired one everywhere in the framework.
    pub fn record_exists(&self) -> bool {
        self.record.is_some()
    }

    /// The in-memory record, if present.
    pub fn record(&self) -> Option<&T> {
        self.record.as_ref()
    }

    /// Mutable access to the in-memory record, if present.
    ///
    /// Changes are not durable until [`write`](Self::write) commits them.
    pub fn record_mut(&mut self) -> Option<&mut T> {
        self.record.as_mut()
    }

    /// Replaces the in-memory record. Not durable until written.
    pub fn set(&mut self, record: T) {
        self.record = Some(record);
    }

    /// Commits the in-memory record to the store. No-op when no record
    /// is set.
    pub async fn write(&self) -> Result<(), RuntimeError> {
        let Some(record) = &self.record else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(record).map_err(RuntimeError::Encode)?;
        self.store.write(self.kind, &self.key, bytes).await
    }

    /// Clears the record, both in memory and in the store.
    ///
    /// Safe to call when already cleared — the second clear is a no-op,
    /// which is what expiration redelivery relies on.
    pub async fn clear(&mut self) -> Result<(), RuntimeError> {
        self.record = None;
        self.store.clear(self.kind, &self.key).await
    }

    /// The key this state persists under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

// =========================================================================
// Tests
// =========================================================================
