//! Integration tests for the token actor lifecycle.
//!
//! Runs on paused tokio time: sleeps auto-advance the clock, so the
//! "wait 70 seconds" properties execute instantly and deterministically.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use gatehouse_model::{CreateTokenModel, EntityRef, TokenKind};
use gatehouse_runtime::{
    MemoryStateStore, ReminderDelivery, ReminderService, StateStore,
};
use gatehouse_token::{
    ExpiryObserver, NoopObserver, TokenDirectory, TokenError,
};
use tokio::sync::{Mutex, mpsc};

// =========================================================================
// Helpers
// =========================================================================

const KIND: TokenKind = TokenKind::EmailVerification;

/// Records every owner notification it receives.
#[derive(Default)]
struct RecordingObserver {
    events: StdMutex<Vec<(EntityRef, TokenKind, String)>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<(EntityRef, TokenKind, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl ExpiryObserver for RecordingObserver {
    async fn token_expired(&self, owner: &EntityRef, kind: TokenKind, value: &str) {
        self.events
            .lock()
            .unwrap()
            .push((owner.clone(), kind, value.to_string()));
    }
}

type Dir<O> = Arc<Mutex<TokenDirectory<MemoryStateStore, O>>>;

/// Wires a directory over a fresh store and reminder service, with the
/// delivery stream routed back into the directory (the facade's job in
/// production).
fn harness<O: ExpiryObserver>(
    observer: O,
) -> (Dir<O>, Arc<MemoryStateStore>, ReminderService) {
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, rx) = ReminderService::start();
    let directory = Arc::new(Mutex::new(TokenDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        Arc::new(observer),
    )));
    route_reminders(Arc::clone(&directory), rx);
    (directory, store, reminders)
}

/// Routes reminder deliveries into the directory, reactivating evicted
/// actors as the runtime contract requires.
fn route_reminders<O: ExpiryObserver>(
    directory: Dir<O>,
    mut rx: mpsc::Receiver<ReminderDelivery>,
) {
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            let Some(kind) = TokenKind::from_store_kind(&delivery.kind) else {
                continue;
            };
            let mut dir = directory.lock().await;
            let _ = dir
                .deliver_reminder(kind, &delivery.key, &delivery.name, delivery.tick)
                .await;
        }
    });
}

fn model(value: &str, lifetime_secs: u64) -> CreateTokenModel {
    CreateTokenModel {
        value: value.to_string(),
        owner: EntityRef::default(),
        lifetime: Duration::from_secs(lifetime_secs),
    }
}

fn owned_model(value: &str, lifetime_secs: u64, owner: EntityRef) -> CreateTokenModel {
    CreateTokenModel {
        owner,
        ..model(value, lifetime_secs)
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// =========================================================================
// Create and read
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_then_verify_succeeds() {
    let (dir, _store, _reminders) = harness(NoopObserver);
    let mut dir = dir.lock().await;

    dir.create(KIND, model("tok-1", 90)).await.expect("create");
    dir.verify(KIND, "tok-1").await.expect("verify");

    let record = dir.get(KIND, "tok-1").await.expect("get");
    assert_eq!(record.value, "tok-1");
    assert_eq!(record.lifetime, Duration::from_secs(90));
    assert!(record.owner.is_unset());
}

#[tokio::test(start_paused = true)]
async fn test_verify_unknown_token_fails() {
    let (dir, _store, _reminders) = harness(NoopObserver);
    let mut dir = dir.lock().await;

    let result = dir.verify(KIND, "never-created").await;
    assert!(matches!(result, Err(TokenError::NotFound)));

    let result = dir.get(KIND, "never-created").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_create_invalid_model_writes_nothing() {
    let (dir, store, reminders) = harness(NoopObserver);
    let mut dir = dir.lock().await;

    let result = dir.create(KIND, model("", 90)).await;
    assert!(matches!(result, Err(TokenError::Validation(_))));

    let result = dir.create(KIND, model("tok-1", 0)).await;
    assert!(matches!(result, Err(TokenError::Validation(_))));

    // No partial state: nothing stored, nothing scheduled.
    assert!(store.is_empty().await);
    assert!(reminders.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_kinds_are_independent_keyspaces() {
    let (dir, _store, _reminders) = harness(NoopObserver);
    let mut dir = dir.lock().await;

    dir.create(TokenKind::EmailVerification, model("same-value", 90))
        .await
        .unwrap();

    let result = dir.verify(TokenKind::PasswordReset, "same-value").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
}

// =========================================================================
// Sub-minute lifetime (poll timer path)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sub_minute_token_expires_around_one_minute() {
    let (dir, store, _reminders) = harness(NoopObserver);

    dir.lock().await.create(KIND, model("short", 30)).await.unwrap();

    // Still present at +10s — the poll granularity rounds lifetime up.
    sleep_secs(10).await;
    dir.lock().await.verify(KIND, "short").await.expect("alive at +10s");

    // Cleared by +70s: the first poll tick fires at +60s.
    sleep_secs(60).await;
    let result = dir.lock().await.verify(KIND, "short").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
    let result = dir.lock().await.get(KIND, "short").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
    assert!(!store.exists(KIND.store_kind(), "short").await.unwrap());
}

// =========================================================================
// Minute-plus lifetime (durable reminder path)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_minute_plus_token_expires_at_lifetime() {
    let (dir, store, _reminders) = harness(NoopObserver);

    dir.lock().await.create(KIND, model("long", 90)).await.unwrap();

    // Still present at +60s — the reminder is due at +90s.
    sleep_secs(60).await;
    dir.lock().await.verify(KIND, "long").await.expect("alive at +60s");

    // Cleared shortly after the reminder fires.
    sleep_secs(40).await;
    let result = dir.lock().await.verify(KIND, "long").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
    assert!(!store.exists(KIND.store_kind(), "long").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_reminder_cancelled_after_expiry() {
    let (dir, _store, reminders) = harness(NoopObserver);

    dir.lock().await.create(KIND, model("long", 90)).await.unwrap();
    assert!(
        reminders
            .is_registered(KIND.store_kind(), "long", KIND.reminder_name())
            .await
    );

    sleep_secs(120).await;

    // The record is gone and nothing is left scheduled.
    assert!(reminders.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_token_survives_directory_eviction_until_reminder() {
    // Drop the whole directory (every actor evicted) and rebuild it over
    // the same store and reminder service: the persisted record and the
    // pending reminder must both survive and finish the lifecycle.
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, rx) = ReminderService::start();

    {
        let mut dir = TokenDirectory::new(
            Arc::clone(&store),
            reminders.clone(),
            Arc::new(NoopObserver),
        );
        dir.create(KIND, model("evicted", 300)).await.unwrap();
    } // directory and its actors dropped here

    let directory = Arc::new(Mutex::new(TokenDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        Arc::new(NoopObserver),
    )));
    route_reminders(Arc::clone(&directory), rx);

    // Reconstructed from persisted state on demand.
    directory
        .lock()
        .await
        .verify(KIND, "evicted")
        .await
        .expect("record survives eviction");

    // The reminder reactivates the actor and clears the record.
    sleep_secs(360).await;
    let result = directory.lock().await.verify(KIND, "evicted").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
}

// =========================================================================
// Idempotence and stale deliveries
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expiration_redelivery_is_noop() {
    let observer = Arc::new(RecordingObserver::default());
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, _rx) = ReminderService::start();
    let mut dir = TokenDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        Arc::clone(&observer),
    );

    let owner = EntityRef::new("user", "u1");
    dir.create(KIND, owned_model("tok-1", 90, owner)).await.unwrap();

    // First delivery clears the record and notifies the owner.
    let tick = gatehouse_runtime::ReminderTick {
        period: Duration::from_secs(90),
        late_by: Duration::ZERO,
    };
    dir.deliver_reminder(KIND, "tok-1", KIND.reminder_name(), tick.clone())
        .await
        .unwrap();
    let result = dir.verify(KIND, "tok-1").await;
    assert!(matches!(result, Err(TokenError::NotFound)));

    // Redelivery after the clear: no error, no second notification.
    dir.deliver_reminder(KIND, "tok-1", KIND.reminder_name(), tick.clone())
        .await
        .unwrap();
    let result = dir.verify(KIND, "tok-1").await;
    assert!(matches!(result, Err(TokenError::NotFound)));

    let events = observer.events();
    assert_eq!(events.len(), 1, "owner notified exactly once");
    assert_eq!(events[0].0, EntityRef::new("user", "u1"));
    assert_eq!(events[0].1, KIND);
    assert_eq!(events[0].2, "tok-1");
}

#[tokio::test(start_paused = true)]
async fn test_foreign_reminder_name_is_ignored() {
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, _rx) = ReminderService::start();
    let mut dir = TokenDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        Arc::new(NoopObserver),
    );

    dir.create(KIND, model("tok-1", 90)).await.unwrap();

    // A reminder for some other purpose must not clear this record.
    let tick = gatehouse_runtime::ReminderTick {
        period: Duration::from_secs(90),
        late_by: Duration::ZERO,
    };
    dir.deliver_reminder(KIND, "tok-1", "some-other-reminder", tick)
        .await
        .unwrap();

    dir.verify(KIND, "tok-1").await.expect("record untouched");
}

// =========================================================================
// Owner notification
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ownerless_expiry_notifies_nobody() {
    let observer = Arc::new(RecordingObserver::default());
    let (dir, _store, _reminders) = {
        let store = Arc::new(MemoryStateStore::new());
        let (reminders, rx) = ReminderService::start();
        let directory = Arc::new(Mutex::new(TokenDirectory::new(
            Arc::clone(&store),
            reminders.clone(),
            Arc::clone(&observer),
        )));
        route_reminders(Arc::clone(&directory), rx);
        (directory, store, reminders)
    };

    dir.lock().await.create(KIND, model("no-owner", 90)).await.unwrap();
    sleep_secs(120).await;

    let result = dir.lock().await.verify(KIND, "no-owner").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
    assert!(observer.events().is_empty(), "unset owner: no notification");
}

#[tokio::test(start_paused = true)]
async fn test_timer_path_also_notifies_owner() {
    let observer = Arc::new(RecordingObserver::default());
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, _rx) = ReminderService::start();
    let directory = Arc::new(Mutex::new(TokenDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        Arc::clone(&observer),
    )));

    let owner = EntityRef::new("user", "u7");
    directory
        .lock()
        .await
        .create(KIND, owned_model("short", 20, owner))
        .await
        .unwrap();

    sleep_secs(70).await;

    let events = observer.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EntityRef::new("user", "u7"));
}

// =========================================================================
// Re-creation replaces the pending lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_recreate_replaces_expiration_mechanism() {
    let (dir, _store, reminders) = harness(NoopObserver);

    // First lifecycle uses a reminder...
    dir.lock().await.create(KIND, model("tok-1", 300)).await.unwrap();
    assert!(
        reminders
            .is_registered(KIND.store_kind(), "tok-1", KIND.reminder_name())
            .await
    );

    // ...re-creating with a short lifetime switches to the poll timer
    // and must cancel the reminder, not leave both live.
    dir.lock().await.create(KIND, model("tok-1", 30)).await.unwrap();
    assert!(
        !reminders
            .is_registered(KIND.store_kind(), "tok-1", KIND.reminder_name())
            .await
    );

    // The fresh lifecycle expires on the timer path.
    sleep_secs(70).await;
    let result = dir.lock().await.verify(KIND, "tok-1").await;
    assert!(matches!(result, Err(TokenError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_directory_prune_drops_dead_handles() {
    let (dir, _store, _reminders) = harness(NoopObserver);

    dir.lock().await.create(KIND, model("short", 10)).await.unwrap();
    sleep_secs(70).await;

    let mut dir = dir.lock().await;
    // Expired actor deactivated; its handle is dead until pruned.
    dir.prune();
    assert!(dir.is_empty());
}
