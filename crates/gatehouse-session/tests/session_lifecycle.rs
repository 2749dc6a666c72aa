//! Integration tests for the session actor lifecycle.
//!
//! Timing runs on paused tokio time. Note that record timestamps come
//! from the wall clock (they are persisted data, not scheduling), so
//! tests assert ordering on them, never durations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_model::{
    ClaimValue, CreateSessionModel, SessionStatus,
};
use gatehouse_runtime::{
    MemoryStateStore, ReminderDelivery, ReminderService, StateStore,
};
use gatehouse_session::{
    SESSION_STORE_KIND, SessionDirectory, SessionError, SessionOptions,
};
use tokio::sync::{Mutex, mpsc};

// =========================================================================
// Helpers
// =========================================================================

type Dir = Arc<Mutex<SessionDirectory<MemoryStateStore>>>;

/// Wires a directory over a fresh store and reminder service, with
/// deliveries routed back into it.
fn harness(options: SessionOptions) -> (Dir, Arc<MemoryStateStore>, ReminderService) {
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, rx) = ReminderService::start();
    let directory = Arc::new(Mutex::new(SessionDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        options,
    )));
    route_reminders(Arc::clone(&directory), rx);
    (directory, store, reminders)
}

fn route_reminders(directory: Dir, mut rx: mpsc::Receiver<ReminderDelivery>) {
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            if delivery.kind != SESSION_STORE_KIND {
                continue;
            }
            let mut dir = directory.lock().await;
            let _ = dir
                .deliver_reminder(&delivery.key, &delivery.name, delivery.tick)
                .await;
        }
    });
}

fn options(lifetime_secs: u64, clear_on_close: bool) -> SessionOptions {
    SessionOptions {
        session_lifetime: Duration::from_secs(lifetime_secs),
        clear_state_on_close: clear_on_close,
    }
}

fn model(roles: &[&str]) -> CreateSessionModel {
    CreateSessionModel {
        email: Some("user@example.com".into()),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        claims: BTreeMap::from([(
            "name".to_string(),
            ClaimValue::plain("Test User"),
        )]),
        ..CreateSessionModel::default()
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// =========================================================================
// Create and read
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_returns_active_record() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    let record = dir.create("s1", model(&["admin"])).await.expect("create");

    assert_eq!(record.id, "s1");
    assert_eq!(record.status, SessionStatus::Active);
    assert_eq!(record.roles, vec!["admin".to_string()]);
    assert_eq!(record.email.as_deref(), Some("user@example.com"));
    assert!(record.closed.is_none());
    assert_eq!(record.claims["name"].value, "Test User");

    let fetched = dir.get("s1").await.expect("get");
    assert_eq!(fetched, record);
}

#[tokio::test(start_paused = true)]
async fn test_create_invalid_model_writes_nothing() {
    let (dir, store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    let result = dir.create("s1", model(&["admin", ""])).await;
    assert!(matches!(result, Err(SessionError::Validation(_))));
    assert!(store.is_empty().await);

    let result = dir.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_get_unknown_session_fails() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let result = dir.lock().await.get("missing").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

// =========================================================================
// Close policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_close_with_clear_on_close_removes_record_immediately() {
    let (dir, store, reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    dir.create("s1", model(&["admin"])).await.unwrap();
    dir.close("s1").await.expect("close");

    let result = dir.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
    assert!(!store.exists(SESSION_STORE_KIND, "s1").await.unwrap());
    // Closing cleared the lifecycle: nothing left scheduled.
    assert!(reminders.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_close_without_clear_keeps_closed_record_until_deadline() {
    let (dir, _store, _reminders) = harness(options(120, false));

    dir.lock().await.create("s1", model(&["admin"])).await.unwrap();
    dir.lock().await.close("s1").await.expect("close");

    // Immediately after close the record is queryable as Closed.
    let record = dir.lock().await.get("s1").await.expect("still queryable");
    assert_eq!(record.status, SessionStatus::Closed);
    assert!(record.closed.is_some());

    // Once the original deadline passes, the scheduled expiration
    // clears it.
    sleep_secs(150).await;
    let result = dir.lock().await.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_close_unknown_session_fails() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let result = dir.lock().await.close("missing").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

// =========================================================================
// Authorization decision
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_authorize_anonymous_always_succeeds() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    // Even with no session record at all.
    let ok = dir.is_authorized("missing", vec![], true).await.unwrap();
    assert!(ok);
}

#[tokio::test(start_paused = true)]
async fn test_authorize_no_record_is_denied() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let ok = dir
        .lock()
        .await
        .is_authorized("missing", vec![], false)
        .await
        .unwrap();
    assert!(!ok);
}

#[tokio::test(start_paused = true)]
async fn test_authorize_empty_roles_needs_only_live_session() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    dir.create("s1", model(&[])).await.unwrap();
    let ok = dir.is_authorized("s1", vec![], false).await.unwrap();
    assert!(ok);
}

#[tokio::test(start_paused = true)]
async fn test_authorize_any_of_role_semantics() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    dir.create("s1", model(&["admin"])).await.unwrap();

    // "moderator" required, session only has "admin": denied.
    let ok = dir
        .is_authorized("s1", vec!["moderator".into()], false)
        .await
        .unwrap();
    assert!(!ok);

    // Any-of: requiring either of two roles admits a session holding
    // just one of them.
    let ok = dir
        .is_authorized("s1", vec!["moderator".into(), "admin".into()], false)
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test(start_paused = true)]
async fn test_authorize_closed_session_is_denied() {
    // Close policy that keeps the record: the session is still
    // queryable, but no longer Active — it must not authorize anything.
    let (dir, _store, _reminders) = harness(options(3600, false));
    let mut dir = dir.lock().await;

    dir.create("s1", model(&["admin"])).await.unwrap();
    dir.close("s1").await.unwrap();

    let ok = dir
        .is_authorized("s1", vec!["admin".into()], false)
        .await
        .unwrap();
    assert!(!ok);
}

// =========================================================================
// Touch
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_touch_advances_last_access() {
    let (dir, _store, _reminders) = harness(options(3600, true));
    let mut dir = dir.lock().await;

    let created = dir.create("s1", model(&[])).await.unwrap();

    dir.session("s1").touch().await;
    let record = dir.get("s1").await.unwrap();
    assert!(record.last_access >= created.last_access);
    assert_eq!(record.created, created.created, "created never moves");
}

// =========================================================================
// Expiration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sub_minute_session_expires_on_poll_tick() {
    let (dir, _store, _reminders) = harness(options(30, true));

    dir.lock().await.create("s1", model(&[])).await.unwrap();

    sleep_secs(10).await;
    dir.lock().await.get("s1").await.expect("alive at +10s");

    sleep_secs(60).await;
    let result = dir.lock().await.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_minute_plus_session_expires_via_reminder() {
    let (dir, _store, _reminders) = harness(options(90, true));

    dir.lock().await.create("s1", model(&[])).await.unwrap();

    sleep_secs(60).await;
    dir.lock().await.get("s1").await.expect("alive at +60s");

    sleep_secs(40).await;
    let result = dir.lock().await.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));

    // And the expired session no longer authorizes anything.
    let ok = dir
        .lock()
        .await
        .is_authorized("s1", vec![], false)
        .await
        .unwrap();
    assert!(!ok);
}

#[tokio::test(start_paused = true)]
async fn test_session_survives_eviction_until_reminder() {
    let store = Arc::new(MemoryStateStore::new());
    let (reminders, rx) = ReminderService::start();

    {
        let mut dir = SessionDirectory::new(
            Arc::clone(&store),
            reminders.clone(),
            options(300, false),
        );
        dir.create("s1", model(&["admin"])).await.unwrap();
    } // every actor evicted

    let directory = Arc::new(Mutex::new(SessionDirectory::new(
        Arc::clone(&store),
        reminders.clone(),
        options(300, false),
    )));
    route_reminders(Arc::clone(&directory), rx);

    // Reconstructed from persisted state, still authorizing.
    let ok = directory
        .lock()
        .await
        .is_authorized("s1", vec!["admin".into()], false)
        .await
        .unwrap();
    assert!(ok);

    // The durable reminder finishes the lifecycle regardless of the
    // eviction.
    sleep_secs(360).await;
    let result = directory.lock().await.get("s1").await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

// =========================================================================
// Re-creation — fresh lifecycle on the same id
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_recreate_resets_terminal_state() {
    let (dir, _store, reminders) = harness(options(3600, false));
    let mut dir = dir.lock().await;

    dir.create("s1", model(&["admin"])).await.unwrap();
    dir.close("s1").await.unwrap();
    let closed = dir.get("s1").await.unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);

    // A new create on the same id is a fresh lifecycle, not a resume.
    let fresh = dir.create("s1", model(&["moderator"])).await.unwrap();
    assert_eq!(fresh.status, SessionStatus::Active);
    assert!(fresh.closed.is_none());
    assert_eq!(fresh.roles, vec!["moderator".to_string()]);

    // Exactly one schedule for the id — replaced, not stacked.
    assert_eq!(reminders.len().await, 1);

    let ok = dir
        .is_authorized("s1", vec!["moderator".into()], false)
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test(start_paused = true)]
async fn test_recreate_after_expiry_starts_new_lifecycle() {
    let (dir, _store, _reminders) = harness(options(90, true));

    dir.lock().await.create("s1", model(&["admin"])).await.unwrap();
    sleep_secs(120).await;
    assert!(matches!(
        dir.lock().await.get("s1").await,
        Err(SessionError::NotFound)
    ));

    let fresh = dir.lock().await.create("s1", model(&["admin"])).await.unwrap();
    assert_eq!(fresh.status, SessionStatus::Active);
    dir.lock().await.get("s1").await.expect("fresh lifecycle lives");
}
