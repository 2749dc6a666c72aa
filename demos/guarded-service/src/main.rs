//! A small service guarded by Gatehouse.
//!
//! Models an admin API: a service-level "admin" requirement, a few
//! operations with their own annotations, and three callers — an
//! admin session, a moderator session, and an anonymous client.
//!
//! Run with `RUST_LOG=gatehouse=debug` to watch the actors work.

use std::time::Duration;

use gatehouse::prelude::*;
use tracing_subscriber::EnvFilter;

/// The operations of our imaginary admin service, with their declared
/// annotations. The service scope itself requires the "admin" role.
fn operations() -> Vec<(&'static str, AccessPolicy)> {
    let service = AccessPolicy::require_role("admin");

    vec![
        // No annotation of its own: inherits the service requirement.
        ("listUsers", AccessPolicy::compose([&service])),
        // Public endpoint: anonymous override on the operation.
        (
            "serviceInfo",
            AccessPolicy::compose([&service, &AccessPolicy::allow_anonymous()]),
        ),
        // Adds "moderator": effective requirement is any-of
        // {admin, moderator}.
        (
            "reviewReports",
            AccessPolicy::compose([
                &service,
                &AccessPolicy::require_role("moderator"),
            ]),
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<(), GatehouseError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let gh = Gatehouse::builder()
        .session_options(SessionOptions {
            session_lifetime: Duration::from_secs(3600),
            clear_state_on_close: true,
        })
        .build(MemoryStateStore::new());

    // Two authenticated callers with different roles.
    let mut admin = CreateSessionModel::default();
    admin.email = Some("admin@example.com".into());
    admin.roles.push("admin".into());
    gh.create_session("admin-session", admin).await?;

    let mut moderator = CreateSessionModel::default();
    moderator.email = Some("mod@example.com".into());
    moderator.roles.push("moderator".into());
    gh.create_session("mod-session", moderator).await?;

    let callers = [
        ("admin", CallContext::with_session_id("admin-session")),
        ("moderator", CallContext::with_session_id("mod-session")),
        ("anonymous", CallContext::new()),
    ];

    for (operation, policy) in operations() {
        for (who, ctx) in &callers {
            let outcome = gh
                .gate()
                .invoke(ctx, &policy, || async { "ok" })
                .await;
            match outcome {
                Ok(_) => println!("{who:>10} → {operation:<14} admitted"),
                Err(e) => println!("{who:>10} → {operation:<14} rejected: {e}"),
            }
        }
    }

    // Closing a session revokes its access immediately.
    gh.close_session("mod-session").await?;
    let after_close = gh
        .gate()
        .check(
            &CallContext::with_session_id("mod-session"),
            &AccessPolicy::authenticated(),
        )
        .await;
    println!("moderator after close: {:?}", after_close.err());

    // A verification token for the admin's email.
    let token = generate_token_value();
    gh.create_token(
        TokenKind::EmailVerification,
        CreateTokenModel {
            value: token.clone(),
            owner: EntityRef::new("user", "admin"),
            lifetime: Duration::from_secs(120),
        },
    )
    .await?;
    gh.verify_token(TokenKind::EmailVerification, &token).await?;
    println!("email verification token is live for ~2 minutes");

    Ok(())
}
