use std::sync::Arc;

use chrono::{Duration, Utc};
use quill_auth::memory::{MemoryAuthRepository, MemoryUserRepository};
use quill_auth::{
    AuthError, AuthRepository, NewUser, SessionManager, SessionPolicy, SessionState, TokenSigner,
    User, MAX_SESSION_TTL_SECONDS,
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const SECRET: &[u8] = b"integration_test_secret_that_is_long_enough";
const ISSUER: &str = "quill-test";
const WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0)";
const FIREFOX_LINUX: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

struct TestContext {
    manager: SessionManager,
    sessions: MemoryAuthRepository,
}

impl TestContext {
    fn new() -> Self {
        Self::with_ttl(Duration::hours(1))
    }

    fn with_ttl(ttl: Duration) -> Self {
        let sessions = MemoryAuthRepository::new();
        let users = MemoryUserRepository::new(sessions.clone());
        let signer = TokenSigner::new(SECRET, ISSUER);
        let manager = SessionManager::new(
            Arc::new(users),
            Arc::new(sessions.clone()),
            Arc::new(signer),
            SessionPolicy { ttl },
        );
        Self { manager, sessions }
    }

    async fn sign_up_alice(&self) -> TestResult<(User, String)> {
        let (user, issued) = self
            .manager
            .sign_up(
                NewUser {
                    email: "alice@example.com".into(),
                    name: "alice".into(),
                    password: "Str0ngP@ss".into(),
                    description: None,
                },
                Some(WINDOWS),
            )
            .await?;
        Ok((user, issued.token))
    }
}

#[tokio::test]
async fn authenticate_authorize_resolve_returns_registered_user() -> TestResult {
    let ctx = TestContext::new();
    let (registered, _) = ctx.sign_up_alice().await?;

    let user = ctx
        .manager
        .authenticate("alice@example.com", "Str0ngP@ss")
        .await?;
    assert_eq!(user.id, registered.id);

    let issued = ctx.manager.authorize(&user, "linux-firefox").await?;
    let resolved = ctx.manager.resolve_token(&issued.token).await?;

    assert_eq!(resolved.id, registered.id);
    assert_eq!(resolved.email, "alice@example.com");
    assert_eq!(resolved.name, "alice");
    Ok(())
}

#[tokio::test]
async fn sign_up_binds_session_to_resolved_device_label() -> TestResult {
    let ctx = TestContext::new();
    let (user, token) = ctx.sign_up_alice().await?;

    let (_, session) = ctx.manager.resolve_session(&token).await?;
    assert_eq!(session.device_label, "windows-unknown");
    assert_eq!(session.user_id, user.id);
    Ok(())
}

#[tokio::test]
async fn revoked_session_is_rejected_before_token_expiry() -> TestResult {
    let ctx = TestContext::new();
    let (user, token) = ctx.sign_up_alice().await?;

    let (resolved, session) = ctx.manager.resolve_session(&token).await?;
    assert_eq!(resolved.id, user.id);

    ctx.manager.revoke(&session.id).await?;

    let err = ctx.manager.resolve_token(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionRevoked), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn reauthorizing_same_device_leaves_one_active_session() -> TestResult {
    let ctx = TestContext::new();
    let (user, first_token) = ctx.sign_up_alice().await?;

    let second = ctx.manager.authorize(&user, "windows-unknown").await?;

    let for_device: Vec<_> = ctx
        .manager
        .list_sessions(&user.id)
        .await?
        .into_iter()
        .filter(|summary| summary.device_label == "windows-unknown")
        .collect();
    assert_eq!(for_device.len(), 2, "superseded row is kept for audit");

    let active: Vec<_> = for_device
        .iter()
        .filter(|summary| summary.state == SessionState::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.session.id);

    assert!(matches!(
        ctx.manager.resolve_token(&first_token).await,
        Err(AuthError::SessionRevoked)
    ));
    assert_eq!(ctx.manager.resolve_token(&second.token).await?.id, user.id);
    Ok(())
}

#[tokio::test]
async fn sessions_on_other_devices_are_independent() -> TestResult {
    let ctx = TestContext::new();
    let (_, windows_token) = ctx.sign_up_alice().await?;
    let (_, linux) = ctx
        .manager
        .sign_in("alice@example.com", "Str0ngP@ss", Some(FIREFOX_LINUX))
        .await?;
    assert_eq!(linux.session.device_label, "linux-firefox");

    ctx.manager.sign_out(&linux.session.id).await?;

    assert!(ctx.manager.resolve_token(&windows_token).await.is_ok());
    assert!(matches!(
        ctx.manager.resolve_token(&linux.token).await,
        Err(AuthError::SessionRevoked)
    ));
    Ok(())
}

#[tokio::test]
async fn rotate_credential_invalidates_every_prior_token() -> TestResult {
    let ctx = TestContext::new();
    let (user, windows_token) = ctx.sign_up_alice().await?;
    let (_, linux) = ctx
        .manager
        .sign_in("alice@example.com", "Str0ngP@ss", Some(FIREFOX_LINUX))
        .await?;

    let revoked = ctx
        .manager
        .rotate_credential(&user, "N3w-Secret!", None)
        .await?;
    assert_eq!(revoked, 2);

    for token in [&windows_token, &linux.token] {
        assert!(matches!(
            ctx.manager.resolve_token(token).await,
            Err(AuthError::SessionRevoked)
        ));
    }

    assert!(matches!(
        ctx.manager.authenticate("alice@example.com", "Str0ngP@ss").await,
        Err(AuthError::InvalidCredentials)
    ));
    ctx.manager
        .authenticate("alice@example.com", "N3w-Secret!")
        .await?;
    Ok(())
}

#[tokio::test]
async fn change_password_can_keep_the_initiating_session() -> TestResult {
    let ctx = TestContext::new();
    let (user, windows_token) = ctx.sign_up_alice().await?;
    let (_, linux) = ctx
        .manager
        .sign_in("alice@example.com", "Str0ngP@ss", Some(FIREFOX_LINUX))
        .await?;

    ctx.manager
        .change_password(&user, "N3w-Secret!", Some(&linux.session.id))
        .await?;

    assert!(ctx.manager.resolve_token(&linux.token).await.is_ok());
    assert!(matches!(
        ctx.manager.resolve_token(&windows_token).await,
        Err(AuthError::SessionRevoked)
    ));
    Ok(())
}

#[tokio::test]
async fn rotate_credential_enforces_password_policy() -> TestResult {
    let ctx = TestContext::new();
    let (user, token) = ctx.sign_up_alice().await?;

    let err = ctx
        .manager
        .rotate_credential(&user, "weak", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Credential(_)));
    assert!(ctx.manager.resolve_token(&token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn revoke_is_idempotent() -> TestResult {
    let ctx = TestContext::new();
    let (_, token) = ctx.sign_up_alice().await?;
    let (_, session) = ctx.manager.resolve_session(&token).await?;

    ctx.manager.revoke("no-such-session").await?;
    ctx.manager.revoke(&session.id).await?;
    ctx.manager.revoke(&session.id).await?;
    Ok(())
}

#[tokio::test]
async fn revoke_for_user_ignores_foreign_sessions() -> TestResult {
    let ctx = TestContext::new();
    let (alice, alice_token) = ctx.sign_up_alice().await?;
    let (_, alice_session) = ctx.manager.resolve_session(&alice_token).await?;

    let (bob, _) = ctx
        .manager
        .sign_up(
            NewUser {
                email: "bob@example.com".into(),
                name: "bob".into(),
                password: "B0b-Secret!".into(),
                description: None,
            },
            None,
        )
        .await?;
    assert_ne!(alice.id, bob.id);

    ctx.manager.revoke_for_user(&bob, &alice_session.id).await?;
    assert!(ctx.manager.resolve_token(&alice_token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_identical() -> TestResult {
    let ctx = TestContext::new();
    ctx.sign_up_alice().await?;

    let wrong = ctx
        .manager
        .authenticate("alice@example.com", "wrong")
        .await
        .unwrap_err();
    let missing = ctx
        .manager
        .authenticate("nobody@example.com", "x")
        .await
        .unwrap_err();

    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(missing, AuthError::NotFound));
    assert_eq!(wrong.code(), missing.code());
    assert_eq!(wrong.public_message(), missing.public_message());
    Ok(())
}

#[tokio::test]
async fn email_lookup_is_case_insensitive() -> TestResult {
    let ctx = TestContext::new();
    let (registered, _) = ctx.sign_up_alice().await?;

    let user = ctx
        .manager
        .authenticate("  ALICE@Example.com ", "Str0ngP@ss")
        .await?;
    assert_eq!(user.id, registered.id);
    Ok(())
}

#[tokio::test]
async fn expired_session_row_is_rejected() -> TestResult {
    let ctx = TestContext::with_ttl(Duration::seconds(-5));
    let (_, token) = ctx.sign_up_alice().await?;

    let err = ctx.manager.resolve_token(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected_even_with_live_row() -> TestResult {
    let ctx = TestContext::new();
    let (user, _) = ctx.sign_up_alice().await?;
    let issued = ctx.manager.authorize(&user, "linux-firefox").await?;

    let past = Utc::now() - Duration::minutes(10);
    let stale = TokenSigner::new(SECRET, ISSUER).sign(
        &issued.session.id,
        past - Duration::hours(1),
        past,
    )?;

    let err = ctx.manager.resolve_token(&stale).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");

    let row = ctx
        .sessions
        .get_by_id(&issued.session.id)
        .await?
        .ok_or("missing session row")?;
    assert_eq!(row.state_at(Utc::now()), SessionState::Active);
    assert!(ctx.manager.resolve_token(&issued.token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn oversized_ttl_is_capped_at_one_hundred_years() -> TestResult {
    let policy = SessionPolicy::from_ttl_seconds(u64::MAX);
    assert_eq!(policy.ttl, Duration::seconds(MAX_SESSION_TTL_SECONDS));

    let ctx = TestContext::with_ttl(Duration::seconds(MAX_SESSION_TTL_SECONDS) * 100);
    let (user, _) = ctx.sign_up_alice().await?;
    let issued = ctx.manager.authorize(&user, "linux-firefox").await?;

    let lifetime = issued.session.expires_at - issued.session.issued_at;
    assert_eq!(lifetime, Duration::seconds(MAX_SESSION_TTL_SECONDS));
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_invalid() -> TestResult {
    let ctx = TestContext::new();
    ctx.sign_up_alice().await?;

    assert!(matches!(
        ctx.manager.resolve_token("garbage").await,
        Err(AuthError::TokenInvalid)
    ));
    Ok(())
}

#[tokio::test]
async fn failed_write_returns_no_token_and_stores_nothing() -> TestResult {
    let ctx = TestContext::new();
    let (user, _) = ctx.sign_up_alice().await?;
    let before = ctx.sessions.len().await;

    ctx.sessions.fail_writes(true);
    let err = ctx
        .manager
        .authorize(&user, "linux-firefox")
        .await
        .unwrap_err();
    ctx.sessions.fail_writes(false);

    match err {
        AuthError::Persistence { op, .. } => assert_eq!(op, "session.authorize"),
        other => panic!("expected persistence error, got {other:?}"),
    }
    assert_eq!(ctx.sessions.len().await, before);
    Ok(())
}

#[tokio::test]
async fn concurrent_authorize_never_leaves_two_active_sessions() -> TestResult {
    let ctx = TestContext::new();
    let (user, _) = ctx.sign_up_alice().await?;

    let (first, second) = tokio::join!(
        ctx.manager.authorize(&user, "linux-firefox"),
        ctx.manager.authorize(&user, "linux-firefox"),
    );
    assert!(first.is_ok() || second.is_ok());

    let active = ctx
        .manager
        .list_sessions(&user.id)
        .await?
        .into_iter()
        .filter(|s| s.device_label == "linux-firefox" && s.state == SessionState::Active)
        .count();
    assert_eq!(active, 1);
    Ok(())
}

#[tokio::test]
async fn sign_up_rejects_bad_input() -> TestResult {
    let ctx = TestContext::new();
    ctx.sign_up_alice().await?;

    let duplicate = ctx
        .manager
        .sign_up(
            NewUser {
                email: "Alice@Example.com".into(),
                name: "alice again".into(),
                password: "Str0ngP@ss".into(),
                description: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AuthError::UserExists));

    let weak = ctx
        .manager
        .sign_up(
            NewUser {
                email: "carol@example.com".into(),
                name: "carol".into(),
                password: "password".into(),
                description: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(weak, AuthError::Credential(_)));

    let bad_email = ctx
        .manager
        .sign_up(
            NewUser {
                email: "not-an-email".into(),
                name: "dave".into(),
                password: "Str0ngP@ss".into(),
                description: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(bad_email, AuthError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn anonymous_request_resolves_to_none() -> TestResult {
    let ctx = TestContext::new();
    assert!(ctx.manager.resolve_current_user(None).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn custom_password_policy_is_honoured() -> TestResult {
    let ctx = TestContext::new();
    let manager = ctx
        .manager
        .clone()
        .with_password_policy(Arc::new(|candidate: &str| candidate.len() >= 4));

    let (user, _) = manager
        .sign_up(
            NewUser {
                email: "erin@example.com".into(),
                name: "erin".into(),
                password: "abcd".into(),
                description: None,
            },
            None,
        )
        .await?;
    assert_eq!(user.email, "erin@example.com");
    Ok(())
}
