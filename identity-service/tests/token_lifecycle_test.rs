//! Token lifecycle: issuance, storage, verification, revocation, purge.

mod common;

use chrono::{Duration, Utc};
use common::{seed_user, test_state};
use identity_service::{
    models::{TokenKind, TokenRecord},
    services::ServiceError,
    store::AuthStore,
};

#[tokio::test]
async fn test_stored_kinds_roundtrip_through_the_store() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    for kind in [TokenKind::Refresh, TokenKind::Verify, TokenKind::Reset] {
        let token = state
            .tokens
            .issue_and_store(kind, user.id, None)
            .await
            .expect("issue failed");

        let claims = state
            .tokens
            .verify_stored(kind, &token)
            .await
            .expect("verify failed");
        assert_eq!(claims.subject().unwrap(), user.id);
        assert_eq!(store.token_count(user.id, kind).await, 1);
    }
}

#[tokio::test]
async fn test_stateless_kinds_never_touch_the_store() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    for kind in [TokenKind::Access, TokenKind::TempAccess] {
        let token = state
            .tokens
            .issue_and_store(kind, user.id, None)
            .await
            .expect("issue failed");

        let claims = state.tokens.verify_stateless(kind, &token).expect("verify");
        assert_eq!(claims.subject().unwrap(), user.id);
        assert_eq!(store.token_count(user.id, kind).await, 0);
    }
}

#[tokio::test]
async fn test_reissue_replaces_the_previous_record() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let first = state
        .tokens
        .issue_and_store(TokenKind::Refresh, user.id, None)
        .await
        .unwrap();
    // Issued-at has second granularity; make sure the second token differs.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = state
        .tokens
        .issue_and_store(TokenKind::Refresh, user.id, None)
        .await
        .unwrap();
    assert_ne!(first, second);

    // Exactly one record; the latest wins, the former is rejected.
    assert_eq!(store.token_count(user.id, TokenKind::Refresh).await, 1);
    assert!(state
        .tokens
        .verify_stored(TokenKind::Refresh, &second)
        .await
        .is_ok());
    let err = state
        .tokens
        .verify_stored(TokenKind::Refresh, &first)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
}

#[tokio::test]
async fn test_cross_kind_verification_always_fails() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let verify_token = state
        .tokens
        .issue_and_store(TokenKind::Verify, user.id, None)
        .await
        .unwrap();

    // No ACCESS store record can exist for it, and the signature check uses
    // a different secret; both paths reject it.
    let err = state
        .tokens
        .verify_stored(TokenKind::Access, &verify_token)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));

    let err = state
        .tokens
        .verify_stateless(TokenKind::Access, &verify_token)
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));

    let access_token = state
        .tokens
        .issue_and_store(TokenKind::Access, user.id, None)
        .await
        .unwrap();
    let err = state
        .tokens
        .verify_stored(TokenKind::Verify, &access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
}

#[tokio::test]
async fn test_revocation_only_affects_the_exact_token() {
    let (state, store, _) = test_state();
    let alice = seed_user(&store, "alice@x.com", "alice", "Sup3rSecret!", true).await;
    let bob = seed_user(&store, "bob@x.com", "bob", "Sup3rSecret!", true).await;

    let alice_token = state
        .tokens
        .issue_and_store(TokenKind::Refresh, alice.id, None)
        .await
        .unwrap();
    let bob_token = state
        .tokens
        .issue_and_store(TokenKind::Refresh, bob.id, None)
        .await
        .unwrap();

    state.tokens.revoke_by_value(&alice_token).await.unwrap();

    let err = state
        .tokens
        .verify_stored(TokenKind::Refresh, &alice_token)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
    assert!(state
        .tokens
        .verify_stored(TokenKind::Refresh, &bob_token)
        .await
        .is_ok());

    // Revoking again (or revoking garbage) is not an error.
    state.tokens.revoke_by_value(&alice_token).await.unwrap();
    state.tokens.revoke_by_value("no-such-token").await.unwrap();
}

#[tokio::test]
async fn test_rotate_refresh_issues_access_only() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let refresh_token = state
        .tokens
        .issue_and_store(TokenKind::Refresh, user.id, None)
        .await
        .unwrap();

    let access_token = state.tokens.rotate_refresh(&refresh_token).await.unwrap();
    let claims = state
        .tokens
        .verify_stateless(TokenKind::Access, &access_token)
        .unwrap();
    assert_eq!(claims.subject().unwrap(), user.id);

    // The refresh token itself is not rotated and keeps working.
    assert!(state.tokens.rotate_refresh(&refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_rotate_refresh_rejects_revoked_tokens() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let refresh_token = state
        .tokens
        .issue_and_store(TokenKind::Refresh, user.id, None)
        .await
        .unwrap();
    state.tokens.delete_by_value(&refresh_token).await.unwrap();

    let err = state.tokens.rotate_refresh(&refresh_token).await.unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
}

#[tokio::test]
async fn test_subject_mismatch_is_rejected() {
    let (state, store, _) = test_state();
    let alice = seed_user(&store, "alice@x.com", "alice", "Sup3rSecret!", true).await;
    let bob = seed_user(&store, "bob@x.com", "bob", "Sup3rSecret!", true).await;

    // A record pointing at Alice but holding a token issued for Bob must
    // not verify, even though hash and signature both check out alone.
    let bob_token = state.tokens.codec().issue(TokenKind::Refresh, bob.id).unwrap();
    store
        .upsert_token(
            alice.id,
            TokenKind::Refresh,
            &TokenRecord::hash_value(&bob_token),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();

    let err = state
        .tokens
        .verify_stored(TokenKind::Refresh, &bob_token)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
}

#[tokio::test]
async fn test_purge_drops_expired_records() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    state
        .tokens
        .issue_and_store(TokenKind::Refresh, user.id, None)
        .await
        .unwrap();
    store
        .upsert_token(
            user.id,
            TokenKind::Verify,
            "stale-hash",
            Utc::now() - Duration::minutes(5),
        )
        .await
        .unwrap();

    assert_eq!(state.tokens.purge_expired().await.unwrap(), 1);
    assert_eq!(store.token_count(user.id, TokenKind::Refresh).await, 1);
    assert_eq!(store.token_count(user.id, TokenKind::Verify).await, 0);
}
