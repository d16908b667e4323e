use crate::test_utils::{
    failing_env, file_env, memory_env, policy, reissuing_env, wrong_code, TestEnv,
};
use chrono::Duration;
use futures_util::future::join_all;
use passreset_backend_lib::{error::AppError, otp::OtpPolicy, storage::OtpStore};
use passreset_common::ErrorKind;
use std::sync::Arc;

const ALICE: &str = "alice@example.com";

async fn issue_code(env: &TestEnv, identity: &str) -> String {
    env.service.issue(identity).await.unwrap();
    env.delivery.last_code_for(identity).unwrap()
}

fn kind<T: std::fmt::Debug>(result: Result<T, AppError>) -> ErrorKind {
    result.unwrap_err().kind()
}

#[tokio::test]
async fn test_issue_then_verify_succeeds_once() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;

    let verification = env.service.verify(ALICE, &code).await.unwrap();
    assert_eq!(verification.identity, ALICE);

    // single use
    assert_eq!(
        kind(env.service.verify(ALICE, &code).await),
        ErrorKind::AlreadyVerified
    );
}

#[tokio::test]
async fn test_wrong_code_is_mismatch_and_code_stays_usable() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;

    assert_eq!(
        kind(env.service.verify(ALICE, &wrong_code(&code)).await),
        ErrorKind::Mismatch
    );
    assert!(env.service.verify(ALICE, &code).await.is_ok());
}

#[tokio::test]
async fn test_expired_code_rejected_even_when_correct() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;

    env.clock.advance(Duration::minutes(5) + Duration::seconds(1));

    assert_eq!(kind(env.service.verify(ALICE, &code).await), ErrorKind::Expired);
    // the expired record was removed
    assert_eq!(kind(env.service.verify(ALICE, &code).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_expiry_is_checked_before_mismatch() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;

    env.clock.advance(Duration::minutes(10));

    assert_eq!(
        kind(env.service.verify(ALICE, &wrong_code(&code)).await),
        ErrorKind::Expired
    );
}

#[tokio::test]
async fn test_code_valid_at_exact_expiry_instant() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;

    env.clock.advance(Duration::minutes(5));

    assert!(env.service.verify(ALICE, &code).await.is_ok());
}

#[tokio::test]
async fn test_reissue_invalidates_previous_code() {
    let env = memory_env(policy());
    let first = issue_code(&env, ALICE).await;
    let second = issue_code(&env, ALICE).await;

    if first != second {
        assert_eq!(kind(env.service.verify(ALICE, &first).await), ErrorKind::Mismatch);
    }
    assert!(env.service.verify(ALICE, &second).await.is_ok());
}

#[tokio::test]
async fn test_reissue_after_verification_starts_fresh() {
    let env = memory_env(policy());
    let first = issue_code(&env, ALICE).await;
    env.service.verify(ALICE, &first).await.unwrap();

    let second = issue_code(&env, ALICE).await;
    assert!(env.service.verify(ALICE, &second).await.is_ok());
}

#[tokio::test]
async fn test_verify_without_issue_is_not_found() {
    let env = memory_env(policy());
    assert_eq!(
        kind(env.service.verify(ALICE, "123456").await),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_unregistered_identity_is_refused() {
    let env = memory_env(policy());
    assert_eq!(
        kind(env.service.issue("mallory@example.com").await),
        ErrorKind::NotRegistered
    );
    assert_eq!(env.delivery.sent_count(), 0);
}

#[tokio::test]
async fn test_malformed_input_is_invalid_argument() {
    let env = memory_env(policy());
    assert_eq!(kind(env.service.issue("").await), ErrorKind::InvalidArgument);
    assert_eq!(
        kind(env.service.issue("not-an-email").await),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        kind(env.service.verify(ALICE, "12ab56").await),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        kind(env.service.verify(ALICE, "123").await),
        ErrorKind::InvalidArgument
    );
}

#[tokio::test]
async fn test_identity_is_normalized() {
    let env = memory_env(policy());
    env.service.issue("  Alice@Example.COM ").await.unwrap();
    let code = env.delivery.last_code_for(ALICE).unwrap();

    assert!(env.service.verify("ALICE@example.com", &code).await.is_ok());
}

#[tokio::test]
async fn test_identities_are_independent() {
    let env = memory_env(policy());
    let alice = issue_code(&env, ALICE).await;
    let bob = issue_code(&env, "bob@example.com").await;

    assert!(env.service.verify("bob@example.com", &bob).await.is_ok());
    assert!(env.service.verify(ALICE, &alice).await.is_ok());
}

#[tokio::test]
async fn test_attempt_bound_invalidates_record() {
    let env = memory_env(OtpPolicy {
        max_attempts: 3,
        ..policy()
    });
    let code = issue_code(&env, ALICE).await;
    let wrong = wrong_code(&code);

    for _ in 0..3 {
        assert_eq!(kind(env.service.verify(ALICE, &wrong).await), ErrorKind::Mismatch);
    }

    // the correct code no longer helps
    assert_eq!(kind(env.service.verify(ALICE, &code).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_wrong_code_after_verification_is_mismatch() {
    let env = memory_env(OtpPolicy {
        max_attempts: 1,
        ..policy()
    });
    let code = issue_code(&env, ALICE).await;
    env.service.verify(ALICE, &code).await.unwrap();

    assert_eq!(
        kind(env.service.verify(ALICE, &wrong_code(&code)).await),
        ErrorKind::Mismatch
    );
    // not counted against a consumed record
    assert_eq!(
        kind(env.service.verify(ALICE, &code).await),
        ErrorKind::AlreadyVerified
    );
}

#[tokio::test]
async fn test_delivery_failure_keeps_code_valid() {
    let (service, store) = failing_env(policy());

    assert_eq!(kind(service.issue(ALICE).await), ErrorKind::DeliveryFailed);

    let record = store.get(ALICE).await.unwrap().unwrap();
    assert!(service.verify(ALICE, record.code.expose()).await.is_ok());
}

#[tokio::test]
async fn test_resend_cooldown() {
    let env = memory_env(OtpPolicy {
        resend_cooldown: Duration::seconds(60),
        ..policy()
    });
    issue_code(&env, ALICE).await;

    assert_eq!(kind(env.service.issue(ALICE).await), ErrorKind::RateLimited);
    assert_eq!(env.delivery.sent_count(), 1);

    env.clock.advance(Duration::seconds(61));
    let code = issue_code(&env, ALICE).await;
    assert!(env.service.verify(ALICE, &code).await.is_ok());
}

#[tokio::test]
async fn test_cooldown_does_not_block_after_verification() {
    let env = memory_env(OtpPolicy {
        resend_cooldown: Duration::seconds(60),
        ..policy()
    });
    let code = issue_code(&env, ALICE).await;
    env.service.verify(ALICE, &code).await.unwrap();

    assert!(env.service.issue(ALICE).await.is_ok());
}

#[tokio::test]
async fn test_reissue_between_read_and_write_defeats_old_code() {
    let (env, old_code, store) = reissuing_env(policy(), ALICE).await;

    let outcome = env.service.verify(ALICE, &old_code).await;
    let new_code = store.new_code.lock().clone().unwrap();

    if new_code == old_code {
        // the replacement drew the same digits; the fresh record is what got consumed
        assert!(outcome.is_ok());
        return;
    }
    let rejected = kind(outcome);
    assert!(
        rejected == ErrorKind::Mismatch || rejected == ErrorKind::NotFound,
        "old code after a re-issue gave {rejected:?}"
    );

    // the replacement is intact and still usable
    assert!(env.service.verify(ALICE, &new_code).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verifies_succeed_exactly_once() {
    let env = memory_env(policy());
    let code = issue_code(&env, ALICE).await;
    let service = Arc::new(env.service);

    let tasks = (0..16).map(|_| {
        let service = Arc::clone(&service);
        let code = code.clone();
        tokio::spawn(async move { service.verify(ALICE, &code).await })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(|e| e.kind() == ErrorKind::AlreadyVerified));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verifies_on_file_store() {
    let env = file_env(policy());
    let code = issue_code(&env, ALICE).await;
    let service = Arc::new(env.service);

    let tasks = (0..8).map(|_| {
        let service = Arc::clone(&service);
        let code = code.clone();
        tokio::spawn(async move { service.verify(ALICE, &code).await })
    });
    let successes = join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_file_store_lifecycle_survives_restart() {
    let env = file_env(policy());
    let code = issue_code(&env, ALICE).await;

    // a second service over the same directory sees the pending code
    let temp_dir = env.temp_dir.as_ref().unwrap();
    let reopened = passreset_backend_lib::otp::OtpService::new(
        Arc::new(passreset_backend_lib::storage::FlatFileStore::new(temp_dir.path()).unwrap()),
        Arc::new(passreset_backend_lib::directory::StaticDirectory::new([ALICE])),
        env.delivery.clone(),
        Arc::new(env.clock.clone()),
        policy(),
    );

    assert!(reopened.verify(ALICE, &code).await.is_ok());
    assert_eq!(
        kind(env.service.verify(ALICE, &code).await),
        ErrorKind::AlreadyVerified
    );
}

#[tokio::test]
async fn test_purge_expired_removes_dead_records() {
    let env = memory_env(policy());
    issue_code(&env, ALICE).await;
    let bob = issue_code(&env, "bob@example.com").await;
    env.service.verify("bob@example.com", &bob).await.unwrap();

    env.clock.advance(Duration::minutes(6));
    issue_code(&env, "carol@example.com").await;

    assert_eq!(env.service.purge_expired().await.unwrap(), 2);
    assert_eq!(kind(env.service.verify(ALICE, "123456").await), ErrorKind::NotFound);
}
