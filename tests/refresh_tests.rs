//! Integration tests for the single-flight refresh coordinator.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;

use chatflow::auth::{AccessToken, AuthError, RefreshCoordinator, RefreshOutcome, SessionStore};

use common::{CountingRefresher, InMemorySessionStore, Reply};

#[tokio::test]
async fn concurrent_calls_share_one_underlying_refresh() {
    let refresher = Arc::new(CountingRefresher::new(Reply::Token("tok")));
    let coordinator = RefreshCoordinator::new(refresher.clone());

    let outcomes = join_all((0..8).map(|_| coordinator.refresh())).await;

    assert_eq!(refresher.calls(), 1);
    assert!(outcomes.iter().all(|o| *o == outcomes[0]));
    assert_eq!(outcomes[0].access_token(), Some("tok-1"));
    assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn concurrent_calls_from_separate_tasks_share_one_refresh() {
    let refresher = Arc::new(CountingRefresher::new(Reply::Token("tok")));
    let coordinator = Arc::new(RefreshCoordinator::new(refresher.clone()));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        })
        .collect();
    let outcomes: Vec<RefreshOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(refresher.calls(), 1);
    assert!(outcomes.iter().all(|o| o.access_token() == Some("tok-1")));
}

#[tokio::test]
async fn a_call_after_settlement_starts_a_fresh_attempt() {
    let refresher = Arc::new(CountingRefresher::new(Reply::Token("tok")));
    let coordinator = RefreshCoordinator::new(refresher.clone());

    let first = coordinator.refresh().await;
    let second = coordinator.refresh().await;

    assert_eq!(refresher.calls(), 2);
    assert_eq!(first.access_token(), Some("tok-1"));
    assert_eq!(second.access_token(), Some("tok-2"));
}

#[tokio::test]
async fn failure_hook_runs_once_per_failed_attempt() {
    let refresher = Arc::new(CountingRefresher::new(Reply::Fail("revoked")));
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hook_calls);
    let coordinator = RefreshCoordinator::new(refresher.clone()).on_hard_failure(Arc::new(
        move |_: &AuthError| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));

    let outcomes = join_all((0..4).map(|_| coordinator.refresh())).await;

    assert_eq!(refresher.calls(), 1);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    for outcome in &outcomes {
        assert_eq!(
            *outcome,
            RefreshOutcome::Failed {
                error: "Refresh rejected: revoked".into()
            }
        );
    }

    // The coordinator is usable again after a failure.
    coordinator.refresh().await;
    assert_eq!(refresher.calls(), 2);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_token_is_a_failure() {
    let coordinator = RefreshCoordinator::new(Arc::new(CountingRefresher::new(Reply::Blank)));
    let outcome = coordinator.refresh().await;
    assert!(!outcome.is_ok());
    assert_eq!(outcome.error(), Some("Refresh returned no token"));
}

#[tokio::test]
async fn success_is_persisted_and_failure_signs_out() {
    let store = Arc::new(InMemorySessionStore::new());
    store.seed("default", AccessToken::new("stale"));

    let ok = RefreshCoordinator::new(Arc::new(CountingRefresher::new(Reply::Token("fresh"))))
        .with_store(store.clone());
    ok.refresh().await;
    assert_eq!(store.get("default").unwrap().access_token, "fresh-1");

    let failing = RefreshCoordinator::new(Arc::new(CountingRefresher::new(Reply::Fail("x"))))
        .with_store(store.clone())
        .on_hard_failure(RefreshCoordinator::sign_out_hook(store.clone(), "default"));
    failing.refresh().await;
    assert!(store.load("default").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn attempt_settles_after_every_waiter_is_dropped() {
    let refresher = Arc::new(CountingRefresher::new(Reply::Fail("revoked")));
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hook_calls);
    let coordinator = RefreshCoordinator::new(refresher.clone()).on_hard_failure(Arc::new(
        move |_: &AuthError| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));

    let abandoned = tokio::time::timeout(Duration::from_millis(5), coordinator.refresh()).await;
    assert!(abandoned.is_err());
    assert!(coordinator.is_refreshing());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!coordinator.is_refreshing());
    assert_eq!(refresher.calls(), 1);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

    coordinator.refresh().await;
    assert_eq!(refresher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_waiter_still_persists_the_token() {
    let store = Arc::new(InMemorySessionStore::new());
    let coordinator = RefreshCoordinator::new(Arc::new(CountingRefresher::new(Reply::Token("t"))))
        .with_store(store.clone());

    drop(tokio::time::timeout(Duration::from_millis(5), coordinator.refresh()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!coordinator.is_refreshing());
    assert_eq!(store.get("default").unwrap().access_token, "t-1");
}
