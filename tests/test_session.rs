//! Integration tests for the async session: supersession and live thresholds.

mod common;

use common::*;
use std::time::Duration;

fn session_with(guard: std::sync::Arc<CountingScorer>, disease: std::sync::Arc<CountingScorer>) -> CascadeSession {
    CascadeSession::new(harness_with(CascadeConfig::default(), guard, disease).cascade)
}

#[tokio::test]
async fn test_classify_returns_decision() -> anyhow::Result<()> {
    let session = session_with(
        CountingScorer::scores(&[0.1, 0.2, 0.7]),
        CountingScorer::scores(&[0.9, 0.1]),
    );

    let decision = session.classify(leaf_image()).await?;

    assert!(decision.is_some_and(|d| d.is_classified()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_newer_request_supersedes_running_one() -> anyhow::Result<()> {
    let guard = CountingScorer::slow(&[0.1, 0.2, 0.7], Duration::from_millis(200));
    let session = session_with(guard.clone(), CountingScorer::scores(&[0.9, 0.1]));

    let first_session = session.clone();
    let first = tokio::spawn(async move { first_session.classify(leaf_image()).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = session.classify(leaf_image()).await?;
    let first = first.await??;

    assert!(first.is_none(), "stale result must be discarded");
    assert!(second.is_some());
    // The stale inference still ran to completion
    assert_eq!(guard.calls(), 2);
    assert_eq!(session.cascade().ledger().live(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_discards_in_flight_result() -> anyhow::Result<()> {
    let session = session_with(
        CountingScorer::slow(&[0.1, 0.2, 0.7], Duration::from_millis(150)),
        CountingScorer::scores(&[0.9, 0.1]),
    );

    let running = session.clone();
    let handle = tokio::spawn(async move { running.classify(leaf_image()).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    session.cancel();

    assert!(handle.await??.is_none());
    Ok(())
}

#[tokio::test]
async fn test_threshold_handle_applies_to_next_request() -> anyhow::Result<()> {
    let session = session_with(
        CountingScorer::scores(&[0.1, 0.2, 0.7]),
        CountingScorer::scores(&[0.9, 0.1]),
    );

    session.threshold().set(0.8)?;
    let decision = session.classify(leaf_image()).await?;
    assert!(matches!(decision, Some(Decision::RejectedByGuard { .. })));

    session.threshold().set(0.6)?;
    let decision = session.classify(leaf_image()).await?;
    assert!(decision.is_some_and(|d| d.is_classified()));
    Ok(())
}

#[tokio::test]
async fn test_failures_surface_as_errors() {
    let session = CascadeSession::new(Cascade::new(
        CascadeConfig::default(),
        ModelSlot::empty(ModelRole::Guard),
        ModelSlot::empty(ModelRole::Disease),
    ));

    let failure = session.classify(leaf_image()).await.unwrap_err();
    assert_eq!(failure.error, CascadeError::ModelUnavailable(ModelRole::Guard));
}
