//! Concurrency tests: invitation usage caps, approval races and duplicate
//! submissions under parallel load.
//!
//! Run with: cargo test --test concurrency_integration

mod common;

use common::{student_json, submission, unique_guardian_email, TestContext};
use domain::models::{AccountRole, InvitationState, RequestState};
use domain::OnboardingError;
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consume_never_exceeds_cap() {
    let ctx = Arc::new(TestContext::new().await);
    let invitation = ctx.course_invitation("CU25-RACE01", 3).await;

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                ctx.service
                    .consume(invitation.id, Uuid::new_v4(), AccountRole::Guardian)
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(failure, &OnboardingError::InvalidState("exhausted".into()));
    }

    let stored = ctx.store.invitation(invitation.id).await.unwrap();
    assert_eq!(stored.uses_so_far, 3);
    assert_eq!(stored.usage_log.len(), 3);
    assert_eq!(stored.state, InvitationState::Consumed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_approvals_on_single_use_invitation() {
    let ctx = Arc::new(TestContext::new().await);
    let invitation = ctx.course_invitation("CU25-RACE02", 1).await;

    // Both requests are accepted while the invitation still has its use.
    let mut request_ids = Vec::new();
    for name in ["Luis", "Eva"] {
        let request = ctx
            .service
            .submit(submission(
                "CU25-RACE02",
                &unique_guardian_email(),
                vec![student_json(name, "Perez", ctx.course.id)],
            ))
            .await
            .unwrap();
        request_ids.push(request.id);
    }

    let handles: Vec<_> = request_ids
        .iter()
        .map(|&request_id| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { ctx.service.approve(request_id, ctx.admin_id).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, OnboardingError::Conflict(_)));

    // Only the winner's accounts exist; the loser is still pending.
    let winner = winners[0];
    let accounts = ctx.store.accounts().await;
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| winner.created_account_ids.contains(&a.id)));

    let loser_id = request_ids
        .iter()
        .copied()
        .find(|id| *id != winner.request_id)
        .unwrap();
    assert_eq!(
        ctx.store.request(loser_id).await.unwrap().state,
        RequestState::Pending
    );

    let stored = ctx.store.invitation(invitation.id).await.unwrap();
    assert_eq!(stored.uses_so_far, 1);
    assert_eq!(stored.state, InvitationState::Consumed);
    assert_eq!(ctx.store.course(ctx.course.id).await.unwrap().student_ids.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_request_approved_concurrently_once() {
    let ctx = Arc::new(TestContext::new().await);
    ctx.course_invitation("CU25-RACE03", 5).await;
    let request = ctx
        .service
        .submit(submission(
            "CU25-RACE03",
            &unique_guardian_email(),
            vec![student_json("Luis", "Perez", ctx.course.id)],
        ))
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let request_id = request.id;
            tokio::spawn(async move { ctx.service.approve(request_id, ctx.admin_id).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, OnboardingError::InvalidState(_))));
    assert_eq!(ctx.store.accounts().await.len(), 2);
    assert_eq!(ctx.mailer.approvals().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_submissions_store_one_request() {
    let ctx = Arc::new(TestContext::new().await);
    ctx.course_invitation("CU25-RACE04", 10).await;
    let email = unique_guardian_email();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let payload = submission(
                "CU25-RACE04",
                &email,
                vec![student_json("Luis", "Perez", ctx.course.id)],
            );
            tokio::spawn(async move { ctx.service.submit(payload).await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, OnboardingError::Conflict(_))));
    assert_eq!(ctx.store.requests().await.len(), 1);
}
