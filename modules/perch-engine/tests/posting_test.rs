// Posting workflow: idempotency, atomic completion, and untouched records
// on platform failure.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use perch_common::{OpportunityStatus, PerchError, PostReceipt, ResponseStatus};
use perch_engine::posting::PostingWorkflow;
use perch_engine::store::{MemoryStore, Store};
use perch_engine::testing::{fixtures, MockAdapter};

struct Setup {
    store: MemoryStore,
    opportunity_id: Uuid,
    response_id: Uuid,
}

async fn seeded() -> Setup {
    let store = MemoryStore::new();
    let profile = fixtures::profile();
    let account = fixtures::account_for_profile(profile.id);
    let account_id = account.id;
    store.put_profile(profile).await;
    store.put_account(account).await;

    let opportunity = fixtures::opportunity(account_id, "post-1", Utc::now() + Duration::hours(3));
    let opportunity_id = opportunity.id;
    store
        .insert_opportunity_if_absent(opportunity)
        .await
        .unwrap();

    let response = fixtures::draft_response(opportunity_id, account_id, 1);
    let response_id = response.id;
    store.insert_response(response).await.unwrap();

    Setup {
        store,
        opportunity_id,
        response_id,
    }
}

#[tokio::test]
async fn posting_flips_response_and_opportunity_together() {
    let setup = seeded().await;
    let posted_at = Utc::now();
    let adapter = Arc::new(MockAdapter::new().with_receipt(PostReceipt {
        platform_post_id: "platform-123".to_string(),
        platform_post_url: "https://example.net/p/123".to_string(),
        posted_at,
    }));
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), adapter.clone());

    let posted = workflow.post(setup.response_id).await.unwrap();

    assert_eq!(posted.status, ResponseStatus::Posted);
    assert_eq!(posted.platform_post_id.as_deref(), Some("platform-123"));
    assert_eq!(
        posted.platform_post_url.as_deref(),
        Some("https://example.net/p/123")
    );
    assert_eq!(posted.posted_at, Some(posted_at));

    let opportunity = setup
        .store
        .get_opportunity(setup.opportunity_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(opportunity.status, OpportunityStatus::Responded);

    // The adapter was handed the parent post id and the draft text.
    let calls = adapter.recorded_posts();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "post-1");
}

#[tokio::test]
async fn second_post_is_rejected_without_calling_the_adapter() {
    let setup = seeded().await;
    let adapter = Arc::new(MockAdapter::new());
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), adapter.clone());

    workflow.post(setup.response_id).await.unwrap();
    assert_eq!(adapter.post_calls.load(Ordering::SeqCst), 1);

    let err = workflow
        .post(setup.response_id)
        .await
        .expect_err("reposting must fail");
    match err {
        PerchError::InvalidStatus { expected, actual } => {
            assert_eq!(expected, "draft");
            assert_eq!(actual, "posted");
        }
        other => panic!("expected InvalidStatus, got {other}"),
    }

    // Exactly one platform call total.
    assert_eq!(adapter.post_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dismissed_response_never_reaches_the_adapter() {
    let setup = seeded().await;
    setup
        .store
        .update_response_status(setup.response_id, ResponseStatus::Dismissed)
        .await
        .unwrap();

    let adapter = Arc::new(MockAdapter::new());
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), adapter.clone());

    let err = workflow
        .post(setup.response_id)
        .await
        .expect_err("dismissed is terminal");
    assert!(matches!(
        err,
        PerchError::InvalidStatus { actual, .. } if actual == "dismissed"
    ));
    assert_eq!(adapter.post_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn platform_failure_leaves_both_records_untouched() {
    let setup = seeded().await;
    let failing = Arc::new(MockAdapter::new().failing_post(|| {
        PerchError::ContentViolation("flagged as spam".to_string())
    }));
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), failing);

    let err = workflow
        .post(setup.response_id)
        .await
        .expect_err("platform rejection must propagate");
    assert!(matches!(err, PerchError::ContentViolation(_)));

    let response = setup
        .store
        .get_response(setup.response_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status, ResponseStatus::Draft);
    assert!(response.platform_post_id.is_none());
    assert_eq!(
        setup
            .store
            .get_opportunity(setup.opportunity_id)
            .await
            .unwrap()
            .unwrap()
            .status,
        OpportunityStatus::Pending
    );

    // Still a draft, so the user can edit and retry successfully.
    setup
        .store
        .update_response_text(setup.response_id, "toned-down reply")
        .await
        .unwrap();
    let healthy = Arc::new(MockAdapter::new());
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), healthy.clone());
    let posted = workflow.post(setup.response_id).await.unwrap();
    assert_eq!(posted.status, ResponseStatus::Posted);
    assert_eq!(healthy.recorded_posts()[0].1, "toned-down reply");
}

#[tokio::test]
async fn missing_references_fail_with_not_found() {
    let setup = seeded().await;
    let adapter = Arc::new(MockAdapter::new());
    let workflow = PostingWorkflow::new(Arc::new(setup.store.clone()), adapter.clone());

    let err = workflow
        .post(Uuid::new_v4())
        .await
        .expect_err("unknown response");
    assert!(matches!(err, PerchError::NotFound { entity: "response", .. }));

    // A draft pointing at a vanished opportunity fails before the adapter.
    let orphan = fixtures::draft_response(Uuid::new_v4(), Uuid::new_v4(), 1);
    let orphan_id = orphan.id;
    setup.store.insert_response(orphan).await.unwrap();

    let err = workflow.post(orphan_id).await.expect_err("orphan draft");
    assert!(matches!(err, PerchError::NotFound { entity: "opportunity", .. }));
    assert_eq!(adapter.post_calls.load(Ordering::SeqCst), 0);
}
