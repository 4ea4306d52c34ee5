// Opportunity lifecycle: the query-time expiry guard and the sweep agree
// with each other, and explicit status transitions respect the state
// machine.

use std::sync::Arc;

use chrono::{Duration, Utc};

use perch_common::{OpportunityStatus, PerchError};
use perch_engine::expiration::ExpirationSweeper;
use perch_engine::service::OpportunityService;
use perch_engine::store::{MemoryStore, OpportunityFilter, Store};
use perch_engine::testing::fixtures;

#[tokio::test]
async fn pending_reads_and_sweep_agree_on_expiry() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let account_id = uuid::Uuid::new_v4();

    // The worked example: total 76, pending, three hours of TTL left.
    let live = fixtures::opportunity(account_id, "post-live", now + Duration::hours(3));
    assert_eq!(live.scoring.total, 76.0);

    // Same shape, but lapsed one second ago and not yet swept.
    let lapsed = fixtures::opportunity(account_id, "post-lapsed", now - Duration::seconds(1));
    let lapsed_id = lapsed.id;

    store.insert_opportunity_if_absent(live).await.unwrap();
    store.insert_opportunity_if_absent(lapsed).await.unwrap();

    let service = OpportunityService::new(Arc::new(store.clone()));
    let pending_filter = OpportunityFilter {
        status: Some(OpportunityStatus::Pending),
        ..Default::default()
    };

    // Before any sweep the lapsed row is already invisible to pending reads.
    let pending = service.list(account_id, &pending_filter).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].post_id, "post-live");

    // The sweep then makes the same judgement durable.
    let sweeper = ExpirationSweeper::new(Arc::new(store.clone()));
    assert_eq!(sweeper.sweep().await.unwrap(), 1);
    assert_eq!(
        store.get_opportunity(lapsed_id).await.unwrap().unwrap().status,
        OpportunityStatus::Expired
    );

    let pending = service.list(account_id, &pending_filter).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn filters_narrow_by_type_and_score() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let account_id = uuid::Uuid::new_v4();

    let mut search_hit = fixtures::opportunity(account_id, "post-a", now + Duration::hours(2));
    search_hit.discovery_type = perch_common::DiscoveryType::Search;
    search_hit.scoring.total = 42.0;
    let replies_hit = fixtures::opportunity(account_id, "post-b", now + Duration::hours(2));

    store.insert_opportunity_if_absent(search_hit).await.unwrap();
    store.insert_opportunity_if_absent(replies_hit).await.unwrap();

    let service = OpportunityService::new(Arc::new(store));

    let only_search = service
        .list(
            account_id,
            &OpportunityFilter {
                discovery_type: Some(perch_common::DiscoveryType::Search),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(only_search.len(), 1);
    assert_eq!(only_search[0].post_id, "post-a");

    let high_score = service
        .list(
            account_id,
            &OpportunityFilter {
                min_total: Some(50.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(high_score.len(), 1);
    assert_eq!(high_score[0].post_id, "post-b");
}

#[tokio::test]
async fn dismissing_a_live_pending_opportunity_works_once() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let account_id = uuid::Uuid::new_v4();
    let opportunity = fixtures::opportunity(account_id, "post-1", now + Duration::hours(2));
    let opportunity_id = opportunity.id;
    store.insert_opportunity_if_absent(opportunity).await.unwrap();

    let service = OpportunityService::new(Arc::new(store));

    let dismissed = service
        .update_status(opportunity_id, OpportunityStatus::Dismissed)
        .await
        .unwrap();
    assert_eq!(dismissed.status, OpportunityStatus::Dismissed);

    // Dismissed is not pending anymore; a second transition is rejected.
    let err = service
        .update_status(opportunity_id, OpportunityStatus::Responded)
        .await
        .expect_err("only pending opportunities transition");
    assert!(matches!(
        err,
        PerchError::InvalidStatus { actual, .. } if actual == "dismissed"
    ));
}

#[tokio::test]
async fn lapsed_pending_opportunity_reads_as_expired_for_updates() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let account_id = uuid::Uuid::new_v4();
    let opportunity = fixtures::opportunity(account_id, "post-1", now - Duration::seconds(5));
    let opportunity_id = opportunity.id;
    store.insert_opportunity_if_absent(opportunity).await.unwrap();

    let service = OpportunityService::new(Arc::new(store));

    // No sweep has run, but the transition is still refused as expired.
    let err = service
        .update_status(opportunity_id, OpportunityStatus::Dismissed)
        .await
        .expect_err("lapsed opportunity must not transition");
    assert!(matches!(
        err,
        PerchError::InvalidStatus { actual, .. } if actual == "expired"
    ));
}

#[tokio::test]
async fn expired_and_pending_are_not_valid_transition_targets() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let account_id = uuid::Uuid::new_v4();
    let opportunity = fixtures::opportunity(account_id, "post-1", now + Duration::hours(2));
    let opportunity_id = opportunity.id;
    store.insert_opportunity_if_absent(opportunity).await.unwrap();

    let service = OpportunityService::new(Arc::new(store));

    for target in [OpportunityStatus::Expired, OpportunityStatus::Pending] {
        let err = service
            .update_status(opportunity_id, target)
            .await
            .expect_err("expiry is the sweeper's job");
        assert!(matches!(err, PerchError::InvalidStatus { .. }));
    }
}
