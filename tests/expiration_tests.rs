mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use common::{bare_app, campaign, expired_campaign, no_retries, pledge, send, test_app, CRON_SECRET};
use pledgeflow::error::StoreError;
use pledgeflow::jobs::{charge_pledges, expire_pledges};
use pledgeflow::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};
use pledgeflow::payments::FakePaymentProvider;
use pledgeflow::store::{CampaignStore, InMemoryStore};
use uuid::Uuid;

/// Settles every campaign right after the sweep has listed it, as a
/// concurrent `/charge-pledges` call would.
struct SettledMidSweep {
    inner: InMemoryStore,
    payments: FakePaymentProvider,
}

#[async_trait]
impl CampaignStore for SettledMidSweep {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        self.inner.get_campaign(id).await
    }

    async fn list_pledges(&self, campaign_id: Uuid, status: PledgeStatus) -> Result<Vec<Pledge>, StoreError> {
        self.inner.list_pledges(campaign_id, status).await
    }

    async fn mark_pledge_charged(
        &self,
        pledge_id: Uuid,
        payment_intent_id: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.mark_pledge_charged(pledge_id, payment_intent_id, charged_at).await
    }

    async fn mark_pledge_failed(&self, pledge_id: Uuid) -> Result<(), StoreError> {
        self.inner.mark_pledge_failed(pledge_id).await
    }

    async fn transition_campaign(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        self.inner.transition_campaign(id, from, to).await
    }

    async fn expired_pending_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let listed = self.inner.expired_pending_campaigns(now).await?;
        for campaign in &listed {
            // funding arrived after the snapshot was taken
            let mut funded = campaign.clone();
            funded.current_funding = funded.test_cost;
            self.inner.insert_campaign(funded).await;
            charge_pledges(&self.inner, &self.payments, campaign.id, &no_retries())
                .await
                .expect("settlement succeeds");
        }
        Ok(listed)
    }

    async fn cancel_pending_pledges(&self, campaign_id: Uuid) -> Result<u64, StoreError> {
        self.inner.cancel_pending_pledges(campaign_id).await
    }
}

fn sweep_request(method: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/expire-pledges").method(method);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_sweep_expires_unfunded_and_cancels_pending_pledges() {
    let t = test_app();
    let unfunded = expired_campaign(2_000, 10_000);
    let p1 = pledge(&unfunded, 1_000, "pm_a");
    let p2 = pledge(&unfunded, 1_000, "pm_b");
    let mut already_failed = pledge(&unfunded, 500, "pm_c");
    already_failed.status = PledgeStatus::Failed;
    t.store.insert_campaign(unfunded.clone()).await;
    for p in [&p1, &p2, &already_failed] {
        t.store.insert_pledge(p.clone()).await;
    }

    let (status, body) = send(&t.app, sweep_request("GET", Some(CRON_SECRET))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Expiration check completed");
    assert_eq!(body["results"]["expired_count"], 1);
    assert_eq!(body["results"]["pledges_cancelled"], 2);
    assert_eq!(body["results"]["details"][0]["test_request_id"], unfunded.id.to_string());
    assert_eq!(body["results"]["details"][0]["name"], unfunded.name);
    assert_eq!(body["results"]["details"][0]["pledges_cancelled"], 2);

    assert_eq!(t.store.campaign(unfunded.id).await.unwrap().status, CampaignStatus::Expired);
    assert_eq!(t.store.pledge(p1.id).await.unwrap().status, PledgeStatus::Cancelled);
    assert_eq!(t.store.pledge(p2.id).await.unwrap().status, PledgeStatus::Cancelled);
    assert_eq!(t.store.pledge(already_failed.id).await.unwrap().status, PledgeStatus::Failed);
}

#[tokio::test]
async fn test_goal_met_and_future_campaigns_are_untouched() {
    let t = test_app();
    let met = expired_campaign(10_000, 10_000);
    let open = campaign(0, 10_000);
    let met_pledge = pledge(&met, 10_000, "pm_a");
    t.store.insert_campaign(met.clone()).await;
    t.store.insert_campaign(open.clone()).await;
    t.store.insert_pledge(met_pledge.clone()).await;

    let report = expire_pledges(&t.store, Utc::now()).await.unwrap();

    assert_eq!(report.expired_count, 0);
    assert!(report.details.is_empty());
    assert_eq!(t.store.campaign(met.id).await.unwrap().status, CampaignStatus::Pending);
    assert_eq!(t.store.campaign(open.id).await.unwrap().status, CampaignStatus::Pending);
    assert_eq!(t.store.pledge(met_pledge.id).await.unwrap().status, PledgeStatus::Pending);
}

#[tokio::test]
async fn test_second_sweep_finds_nothing() {
    let t = test_app();
    let c = expired_campaign(0, 1_000);
    t.store.insert_campaign(c.clone()).await;
    t.store.insert_pledge(pledge(&c, 100, "pm_a")).await;

    let first = expire_pledges(&t.store, Utc::now()).await.unwrap();
    let second = expire_pledges(&t.store, Utc::now()).await.unwrap();

    assert_eq!(first.expired_count, 1);
    assert_eq!(second.expired_count, 0);
    assert_eq!(second.pledges_cancelled, 0);
    assert!(second.details.is_empty());
}

#[tokio::test]
async fn test_failed_expiry_skips_only_that_campaign() {
    let t = test_app();
    let stuck = expired_campaign(0, 1_000);
    let fine = expired_campaign(0, 1_000);
    let stuck_pledge = pledge(&stuck, 100, "pm_a");
    t.store.insert_campaign(stuck.clone()).await;
    t.store.insert_campaign(fine.clone()).await;
    t.store.insert_pledge(stuck_pledge.clone()).await;
    t.store.insert_pledge(pledge(&fine, 100, "pm_b")).await;
    t.store.fail_campaign_writes(stuck.id).await;

    let report = expire_pledges(&t.store, Utc::now()).await.unwrap();

    assert_eq!(report.expired_count, 1);
    assert_eq!(report.details[0].test_request_id, fine.id);
    // pledges of the skipped campaign stay pending for the next sweep
    assert_eq!(t.store.pledge(stuck_pledge.id).await.unwrap().status, PledgeStatus::Pending);
}

#[tokio::test]
async fn test_campaign_settled_during_sweep_stays_funded() {
    let inner = InMemoryStore::new();
    let c = expired_campaign(500, 1_000);
    let p = pledge(&c, 1_000, "pm_card_visa");
    inner.insert_campaign(c.clone()).await;
    inner.insert_pledge(p.clone()).await;
    let store = SettledMidSweep { inner: inner.clone(), payments: FakePaymentProvider::new() };

    let report = expire_pledges(&store, Utc::now()).await.unwrap();

    assert_eq!(report.expired_count, 0);
    assert!(report.details.is_empty());
    assert_eq!(inner.campaign(c.id).await.unwrap().status, CampaignStatus::Funded);
    assert_eq!(inner.pledge(p.id).await.unwrap().status, PledgeStatus::Charged);
}

#[tokio::test]
async fn test_cancel_failure_is_reported_in_details() {
    let t = test_app();
    let c = expired_campaign(0, 1_000);
    t.store.insert_campaign(c.clone()).await;
    t.store.insert_pledge(pledge(&c, 100, "pm_a")).await;
    t.store.fail_cancellations(c.id).await;

    let report = expire_pledges(&t.store, Utc::now()).await.unwrap();

    assert_eq!(report.expired_count, 1);
    assert_eq!(report.pledges_cancelled, 0);
    assert!(report.details[0].cancel_error.is_some());
}

#[tokio::test]
async fn test_wrong_or_missing_token_is_unauthorized_without_reads() {
    let t = test_app();
    t.store.insert_campaign(expired_campaign(0, 1_000)).await;

    for request in [
        sweep_request("GET", None),
        sweep_request("GET", Some("wrong-secret")),
        sweep_request("POST", Some("cron-test-secret-extra")),
    ] {
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }
    assert_eq!(t.store.read_count(), 0);
    assert_eq!(t.store.write_count(), 0);
}

#[tokio::test]
async fn test_unset_secret_rejects_even_empty_bearer() {
    let app = bare_app();
    let request = Request::builder()
        .uri("/expire-pledges")
        .header("Authorization", "Bearer ")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_query_failure_is_internal_error() {
    let t = test_app();
    t.store.fail_reads().await;
    let (status, body) = send(&t.app, sweep_request("POST", Some(CRON_SECRET))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Database error"));
}

#[tokio::test]
async fn test_empty_sweep_returns_zero_counts() {
    let t = test_app();
    let (status, body) = send(&t.app, sweep_request("POST", Some(CRON_SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"]["expired_count"], 0);
    assert_eq!(body["results"]["pledges_cancelled"], 0);
    assert_eq!(body["results"]["details"], serde_json::json!([]));
}
