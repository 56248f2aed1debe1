#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt; // For Response body handling
use pledgeflow::config::PublicConfig;
use pledgeflow::jobs::SettlementOptions;
use pledgeflow::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};
use pledgeflow::payments::FakePaymentProvider;
use pledgeflow::store::InMemoryStore;
use pledgeflow::{create_app, AppState};
use serde_json::Value;
use std::sync::{Arc, Once};
use tower::ServiceExt; // For oneshot
use uuid::Uuid;

pub const CRON_SECRET: &str = "cron-test-secret";

// For initializing tracing once
static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

pub struct TestApp {
    pub app: Router,
    pub store: InMemoryStore,
    pub payments: FakePaymentProvider,
}

/// Settlement options that never wait between attempts.
pub fn no_retries() -> SettlementOptions {
    SettlementOptions {
        bookkeeping_retry: std::time::Duration::ZERO,
        charge_retry: std::time::Duration::ZERO,
    }
}

/// App wired to an in-memory store and the fake provider, no retries.
pub fn test_app() -> TestApp {
    setup();
    let store = InMemoryStore::new();
    let payments = FakePaymentProvider::new();
    let state = AppState {
        store: Some(Arc::new(store.clone())),
        payments: Some(Arc::new(payments.clone())),
        public: PublicConfig {
            supabase_url: Some("https://demo.supabase.co".to_string()),
            supabase_anon_key: Some("anon-key".to_string()),
            stripe_publishable_key: Some("pk_test_demo".to_string()),
        },
        cron_secret: Some(CRON_SECRET.to_string()),
        settlement: no_retries(),
    };
    TestApp { app: create_app(state), store, payments }
}

/// App with nothing configured at all.
pub fn bare_app() -> Router {
    setup();
    create_app(AppState {
        store: None,
        payments: None,
        public: PublicConfig::default(),
        cron_secret: None,
        settlement: SettlementOptions::default(),
    })
}

pub fn campaign(current_funding: i64, test_cost: i64) -> Campaign {
    Campaign {
        id: Uuid::new_v4(),
        name: "Mobile checkout usability test".to_string(),
        current_funding,
        test_cost,
        status: CampaignStatus::Pending,
        expiration_date: Utc::now() + Duration::days(7),
    }
}

pub fn expired_campaign(current_funding: i64, test_cost: i64) -> Campaign {
    Campaign {
        expiration_date: Utc::now() - Duration::hours(1),
        ..campaign(current_funding, test_cost)
    }
}

pub fn pledge(campaign: &Campaign, amount: i64, payment_method: &str) -> Pledge {
    Pledge {
        id: Uuid::new_v4(),
        test_request_id: campaign.id,
        user_id: Some(Uuid::new_v4()),
        amount,
        payment_method_id: Some(payment_method.to_string()),
        customer_id: None,
        status: PledgeStatus::Pending,
        charged_at: None,
        payment_intent_id: None,
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Run one request through the whole router; empty bodies come back as `Value::Null`.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    if body_bytes.is_empty() {
        return (status, Value::Null);
    }
    let body = serde_json::from_slice(&body_bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&body_bytes).to_string())
    });
    (status, body)
}
