use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::CampaignStore;
use crate::config::SupabaseConfig;
use crate::error::StoreError;
use crate::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};

const CAMPAIGNS: &str = "test_requests";
const PLEDGES: &str = "pledges";

/// Supabase tables through the PostgREST API, authenticated with the service-role key.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    config: SupabaseConfig,
}

#[derive(Deserialize)]
struct IdOnly {
    #[allow(dead_code)]
    id: Uuid,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: SupabaseConfig) -> Self {
        Self { client, config }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.as_str().trim_end_matches('/'), table)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    /// PATCH the rows matching `filters`, returning how many rows changed.
    async fn update(&self, table: &str, filters: &[(&str, String)], body: serde_json::Value) -> Result<u64, StoreError> {
        let response = self
            .authed(self.client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&[("select", "id")])
            .query(filters)
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;
        let rows = response.json::<Vec<IdOnly>>().await?;
        Ok(rows.len() as u64)
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Backend(format!("{} returned from database: {}", status, body)))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl CampaignStore for SupabaseStore {
    #[tracing::instrument(skip(self))]
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let rows: Vec<Campaign> = self.select(CAMPAIGNS, &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(skip(self))]
    async fn list_pledges(&self, campaign_id: Uuid, status: PledgeStatus) -> Result<Vec<Pledge>, StoreError> {
        self.select(
            PLEDGES,
            &[
                ("test_request_id", eq(campaign_id)),
                ("status", eq(status)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn mark_pledge_charged(
        &self,
        pledge_id: Uuid,
        payment_intent_id: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(
            PLEDGES,
            &[("id", eq(pledge_id))],
            json!({
                "status": PledgeStatus::Charged,
                "charged_at": timestamp(charged_at),
                "payment_intent_id": payment_intent_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn mark_pledge_failed(&self, pledge_id: Uuid) -> Result<(), StoreError> {
        self.update(PLEDGES, &[("id", eq(pledge_id))], json!({ "status": PledgeStatus::Failed }))
            .await?;
        Ok(())
    }

    async fn transition_campaign(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        let changed = self
            .update(CAMPAIGNS, &[("id", eq(id)), ("status", eq(from))], json!({ "status": to }))
            .await?;
        Ok(changed > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn expired_pending_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        // PostgREST cannot compare two columns; the funding check happens in the sweep
        self.select(
            CAMPAIGNS,
            &[
                ("status", eq(CampaignStatus::Pending)),
                ("expiration_date", format!("lt.{}", timestamp(now))),
                ("order", "expiration_date.asc".to_string()),
            ],
        )
        .await
    }

    async fn cancel_pending_pledges(&self, campaign_id: Uuid) -> Result<u64, StoreError> {
        self.update(
            PLEDGES,
            &[
                ("test_request_id", eq(campaign_id)),
                ("status", eq(PledgeStatus::Pending)),
            ],
            json!({ "status": PledgeStatus::Cancelled }),
        )
        .await
    }
}
