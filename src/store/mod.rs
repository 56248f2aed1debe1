//! Access to the campaign and pledge tables.

pub mod memory;
pub mod sql;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};

pub use memory::InMemoryStore;
pub use sql::SqlStore;
pub use supabase::SupabaseStore;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError>;

    async fn list_pledges(&self, campaign_id: Uuid, status: PledgeStatus) -> Result<Vec<Pledge>, StoreError>;

    async fn mark_pledge_charged(
        &self,
        pledge_id: Uuid,
        payment_intent_id: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn mark_pledge_failed(&self, pledge_id: Uuid) -> Result<(), StoreError>;

    /// Move the campaign from `from` to `to`. `Ok(false)` when it was no longer in `from`.
    async fn transition_campaign(&self, id: Uuid, from: CampaignStatus, to: CampaignStatus)
        -> Result<bool, StoreError>;

    /// Campaigns still `pending` whose `expiration_date` is strictly before `now`.
    async fn expired_pending_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError>;

    /// Move every `pending` pledge of the campaign to `cancelled`, returning how many moved.
    async fn cancel_pending_pledges(&self, campaign_id: Uuid) -> Result<u64, StoreError>;
}

/// Pick the database backend from configuration: a direct Postgres URL wins over Supabase REST.
pub async fn connect(config: &Config) -> Result<Option<Arc<dyn CampaignStore>>, StoreError> {
    if let Some(url) = &config.database_url {
        tracing::info!("Using direct Postgres store");
        let store = SqlStore::connect(url).await?;
        return Ok(Some(Arc::new(store)));
    }
    if let Some(supabase) = &config.supabase {
        tracing::info!("Using Supabase REST store at {}", supabase.url);
        return Ok(Some(Arc::new(SupabaseStore::new(supabase.clone()))));
    }
    tracing::warn!("No database configured; pledge endpoints will answer 500");
    Ok(None)
}
