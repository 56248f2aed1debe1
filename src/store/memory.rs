use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::CampaignStore;
use crate::error::StoreError;
use crate::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};

#[derive(Default)]
struct Tables {
    campaigns: HashMap<Uuid, Campaign>,
    // insertion order doubles as created_at ordering
    pledges: Vec<Pledge>,
}

#[derive(Default)]
struct Faults {
    pledge_writes: HashSet<Uuid>,
    campaign_writes: HashSet<Uuid>,
    cancel_writes: HashSet<Uuid>,
    reads: bool,
}

/// A thread-safe in-memory store.
///
/// Keeps both tables behind one `RwLock`, counts every call, and can be told
/// to fail specific writes. Test double for the real backends.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_campaign(&self, campaign: Campaign) {
        self.tables.write().await.campaigns.insert(campaign.id, campaign);
    }

    pub async fn insert_pledge(&self, pledge: Pledge) {
        self.tables.write().await.pledges.push(pledge);
    }

    pub async fn campaign(&self, id: Uuid) -> Option<Campaign> {
        self.tables.read().await.campaigns.get(&id).cloned()
    }

    pub async fn pledge(&self, id: Uuid) -> Option<Pledge> {
        self.tables.read().await.pledges.iter().find(|p| p.id == id).cloned()
    }

    /// Make every subsequent status write for this pledge fail.
    pub async fn fail_pledge_writes(&self, pledge_id: Uuid) {
        self.faults.write().await.pledge_writes.insert(pledge_id);
    }

    pub async fn fail_campaign_writes(&self, campaign_id: Uuid) {
        self.faults.write().await.campaign_writes.insert(campaign_id);
    }

    pub async fn fail_cancellations(&self, campaign_id: Uuid) {
        self.faults.write().await.cancel_writes.insert(campaign_id);
    }

    pub async fn fail_reads(&self) {
        self.faults.write().await.reads = true;
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls attempted so far, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn check_read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.reads {
            return Err(StoreError::Backend("injected read failure".to_string()));
        }
        Ok(())
    }

    async fn update_pledge<F>(&self, pledge_id: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Pledge),
    {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.pledge_writes.contains(&pledge_id) {
            return Err(StoreError::Backend(format!("injected write failure for pledge {}", pledge_id)));
        }
        let mut tables = self.tables.write().await;
        if let Some(pledge) = tables.pledges.iter_mut().find(|p| p.id == pledge_id) {
            apply(pledge);
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        self.check_read().await?;
        Ok(self.tables.read().await.campaigns.get(&id).cloned())
    }

    async fn list_pledges(&self, campaign_id: Uuid, status: PledgeStatus) -> Result<Vec<Pledge>, StoreError> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .pledges
            .iter()
            .filter(|p| p.test_request_id == campaign_id && p.status == status)
            .cloned()
            .collect())
    }

    async fn mark_pledge_charged(
        &self,
        pledge_id: Uuid,
        payment_intent_id: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let payment_intent_id = payment_intent_id.to_string();
        self.update_pledge(pledge_id, move |pledge| {
            pledge.status = PledgeStatus::Charged;
            pledge.charged_at = Some(charged_at);
            pledge.payment_intent_id = Some(payment_intent_id);
        })
        .await
    }

    async fn mark_pledge_failed(&self, pledge_id: Uuid) -> Result<(), StoreError> {
        self.update_pledge(pledge_id, |pledge| pledge.status = PledgeStatus::Failed).await
    }

    async fn transition_campaign(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.campaign_writes.contains(&id) {
            return Err(StoreError::Backend(format!("injected write failure for campaign {}", id)));
        }
        match self.tables.write().await.campaigns.get_mut(&id) {
            Some(campaign) if campaign.status == from => {
                campaign.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expired_pending_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut expired: Vec<Campaign> = tables
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Pending && c.expiration_date < now)
            .cloned()
            .collect();
        expired.sort_by_key(|c| c.expiration_date);
        Ok(expired)
    }

    async fn cancel_pending_pledges(&self, campaign_id: Uuid) -> Result<u64, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.cancel_writes.contains(&campaign_id) {
            return Err(StoreError::Backend(format!("injected cancel failure for campaign {}", campaign_id)));
        }
        let mut tables = self.tables.write().await;
        let mut cancelled = 0;
        for pledge in tables
            .pledges
            .iter_mut()
            .filter(|p| p.test_request_id == campaign_id && p.status == PledgeStatus::Pending)
        {
            pledge.status = PledgeStatus::Cancelled;
            cancelled += 1;
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn campaign(expires_in_hours: i64) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            name: "API regression suite".to_string(),
            current_funding: 0,
            test_cost: 1_000,
            status: CampaignStatus::Pending,
            expiration_date: Utc::now() + Duration::hours(expires_in_hours),
        }
    }

    fn pledge(campaign_id: Uuid, status: PledgeStatus) -> Pledge {
        Pledge {
            id: Uuid::new_v4(),
            test_request_id: campaign_id,
            user_id: None,
            amount: 250,
            payment_method_id: Some("pm_card_visa".to_string()),
            customer_id: None,
            status,
            charged_at: None,
            payment_intent_id: None,
        }
    }

    #[tokio::test]
    async fn lists_only_matching_status_in_insertion_order() {
        let store = InMemoryStore::new();
        let c = campaign(24);
        store.insert_campaign(c.clone()).await;
        let first = pledge(c.id, PledgeStatus::Pending);
        let charged = pledge(c.id, PledgeStatus::Charged);
        let second = pledge(c.id, PledgeStatus::Pending);
        let other_campaign = pledge(Uuid::new_v4(), PledgeStatus::Pending);
        for p in [&first, &charged, &second, &other_campaign] {
            store.insert_pledge(p.clone()).await;
        }

        let pending = store.list_pledges(c.id, PledgeStatus::Pending).await.unwrap();
        let ids: Vec<Uuid> = pending.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn expired_query_is_strictly_before_now() {
        let store = InMemoryStore::new();
        let past = campaign(-1);
        let future = campaign(1);
        let mut funded = campaign(-2);
        funded.status = CampaignStatus::Funded;
        for c in [&past, &future, &funded] {
            store.insert_campaign(c.clone()).await;
        }

        let expired = store.expired_pending_campaigns(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, past.id);

        // a deadline equal to now is not yet expired
        let at_deadline = store.expired_pending_campaigns(past.expiration_date).await.unwrap();
        assert!(at_deadline.is_empty());
    }

    #[tokio::test]
    async fn cancel_counts_only_pending() {
        let store = InMemoryStore::new();
        let c = campaign(-1);
        store.insert_campaign(c.clone()).await;
        store.insert_pledge(pledge(c.id, PledgeStatus::Pending)).await;
        store.insert_pledge(pledge(c.id, PledgeStatus::Pending)).await;
        store.insert_pledge(pledge(c.id, PledgeStatus::Failed)).await;

        assert_eq!(store.cancel_pending_pledges(c.id).await.unwrap(), 2);
        assert_eq!(store.cancel_pending_pledges(c.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_faults_fail_writes_and_are_counted() {
        let store = InMemoryStore::new();
        let c = campaign(1);
        let p = pledge(c.id, PledgeStatus::Pending);
        store.insert_campaign(c.clone()).await;
        store.insert_pledge(p.clone()).await;
        store.fail_pledge_writes(p.id).await;

        assert!(store.mark_pledge_failed(p.id).await.is_err());
        assert_eq!(store.pledge(p.id).await.unwrap().status, PledgeStatus::Pending);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn transition_only_applies_from_the_expected_status() {
        let store = InMemoryStore::new();
        let c = campaign(-1);
        store.insert_campaign(c.clone()).await;

        let promoted = store
            .transition_campaign(c.id, CampaignStatus::Pending, CampaignStatus::Funded)
            .await
            .unwrap();
        assert!(promoted);

        // a sweep that still believes the campaign is pending must not touch it
        let expired = store
            .transition_campaign(c.id, CampaignStatus::Pending, CampaignStatus::Expired)
            .await
            .unwrap();
        assert!(!expired);
        assert_eq!(store.campaign(c.id).await.unwrap().status, CampaignStatus::Funded);

        let unknown = store
            .transition_campaign(Uuid::new_v4(), CampaignStatus::Pending, CampaignStatus::Expired)
            .await
            .unwrap();
        assert!(!unknown);
    }
}
