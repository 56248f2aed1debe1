use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use super::CampaignStore;
use crate::entities::{pledge, test_request, Pledges, TestRequests};
use crate::error::StoreError;
use crate::models::{Campaign, CampaignStatus, Pledge, PledgeStatus};

/// Direct Postgres access through sea-orm.
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let db = Database::connect(url).await?;
        tracing::info!("Database connection established.");
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl TryFrom<test_request::Model> for Campaign {
    type Error = StoreError;

    fn try_from(row: test_request::Model) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: row.id,
            name: row.name,
            current_funding: row.current_funding,
            test_cost: row.test_cost,
            status: row.status.parse().map_err(StoreError::Decode)?,
            expiration_date: row.expiration_date,
        })
    }
}

impl TryFrom<pledge::Model> for Pledge {
    type Error = StoreError;

    fn try_from(row: pledge::Model) -> Result<Self, Self::Error> {
        Ok(Pledge {
            id: row.id,
            test_request_id: row.test_request_id,
            user_id: row.user_id,
            amount: row.amount,
            payment_method_id: row.payment_method_id,
            customer_id: row.customer_id,
            status: row.status.parse().map_err(StoreError::Decode)?,
            charged_at: row.charged_at,
            payment_intent_id: row.payment_intent_id,
        })
    }
}

#[async_trait]
impl CampaignStore for SqlStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        TestRequests::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn list_pledges(&self, campaign_id: Uuid, status: PledgeStatus) -> Result<Vec<Pledge>, StoreError> {
        Pledges::find()
            .filter(pledge::Column::TestRequestId.eq(campaign_id))
            .filter(pledge::Column::Status.eq(status.as_str()))
            .order_by_asc(pledge::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Pledge::try_from)
            .collect()
    }

    async fn mark_pledge_charged(
        &self,
        pledge_id: Uuid,
        payment_intent_id: &str,
        charged_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Pledges::update_many()
            .col_expr(pledge::Column::Status, Expr::value(PledgeStatus::Charged.as_str()))
            .col_expr(pledge::Column::ChargedAt, Expr::value(charged_at))
            .col_expr(pledge::Column::PaymentIntentId, Expr::value(payment_intent_id))
            .filter(pledge::Column::Id.eq(pledge_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_pledge_failed(&self, pledge_id: Uuid) -> Result<(), StoreError> {
        Pledges::update_many()
            .col_expr(pledge::Column::Status, Expr::value(PledgeStatus::Failed.as_str()))
            .filter(pledge::Column::Id.eq(pledge_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn transition_campaign(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        let result = TestRequests::update_many()
            .col_expr(test_request::Column::Status, Expr::value(to.as_str()))
            .filter(test_request::Column::Id.eq(id))
            .filter(test_request::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn expired_pending_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        TestRequests::find()
            .filter(test_request::Column::Status.eq(CampaignStatus::Pending.as_str()))
            .filter(test_request::Column::ExpirationDate.lt(now))
            .order_by_asc(test_request::Column::ExpirationDate)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Campaign::try_from)
            .collect()
    }

    async fn cancel_pending_pledges(&self, campaign_id: Uuid) -> Result<u64, StoreError> {
        let result = Pledges::update_many()
            .col_expr(pledge::Column::Status, Expr::value(PledgeStatus::Cancelled.as_str()))
            .filter(pledge::Column::TestRequestId.eq(campaign_id))
            .filter(pledge::Column::Status.eq(PledgeStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
