use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::CampaignStatus;
use crate::store::CampaignStore;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ExpiredCampaign {
    pub test_request_id: Uuid,
    pub name: String,
    pub pledges_cancelled: u64,
    /// Set when the campaign expired but its pledges could not be cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ExpirationReport {
    pub expired_count: usize,
    pub pledges_cancelled: u64,
    pub details: Vec<ExpiredCampaign>,
}

/// Expire every pending campaign past its deadline that did not reach its goal,
/// cancelling its pending pledges. Only the initial query can fail the sweep.
#[tracing::instrument(skip(store))]
pub async fn expire_pledges(store: &dyn CampaignStore, now: DateTime<Utc>) -> Result<ExpirationReport, StoreError> {
    let candidates = store.expired_pending_campaigns(now).await?;
    let mut report = ExpirationReport::default();

    if candidates.is_empty() {
        info!("No expired test requests");
        return Ok(report);
    }

    for campaign in candidates {
        // Funding may have moved since the query
        if campaign.goal_met() {
            info!("Skipping {}: goal met ({} of {})", campaign.id, campaign.current_funding, campaign.test_cost);
            continue;
        }

        match store
            .transition_campaign(campaign.id, CampaignStatus::Pending, CampaignStatus::Expired)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Skipping {}: no longer pending", campaign.id);
                continue;
            }
            Err(e) => {
                error!("Failed to expire test request {}: {}", campaign.id, e);
                continue;
            }
        }

        let (pledges_cancelled, cancel_error) = match store.cancel_pending_pledges(campaign.id).await {
            Ok(count) => (count, None),
            Err(e) => {
                error!("Expired {} but cancelling its pledges failed: {}", campaign.id, e);
                (0, Some(e.to_string()))
            }
        };

        info!("Expired test request {} ({} pledges cancelled)", campaign.id, pledges_cancelled);
        report.expired_count += 1;
        report.pledges_cancelled += pledges_cancelled;
        report.details.push(ExpiredCampaign {
            test_request_id: campaign.id,
            name: campaign.name,
            pledges_cancelled,
            cancel_error,
        });
    }

    Ok(report)
}
