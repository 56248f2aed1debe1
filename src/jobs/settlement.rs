use backoff::future::retry_notify;
use backoff::Error as BackoffError;
use backoff::ExponentialBackoff;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, PaymentError, StoreError};
use crate::models::{CampaignStatus, Pledge, PledgeStatus};
use crate::payments::{Charge, ChargeRequest, PaymentProvider};
use crate::store::CampaignStore;

#[derive(Debug, Clone)]
pub struct SettlementOptions {
    /// Upper bound on retrying a status write after the provider answered
    pub bookkeeping_retry: Duration,
    /// Upper bound on replaying a charge whose outcome is unknown
    pub charge_retry: Duration,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        Self {
            bookkeeping_retry: Duration::from_secs(10),
            charge_retry: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ChargedPledge {
    pub pledge_id: Uuid,
    pub amount: i64,
    /// Provider reference of the captured payment
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct FailedPledge {
    pub pledge_id: Uuid,
    pub amount: i64,
    pub error: String,
    /// The provider never answered; the pledge stays `pending` for the next run
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SettlementResults {
    pub success: Vec<ChargedPledge>,
    pub failed: Vec<FailedPledge>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SettlementSummary {
    /// Pending pledges attempted in this run
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sum of captured amounts, minor currency units
    pub total_charged: i64,
    /// Whether the campaign was promoted to `funded` by this run
    pub campaign_funded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettlementReport {
    pub message: String,
    pub results: SettlementResults,
    pub summary: SettlementSummary,
}

/// Charge every pending pledge of a pending campaign whose goal is met.
///
/// Structural problems (unknown or closed campaign, goal not met, lookup
/// failures) are returned as errors before any charge. After that point
/// nothing fails the run: each pledge's outcome is recorded in the report,
/// and bookkeeping failures are retried then logged.
#[tracing::instrument(skip(store, payments, options))]
pub async fn charge_pledges(
    store: &dyn CampaignStore,
    payments: &dyn PaymentProvider,
    campaign_id: Uuid,
    options: &SettlementOptions,
) -> Result<SettlementReport, AppError> {
    let campaign = store
        .get_campaign(campaign_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test request".to_string()))?;

    if campaign.status != CampaignStatus::Pending {
        info!("Refusing to settle {}: status is {}", campaign.id, campaign.status);
        return Err(AppError::InvalidRequest(format!("Test request is {}", campaign.status)));
    }

    if !campaign.goal_met() {
        info!(
            "Goal not reached for {}: {} of {}",
            campaign.id, campaign.current_funding, campaign.test_cost
        );
        return Err(AppError::GoalNotMet {
            current_funding: campaign.current_funding,
            test_cost: campaign.test_cost,
        });
    }

    let pledges = store.list_pledges(campaign_id, PledgeStatus::Pending).await?;
    if pledges.is_empty() {
        info!("No pending pledges for {}", campaign_id);
        return Ok(SettlementReport {
            message: "No pending pledges to charge".to_string(),
            results: SettlementResults::default(),
            summary: SettlementSummary::default(),
        });
    }

    info!("Charging {} pending pledges for {}", pledges.len(), campaign_id);
    let mut results = SettlementResults::default();

    for pledge in &pledges {
        match attempt_charge(payments, pledge, options.charge_retry).await {
            Ok(charge) => {
                let charged_at = Utc::now();
                let recorded = with_retry(options.bookkeeping_retry, || {
                    store.mark_pledge_charged(pledge.id, &charge.payment_intent_id, charged_at)
                })
                .await;
                if let Err(e) = recorded {
                    // The provider holds the money; the row still says pending. The
                    // idempotency key keeps a rerun from charging it again.
                    error!(
                        "Pledge {} was charged ({}) but recording it failed: {}",
                        pledge.id, charge.payment_intent_id, e
                    );
                }
                results.success.push(ChargedPledge {
                    pledge_id: pledge.id,
                    amount: charge.amount,
                    payment_intent_id: charge.payment_intent_id,
                });
            }
            Err(ChargeFailure::Unsettled(reason)) => {
                warn!("No answer for pledge {}, leaving it pending: {}", pledge.id, reason);
                results.failed.push(FailedPledge {
                    pledge_id: pledge.id,
                    amount: pledge.amount,
                    error: reason,
                    retryable: true,
                });
            }
            Err(ChargeFailure::Rejected(reason)) => {
                warn!("Charge failed for pledge {}: {}", pledge.id, reason);
                let recorded = with_retry(options.bookkeeping_retry, || store.mark_pledge_failed(pledge.id)).await;
                if let Err(e) = recorded {
                    error!("Could not mark pledge {} as failed: {}", pledge.id, e);
                }
                results.failed.push(FailedPledge {
                    pledge_id: pledge.id,
                    amount: pledge.amount,
                    error: reason,
                    retryable: false,
                });
            }
        }
    }

    let mut campaign_funded = false;
    if results.failed.is_empty() {
        match store
            .transition_campaign(campaign_id, CampaignStatus::Pending, CampaignStatus::Funded)
            .await
        {
            Ok(true) => {
                info!("Test request {} is now funded", campaign_id);
                campaign_funded = true;
            }
            Ok(false) => warn!("Test request {} left pending during settlement; not promoted", campaign_id),
            Err(e) => error!("Could not promote {} to funded: {}", campaign_id, e),
        }
    }

    let summary = SettlementSummary {
        total: pledges.len(),
        successful: results.success.len(),
        failed: results.failed.len(),
        total_charged: results.success.iter().map(|c| c.amount).sum(),
        campaign_funded,
    };
    info!(
        "Settlement for {} finished: {} charged, {} failed, {} total",
        campaign_id, summary.successful, summary.failed, summary.total_charged
    );

    Ok(SettlementReport {
        message: "Pledges processed".to_string(),
        results,
        summary,
    })
}

enum ChargeFailure {
    /// Definitive refusal; the pledge is marked `failed`
    Rejected(String),
    /// Outcome unknown after every replay
    Unsettled(String),
}

/// One pledge's charge. Unanswered attempts are replayed with the same
/// idempotency key until `max_elapsed` runs out.
async fn attempt_charge(
    payments: &dyn PaymentProvider,
    pledge: &Pledge,
    max_elapsed: Duration,
) -> Result<Charge, ChargeFailure> {
    let payment_method_id = pledge
        .payment_method_id
        .clone()
        .ok_or_else(|| ChargeFailure::Rejected("Pledge has no saved payment method".to_string()))?;

    let request = ChargeRequest {
        pledge_id: pledge.id,
        test_request_id: pledge.test_request_id,
        amount: pledge.amount,
        payment_method_id,
        customer_id: pledge.customer_id.clone(),
    };
    let request = &request;

    let outcome = retry_notify(
        policy(max_elapsed),
        move || async move {
            payments.charge(request).await.map_err(|e| {
                if e.is_ambiguous() {
                    BackoffError::transient(e)
                } else {
                    BackoffError::permanent(e)
                }
            })
        },
        |err: PaymentError, duration: Duration| {
            warn!("Charge attempt unanswered: {}. Replaying in {:.1}s...", err, duration.as_secs_f32());
        },
    )
    .await;

    outcome.map_err(|e| {
        if e.is_ambiguous() {
            ChargeFailure::Unsettled(e.to_string())
        } else {
            ChargeFailure::Rejected(e.to_string())
        }
    })
}

fn policy(max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    }
}

fn retry_notify_handler(err: StoreError, duration: Duration) {
    warn!("Status write failed: {}. Retrying in {:.1}s...", err, duration.as_secs_f32());
}

async fn with_retry<F, Fut>(max_elapsed: Duration, mut op: F) -> Result<(), StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    retry_notify(
        policy(max_elapsed),
        || {
            let attempt = op();
            async move { attempt.await.map_err(BackoffError::transient) }
        },
        retry_notify_handler,
    )
    .await
}
