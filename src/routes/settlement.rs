use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::jobs::{self, SettlementReport};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChargePledgesRequest {
    /// Campaign whose pending pledges should be captured
    #[serde(default)]
    pub test_request_id: Option<String>,
}

/// Capture every pending pledge of a campaign that reached its goal
#[utoipa::path(
    post,
    path = "/charge-pledges",
    request_body = ChargePledgesRequest,
    responses(
        (status = 200, description = "Pledges processed; per-pledge outcomes in the body", body = SettlementReport),
        (status = 400, description = "Missing id, or funding goal not reached"),
        (status = 404, description = "Unknown test request"),
        (status = 500, description = "Missing configuration or database failure")
    ),
    description = "Charges the saved payment method of every pending pledge once the campaign's funding meets its cost. A declined card fails only its own pledge. The campaign becomes funded when no pledge failed."
)]
#[tracing::instrument(skip(state, body))]
pub async fn charge_pledges(
    State(state): State<AppState>,
    body: Result<Json<ChargePledgesRequest>, JsonRejection>,
) -> Result<Json<SettlementReport>, AppError> {
    let Json(request) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let raw_id = request
        .test_request_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing test_request_id".to_string()))?;
    let campaign_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| AppError::InvalidRequest(format!("Invalid test_request_id: {}", raw_id)))?;

    let payments = state.payments()?;
    let store = state.store()?;

    let report = jobs::charge_pledges(store, payments, campaign_id, &state.settlement).await?;
    Ok(Json(report))
}
