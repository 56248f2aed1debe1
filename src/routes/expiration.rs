use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::jobs::{self, ExpirationReport};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpirePledgesResponse {
    pub success: bool,
    pub message: String,
    pub results: ExpirationReport,
}

/// Exact match of `Authorization: Bearer <secret>`. An unset secret admits nobody.
fn authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", secret))
        .unwrap_or(false)
}

/// Scheduled sweep: expire unfunded campaigns past their deadline
#[utoipa::path(
    post,
    path = "/expire-pledges",
    params(("Authorization" = String, Header, description = "Bearer <CRON_SECRET>")),
    responses(
        (status = 200, description = "Sweep completed", body = ExpirePledgesResponse),
        (status = 401, description = "Missing or wrong bearer token"),
        (status = 500, description = "Missing configuration or database failure")
    ),
    description = "Meant for a cron trigger; accepts any HTTP method."
)]
#[tracing::instrument(skip(state, headers))]
pub async fn expire_pledges(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ExpirePledgesResponse>, AppError> {
    if !authorized(&headers, state.cron_secret.as_deref()) {
        tracing::warn!("Rejected expiration request with bad credentials");
        return Err(AppError::Unauthorized);
    }

    let store = state.store()?;
    let results = jobs::expire_pledges(store, Utc::now()).await.map_err(|e| {
        tracing::error!("Error in expire-pledges sweep: {}", e);
        AppError::Store(e)
    })?;

    Ok(Json(ExpirePledgesResponse {
        success: true,
        message: "Expiration check completed".to_string(),
        results,
    }))
}
