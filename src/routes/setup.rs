use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::payments::SetupIntentRequest;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSetupIntentRequest {
    /// Pledge amount in minor currency units, as a number or numeric string
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub amount: Option<Value>,
    /// Campaign the pledge is for
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub test_request_id: Option<Value>,
    /// Optional e-mail of the pledging user
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSetupIntentResponse {
    /// Secret the browser uses to confirm the card
    pub client_secret: String,
    pub setup_intent_id: String,
}

// Ids may arrive as JSON strings or numbers
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Zero and blank amounts count as missing
fn amount_minor_units(value: &Value) -> Result<Option<i64>, AppError> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(0) => Ok(None),
        Some(amount) => Ok(Some(amount)),
        None => Err(AppError::InvalidRequest("Amount must be a whole number".to_string())),
    }
}

/// Issue a reusable payment-method registration token for a pledge
#[utoipa::path(
    post,
    path = "/create-setup-intent",
    request_body = CreateSetupIntentRequest,
    responses(
        (status = 200, description = "Setup intent created", body = CreateSetupIntentResponse),
        (status = 400, description = "Missing required fields"),
        (status = 500, description = "Payment provider not configured or failed")
    )
)]
#[tracing::instrument(skip(state, body))]
pub async fn create_setup_intent(
    State(state): State<AppState>,
    body: Result<Json<CreateSetupIntentRequest>, JsonRejection>,
) -> Result<Json<CreateSetupIntentResponse>, AppError> {
    let payments = state.payments()?;
    let Json(request) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let amount = match &request.amount {
        Some(value) => amount_minor_units(value)?,
        None => None,
    };
    let test_request_id = request.test_request_id.as_ref().and_then(id_text);
    let (amount, test_request_id) = match (amount, test_request_id) {
        (Some(amount), Some(id)) => (amount, id),
        _ => return Err(AppError::InvalidRequest("Missing required fields".to_string())),
    };
    if amount < 0 {
        return Err(AppError::InvalidRequest("Amount must be positive".to_string()));
    }

    let intent = payments
        .create_setup_intent(&SetupIntentRequest {
            amount,
            test_request_id,
            user_email: request.user_email.filter(|e| !e.is_empty()),
        })
        .await
        .map_err(|e| {
            tracing::error!("Error creating SetupIntent: {}", e);
            AppError::Payment(e)
        })?;

    Ok(Json(CreateSetupIntentResponse {
        client_secret: intent.client_secret,
        setup_intent_id: intent.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(id_text(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_text(&json!(17)), Some("17".to_string()));
        assert_eq!(id_text(&json!("  ")), None);
        assert_eq!(id_text(&json!(null)), None);
    }

    #[test]
    fn amounts_accept_numbers_and_numeric_strings() {
        assert_eq!(amount_minor_units(&json!(2500)).unwrap(), Some(2500));
        assert_eq!(amount_minor_units(&json!(" 2500 ")).unwrap(), Some(2500));
        assert_eq!(amount_minor_units(&json!(0)).unwrap(), None);
        assert_eq!(amount_minor_units(&json!("")).unwrap(), None);
        assert_eq!(amount_minor_units(&json!(null)).unwrap(), None);
        assert!(amount_minor_units(&json!("twenty")).is_err());
        assert!(amount_minor_units(&json!(12.5)).is_err());
    }
}
