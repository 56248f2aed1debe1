use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{Charge, ChargeRequest, PaymentProvider, SetupIntent, SetupIntentRequest};
use crate::config::StripeConfig;
use crate::error::PaymentError;

/// Minimal Stripe REST client: form-encoded requests, bearer secret key.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentBody {
    id: String,
    status: String,
    amount: i64,
    #[serde(default)]
    last_payment_error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SetupIntentBody {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ErrorDetail {
    fn describe(&self) -> String {
        match (&self.message, &self.code) {
            (Some(message), _) => message.clone(),
            (None, Some(code)) => code.clone(),
            (None, None) => "unknown payment error".to_string(),
        }
    }
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: StripeConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base.as_str().trim_end_matches('/'), path)
    }

    fn charge_form(&self, request: &ChargeRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("amount", request.amount.to_string()),
            ("currency", self.config.currency.clone()),
            ("payment_method", request.payment_method_id.clone()),
            ("payment_method_types[]", "card".to_string()),
            ("confirm", "true".to_string()),
            ("off_session", "true".to_string()),
            ("metadata[pledge_id]", request.pledge_id.to_string()),
            ("metadata[test_request_id]", request.test_request_id.to_string()),
        ];
        if let Some(customer) = &request.customer_id {
            form.push(("customer", customer.clone()));
        }
        form
    }

    fn setup_form(request: &SetupIntentRequest) -> Vec<(&'static str, String)> {
        vec![
            ("payment_method_types[]", "card".to_string()),
            ("metadata[amount]", request.amount.to_string()),
            ("metadata[test_request_id]", request.test_request_id.clone()),
            ("metadata[user_email]", request.user_email.clone().unwrap_or_default()),
        ]
    }
}

/// Turn a non-2xx Stripe answer into a `PaymentError`, keeping Stripe's message.
async fn error_from(response: Response) -> PaymentError {
    let status = response.status();
    let detail = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope.error,
        Err(e) => {
            return PaymentError::Api {
                status: status.as_u16(),
                message: format!("Stripe returned {} with an unreadable body: {}", status, e),
            }
        }
    };
    let is_card_error = status == StatusCode::PAYMENT_REQUIRED || detail.kind.as_deref() == Some("card_error");
    if is_card_error {
        PaymentError::Declined(detail.describe())
    } else {
        PaymentError::Api { status: status.as_u16(), message: detail.describe() }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(skip(self, request), fields(pledge_id = %request.pledge_id, amount = request.amount))]
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        let response = self
            .client
            .post(self.endpoint("payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", request.idempotency_key())
            .form(&self.charge_form(request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let intent: PaymentIntentBody = response.json().await?;
        if intent.status != "succeeded" {
            let reason = intent
                .last_payment_error
                .map(|e| e.describe())
                .unwrap_or_else(|| format!("Payment intent {} ended in status {}", intent.id, intent.status));
            return Err(PaymentError::Declined(reason));
        }

        tracing::debug!("Captured payment intent {}", intent.id);
        Ok(Charge { payment_intent_id: intent.id, amount: intent.amount })
    }

    #[tracing::instrument(skip(self, request), fields(test_request_id = %request.test_request_id))]
    async fn create_setup_intent(&self, request: &SetupIntentRequest) -> Result<SetupIntent, PaymentError> {
        let response = self
            .client
            .post(self.endpoint("setup_intents"))
            .bearer_auth(&self.config.secret_key)
            .form(&Self::setup_form(request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let intent: SetupIntentBody = response.json().await?;
        Ok(SetupIntent { id: intent.id, client_secret: intent.client_secret })
    }
}
