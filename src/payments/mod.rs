//! The payment provider seam.

pub mod fake;
pub mod stripe;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PaymentError;

pub use fake::FakePaymentProvider;
pub use stripe::StripeClient;

/// An off-session capture of a previously saved payment method.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub pledge_id: Uuid,
    pub test_request_id: Uuid,
    pub amount: i64,
    pub payment_method_id: String,
    pub customer_id: Option<String>,
}

impl ChargeRequest {
    /// Key the provider uses to collapse repeated attempts for the same pledge.
    pub fn idempotency_key(&self) -> String {
        format!("pledge-charge-{}", self.pledge_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub payment_intent_id: String,
    /// Amount the provider actually captured
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupIntentRequest {
    pub amount: i64,
    pub test_request_id: String,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create and confirm a payment for the saved method. `Ok` only when the funds were captured.
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError>;

    async fn create_setup_intent(&self, request: &SetupIntentRequest) -> Result<SetupIntent, PaymentError>;
}
