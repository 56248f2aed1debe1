use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Charge, ChargeRequest, PaymentProvider, SetupIntent, SetupIntentRequest};
use crate::error::PaymentError;

#[derive(Default)]
struct State {
    declined_methods: HashSet<String>,
    unreachable: bool,
    // charges still to drop before the provider answers again
    dropped_charges: usize,
    charges: Vec<ChargeRequest>,
    setup_intents: Vec<SetupIntentRequest>,
    // idempotency key -> intent id, as the real provider replays them
    by_key: HashMap<String, String>,
}

/// Scriptable in-process provider for tests.
///
/// Every payment method succeeds unless it was declared declined. Repeated
/// charges with the same idempotency key return the first intent.
#[derive(Default, Clone)]
pub struct FakePaymentProvider {
    state: Arc<Mutex<State>>,
}

impl FakePaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn decline(&self, payment_method_id: &str) {
        self.state.lock().await.declined_methods.insert(payment_method_id.to_string());
    }

    /// Fail every call as if the provider could not be reached.
    pub async fn go_offline(&self) {
        self.state.lock().await.unreachable = true;
    }

    pub async fn go_online(&self) {
        let mut state = self.state.lock().await;
        state.unreachable = false;
        state.dropped_charges = 0;
    }

    /// Fail only the next `count` charge calls as unreachable.
    pub async fn drop_next_charges(&self, count: usize) {
        self.state.lock().await.dropped_charges = count;
    }

    /// Charge attempts received so far, declined ones included.
    pub async fn charges(&self) -> Vec<ChargeRequest> {
        self.state.lock().await.charges.clone()
    }

    pub async fn setup_intents(&self) -> Vec<SetupIntentRequest> {
        self.state.lock().await.setup_intents.clone()
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        let mut state = self.state.lock().await;
        state.charges.push(request.clone());
        if state.unreachable {
            return Err(PaymentError::Transport("connection refused".to_string()));
        }
        if state.dropped_charges > 0 {
            state.dropped_charges -= 1;
            return Err(PaymentError::Transport("connection reset".to_string()));
        }
        if state.declined_methods.contains(&request.payment_method_id) {
            return Err(PaymentError::Declined("Your card was declined.".to_string()));
        }
        let next_id = format!("pi_fake_{}", state.by_key.len() + 1);
        let intent_id = state.by_key.entry(request.idempotency_key()).or_insert(next_id).clone();
        Ok(Charge { payment_intent_id: intent_id, amount: request.amount })
    }

    async fn create_setup_intent(&self, request: &SetupIntentRequest) -> Result<SetupIntent, PaymentError> {
        let mut state = self.state.lock().await;
        if state.unreachable {
            return Err(PaymentError::Transport("connection refused".to_string()));
        }
        state.setup_intents.push(request.clone());
        let id = format!("seti_fake_{}", state.setup_intents.len());
        Ok(SetupIntent { client_secret: format!("{}_secret_fake", id), id })
    }
}
