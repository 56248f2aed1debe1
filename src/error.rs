use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    GoalNotMet { current_funding: i64, test_cost: i64 },
    Unauthorized,
    NotFound(String),
    Configuration(String),
    Store(StoreError),
    Payment(PaymentError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidRequest(msg) => write!(f, "{}", msg),
            AppError::GoalNotMet { .. } => write!(f, "Funding goal not reached"),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::Configuration(msg) => write!(f, "{}", msg),
            AppError::Store(err) => write!(f, "{}", err),
            AppError::Payment(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::Payment(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::GoalNotMet { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::GoalNotMet { current_funding, test_cost } => json!({
                "error": self.to_string(),
                "current_funding": current_funding,
                "test_cost": test_cost,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Failures talking to the campaign/pledge database.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The request never produced a response (network, TLS, timeout)
    Transport(String),
    /// The backend answered with an error
    Backend(String),
    /// A row could not be decoded into the domain model
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "Database request failed: {}", msg),
            StoreError::Backend(msg) => write!(f, "Database error: {}", msg),
            StoreError::Decode(msg) => write!(f, "Unexpected database row: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failures reported by the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentError {
    /// The provider refused the operation (card declined, invalid method...)
    Declined(String),
    /// The provider answered with a non-card error
    Api { status: u16, message: String },
    Transport(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::Declined(msg) => write!(f, "{}", msg),
            PaymentError::Api { message, .. } => write!(f, "{}", message),
            PaymentError::Transport(msg) => write!(f, "Payment provider unreachable: {}", msg),
        }
    }
}

impl PaymentError {
    /// True when the provider may have acted on the request even though no
    /// answer came back, so the same idempotent request must be replayed.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            PaymentError::Transport(_) => true,
            PaymentError::Api { status, .. } => *status >= 500,
            PaymentError::Declined(_) => false,
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Transport(err.to_string())
    }
}
