use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod entities;
pub mod error;
pub mod jobs;
pub mod models;
pub mod payments;
pub mod routes;
pub mod store;

use config::{Config, PublicConfig};
use error::AppError;
use jobs::SettlementOptions;
use payments::{PaymentProvider, StripeClient};
use store::CampaignStore;

/// Shared state handed to every handler.
///
/// Collaborators are optional: a missing one turns the endpoints that need it
/// into 500s instead of preventing start-up.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn CampaignStore>>,
    pub payments: Option<Arc<dyn PaymentProvider>>,
    pub public: PublicConfig,
    pub cron_secret: Option<String>,
    pub settlement: SettlementOptions,
}

impl AppState {
    /// State for a real deployment: Stripe from config, the given store.
    pub fn from_config(config: &Config, store: Option<Arc<dyn CampaignStore>>) -> Self {
        let payments = config
            .stripe
            .clone()
            .map(|stripe| Arc::new(StripeClient::new(stripe)) as Arc<dyn PaymentProvider>);
        Self {
            store,
            payments,
            public: config.public.clone(),
            cron_secret: config.cron_secret.clone(),
            settlement: SettlementOptions {
                bookkeeping_retry: config.bookkeeping_retry,
                charge_retry: config.charge_retry,
            },
        }
    }

    pub fn store(&self) -> Result<&dyn CampaignStore, AppError> {
        self.store
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Missing Supabase configuration".to_string()))
    }

    pub fn payments(&self) -> Result<&dyn PaymentProvider, AppError> {
        self.payments.as_deref().ok_or_else(|| {
            tracing::error!("STRIPE_SECRET_KEY environment variable is not set");
            AppError::Configuration("Stripe is not configured. Please check environment variables.".to_string())
        })
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Service is healthy")
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pledgeflow API",
        version = "0.1.0",
        description = "Pledge collection, settlement and expiration for crowdfunded test requests"
    ),
    paths(
        health_check,
        routes::settlement::charge_pledges,
        routes::setup::create_setup_intent,
        routes::expiration::expire_pledges,
        routes::public_config::public_config
    ),
    components(schemas(
        routes::ChargePledgesRequest,
        routes::CreateSetupIntentRequest,
        routes::CreateSetupIntentResponse,
        routes::ExpirePledgesResponse,
        routes::PublicConfigResponse,
        jobs::SettlementReport,
        jobs::SettlementResults,
        jobs::SettlementSummary,
        jobs::ChargedPledge,
        jobs::FailedPledge,
        jobs::ExpirationReport,
        jobs::ExpiredCampaign
    ))
)]
pub struct ApiDoc;

/// Create the application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let api_doc = ApiDoc::openapi();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/charge-pledges", post(routes::charge_pledges))
        .route("/create-setup-intent", post(routes::create_setup_intent))
        // cron triggers and front ends use whatever method they like here
        .route("/expire-pledges", any(routes::expire_pledges))
        .route("/config", any(routes::public_config))
        .with_state(state);

    let docs_router = SwaggerUi::new("/docs").url("/api-doc/openapi.json", api_doc);

    // The browser reads /config cross-origin
    Router::new()
        .merge(api_routes)
        .merge(docs_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
