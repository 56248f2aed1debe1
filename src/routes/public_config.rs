use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Browser-safe configuration. Never carries service keys or secrets.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfigResponse {
    pub supabase_url: Option<String>,
    /// Anonymous (row-level-security bound) database key
    pub supabase_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_publishable_key: Option<String>,
}

/// Public configuration for the front end
#[utoipa::path(
    get,
    path = "/config",
    responses(
        (status = 200, description = "Public configuration values", body = PublicConfigResponse)
    )
)]
pub async fn public_config(State(state): State<AppState>) -> Json<PublicConfigResponse> {
    Json(PublicConfigResponse {
        supabase_url: state.public.supabase_url.clone(),
        supabase_key: state.public.supabase_anon_key.clone(),
        stripe_publishable_key: state.public.stripe_publishable_key.clone(),
    })
}
