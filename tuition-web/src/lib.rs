//! tuition-web library - HTTP service for the tuition payment ledger
//!
//! Every `/api` route sits behind basic authentication; `/health` is public.

use axum::Router;
use tower_http::trace::TraceLayer;
use tuition_common::auth::AdminCredentials;
use tuition_common::sync::SyncHandle;
use tuition_common::Ledger;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub credentials: AdminCredentials,
    /// Replication queue; a disabled handle when sync is off
    pub sync: SyncHandle,
}

impl AppState {
    pub fn new(ledger: Ledger, credentials: AdminCredentials, sync: SyncHandle) -> Self {
        Self {
            ledger,
            credentials,
            sync,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/report", get(api::get_report))
        .route("/api/report/email", post(api::email_report))
        .route("/api/months", get(api::get_months))
        .route("/api/settings", get(api::get_settings).post(api::update_settings))
        .route("/api/roster", get(api::get_roster).put(api::replace_roster))
        .route(
            "/api/payments/:month",
            post(api::update_payments).delete(api::delete_month),
        )
        .route("/api/sync", get(api::get_sync_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
