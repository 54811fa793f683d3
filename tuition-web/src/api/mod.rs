//! HTTP API handlers for tuition-web

pub mod auth;
pub mod health;
pub mod payments;
pub mod report;
pub mod roster;
pub mod settings;
pub mod sync;

use serde::Serialize;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use payments::{delete_month, update_payments};
pub use report::{email_report, get_months, get_report};
pub use roster::{get_roster, replace_roster};
pub use settings::{get_settings, update_settings};
pub use sync::get_sync_status;

/// Response for successful mutations
#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub detail: T,
}

impl<T: Serialize> MutationResponse<T> {
    pub fn ok(message: impl Into<String>, detail: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            detail,
        }
    }
}
