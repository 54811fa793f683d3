//! Basic authentication middleware
//!
//! Checks the `Authorization: Basic` header against the configured admin
//! identity. Applied to `/api` routes only; `/health` stays public.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use tracing::warn;
use tuition_common::auth::split_basic_credentials;

use crate::AppState;

const CHALLENGE: &str = "Basic realm=\"tuition\"";

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (username, password) = basic_credentials(request.headers())?;

    if !state.credentials.verify(&username, &password) {
        warn!(
            user = %username,
            path = %request.uri().path(),
            "Rejected credentials"
        );
        return Err(AuthError::InvalidCredentials);
    }

    Ok(next.run(request).await)
}

fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    let encoded = value
        .strip_prefix("Basic ")
        .ok_or(AuthError::Malformed)?
        .trim();
    let decoded = STANDARD.decode(encoded).map_err(|_| AuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;

    let (username, password) = split_basic_credentials(&decoded).ok_or(AuthError::Malformed)?;
    Ok((username.to_string(), password.to_string()))
}

/// Authentication failures; all map to 401 with a basic challenge
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    Malformed,
    InvalidCredentials,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingCredentials => "Authentication required",
            AuthError::Malformed => "Malformed basic authorization header",
            AuthError::InvalidCredentials => "Invalid username or password",
        };

        let body = Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": message,
            }
        }));

        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(CHALLENGE),
        );
        response
    }
}
