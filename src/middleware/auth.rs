//! HTTP Basic authentication against a single configured credential pair.
//!
//! `/health` stays open for load balancer checks. Every other request must
//! carry `Authorization: Basic <base64(user:pass)>`. The authenticated user
//! name is attached to the request as [`AuthenticatedUser`].

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::state::AppState;

const CHALLENGE: &str = "Basic realm=\"Restricted Area\"";

/// Static credential pair accepted by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Compare both parts without short-circuiting.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

/// Name of the user that passed authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Pad both sides to the same length so the comparison time does not
/// depend on where the inputs differ.
fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// Decode a `Basic` authorization header into (user, password).
pub fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?.trim();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, pass) = credentials.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn challenge(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
        Json(json!({ "error": message })),
    )
        .into_response()
}

pub async fn basic_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = header_value.filter(|v| v.starts_with("Basic ")) else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Basic authorization header"
        );
        return challenge("Authentication required.");
    };

    match decode_basic(header_value) {
        Some((user, pass)) if state.credentials.matches(&user, &pass) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        _ => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_credentials",
                "Authentication failed: invalid credentials"
            );
            challenge("Invalid credentials.")
        }
    }
}
