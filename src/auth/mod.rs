//! Request guards.
//!
//! Internal routes are protected by a pre-shared key compared in constant
//! time. Public routes are guarded against Tor2Web proxies, which expose
//! the onion service on the clear web.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::AppState;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header added by Tor2Web gateways.
pub const TOR2WEB_HEADER: &str = "x-tor2web";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // Without a configured PSK the internal routes are open (devel setups)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                tracing::warn!("Rejected internal request with invalid API key");
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

/// Reject requests relayed by Tor2Web unless the node allows them.
pub async fn transport_security_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !request.headers().contains_key(TOR2WEB_HEADER) {
        return next.run(request).await;
    }

    match state.repo.get_node_settings().await {
        Ok(settings) if settings.tor2web_unauth => next.run(request).await,
        Ok(_) => {
            tracing::info!("Blocked Tor2Web request to {}", request.uri().path());
            AppError::Forbidden("Tor2Web access is not allowed".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}
