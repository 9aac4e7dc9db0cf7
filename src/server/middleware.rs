use super::error::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use uuid::Uuid;

/// Header carrying the API key on protected routes.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header set on every response so clients can quote it in bug reports.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reject requests whose `X-API-Key` does not match the configured key.
///
/// A no-op when no key is configured.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            tracing::warn!(path = %req.uri().path(), "rejected request without a valid API key");
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}

/// Access logging middleware.
///
/// Tags each request with a v4 UUID, logs one structured event when the
/// response is ready and echoes the id in `X-Request-Id`.
pub async fn access_log(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "api_request"
    );

    response
}
