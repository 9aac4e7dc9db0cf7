use crate::error::{ErrorBody, ErrorKind, GatewayError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error type returned by every route handler.
#[derive(Debug)]
pub enum ApiError {
    Gateway(GatewayError),
    Unauthorized,
}

#[derive(Serialize)]
struct UnauthorizedBody {
    error: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Gateway(e) => status_for(e.kind()),
        }
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::ResourceFetchFailure => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::RenderingFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Unauthorized => {
                (status, Json(UnauthorizedBody { error: "Unauthorized" })).into_response()
            }
            // Already logged where the failure was classified.
            ApiError::Gateway(e) => (status, Json(ErrorBody::from(&e))).into_response(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}
