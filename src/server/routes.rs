use super::error::ApiError;
use super::AppState;
use crate::error::{GatewayError, ResourceIssue};
use crate::output::ConversionResult;
use crate::pipeline::document::download_filename;
use crate::report::{build_report_html, generated_at_now, ReportPayload};
use crate::request::{ConversionRequest, MediaType, PageSize, RenderOptions, StylesheetSource};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const ENGINE_HEADER: HeaderName = HeaderName::from_static("x-render-engine");
const WARNINGS_HEADER: HeaderName = HeaderName::from_static("x-render-warnings");

/// Query parameters of `POST /render`.
///
/// `filename` applies to every body type; the rest only describe raw HTML
/// bodies (a JSON body carries its own settings).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderQuery {
    pub base_url: Option<String>,
    pub stylesheet: Option<String>,
    pub page_size: Option<PageSize>,
    pub landscape: Option<bool>,
    pub media: Option<MediaType>,
    pub filename: Option<String>,
}

/// Query parameters of `POST /render_b64`.
#[derive(Debug, Default, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Base64Pdf {
    pub filename: String,
    pub mime: &'static str,
    pub data: String,
    pub byte_length: usize,
    pub warnings: Vec<ResourceIssue>,
}

pub async fn ping(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "engine": state.gateway.engine_name() }))
}

pub async fn render(
    State(state): State<AppState>,
    query: Result<Query<RenderQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    let request = if is_json(&headers) {
        parse_json::<ConversionRequest>(&body)?
    } else {
        html_request(&body, &query)?
    };

    let result = state.gateway.render(request).await?;
    Ok(pdf_response(result, download_filename(query.filename.as_deref())))
}

pub async fn render_b64(
    State(state): State<AppState>,
    query: Result<Query<FilenameQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<Base64Pdf>, ApiError> {
    let Query(query) = query.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let request = parse_json::<ConversionRequest>(&body)?;

    let result = state.gateway.render(request).await?;
    let warnings = result.warnings().to_vec();
    let mime = result.content_type();
    let bytes = result.into_bytes();

    Ok(Json(Base64Pdf {
        filename: download_filename(query.filename.as_deref()),
        mime,
        byte_length: bytes.len(),
        data: STANDARD.encode(&bytes),
        warnings,
    }))
}

pub async fn report(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let payload = parse_json::<ReportPayload>(&body)?;
    let filename = download_filename(Some(payload.download_stem()));

    let html = build_report_html(payload, &generated_at_now())?;
    let result = state.gateway.render(ConversionRequest::new(html)).await?;
    Ok(pdf_response(result, filename))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid JSON body: {e}")))
}

fn html_request(body: &[u8], query: &RenderQuery) -> Result<ConversionRequest, GatewayError> {
    let html = std::str::from_utf8(body)
        .map_err(|_| GatewayError::InvalidRequest("HTML body is not valid UTF-8".into()))?;

    Ok(ConversionRequest {
        html: html.to_string(),
        base_url: query.base_url.clone(),
        stylesheets: query
            .stylesheet
            .iter()
            .map(|url| StylesheetSource::Url(url.clone()))
            .collect(),
        options: RenderOptions {
            page_size: query.page_size,
            landscape: query.landscape.unwrap_or(false),
            media: query.media.unwrap_or_default(),
            ..Default::default()
        },
    })
}

fn pdf_response(result: ConversionResult, filename: String) -> Response {
    let headers = [
        (header::CONTENT_TYPE, result.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
        (ENGINE_HEADER, result.engine().to_string()),
        (WARNINGS_HEADER, result.warnings().len().to_string()),
    ];
    (StatusCode::OK, headers, result.into_bytes()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn detects_json_content_types() {
        let mut h = HeaderMap::new();
        assert!(!is_json(&h));
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&h));
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        assert!(is_json(&h));
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(!is_json(&h));
    }

    #[test]
    fn raw_html_request_takes_query_options() {
        let query = RenderQuery {
            base_url: Some("https://example.com/".into()),
            stylesheet: Some("print.css".into()),
            page_size: Some(PageSize::Letter),
            landscape: Some(true),
            ..Default::default()
        };
        let req = html_request(b"<p>hi</p>", &query).unwrap();
        assert_eq!(req.html, "<p>hi</p>");
        assert_eq!(req.base_url.as_deref(), Some("https://example.com/"));
        assert_eq!(req.stylesheets, vec![StylesheetSource::Url("print.css".into())]);
        assert_eq!(req.options.page_size, Some(PageSize::Letter));
        assert!(req.options.landscape);
        assert_eq!(req.options.media, MediaType::Print);
    }

    #[test]
    fn non_utf8_body_is_invalid_request() {
        let err = html_request(&[0xff, 0xfe, 0x00], &RenderQuery::default()).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
}
