//! Stylesheet resolution: turn every [`StylesheetRef`] into CSS text.
//!
//! Inline CSS passes through, `data:` URIs are decoded, `file:` URLs are read
//! from disk and `http(s)` URLs are downloaded. Fetches run concurrently but
//! results keep request order, because cascade order matters.
//!
//! A stylesheet that cannot be loaded never aborts resolution here: it is
//! returned as a [`ResourceIssue`] and the gateway applies the configured
//! [`ResourcePolicy`](crate::config::ResourcePolicy).

use crate::error::{ResourceIssue, ResourceKind};
use crate::pipeline::validate::StylesheetRef;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use percent_encoding::percent_decode_str;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Concurrent stylesheet downloads per request.
const FETCH_CONCURRENCY: usize = 4;

/// Longest reference kept verbatim in a [`ResourceIssue`].
const MAX_REFERENCE_CHARS: usize = 96;

/// The outcome of resolving a request's stylesheets.
#[derive(Debug, Default)]
pub struct ResolvedStylesheets {
    /// CSS texts in request order, without the ones that failed.
    pub sheets: Vec<String>,
    pub issues: Vec<ResourceIssue>,
}

/// Resolve all stylesheets, preserving order.
pub async fn resolve_stylesheets(
    refs: Vec<StylesheetRef>,
    client: &reqwest::Client,
    timeout: Duration,
) -> ResolvedStylesheets {
    if refs.is_empty() {
        return ResolvedStylesheets::default();
    }

    let total = refs.len();
    let results: Vec<Result<String, ResourceIssue>> = stream::iter(
        refs.into_iter()
            .map(|sheet| async move { load_stylesheet(sheet, client, timeout).await }),
    )
    .buffered(FETCH_CONCURRENCY)
    .collect()
    .await;

    let mut resolved = ResolvedStylesheets::default();
    for result in results {
        match result {
            Ok(css) => resolved.sheets.push(css),
            Err(issue) => resolved.issues.push(issue),
        }
    }

    debug!("Resolved {}/{} stylesheets", resolved.sheets.len(), total);
    resolved
}

async fn load_stylesheet(
    sheet: StylesheetRef,
    client: &reqwest::Client,
    timeout: Duration,
) -> Result<String, ResourceIssue> {
    let issue = |reference: &str, reason: String| {
        ResourceIssue::new(ResourceKind::Stylesheet, shorten(reference), reason)
    };

    match sheet {
        StylesheetRef::Inline(css) => Ok(css),
        StylesheetRef::Data(uri) => {
            let data = decode_data_uri(&uri).map_err(|reason| issue(&uri, reason))?;
            String::from_utf8(data.bytes)
                .map_err(|_| issue(&uri, "stylesheet is not valid UTF-8".into()))
        }
        StylesheetRef::Remote(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| issue(url.as_str(), "not a local file path".into()))?;
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| issue(url.as_str(), e.to_string()))
        }
        StylesheetRef::Remote(url) => fetch_text(client, &url, timeout)
            .await
            .map_err(|reason| issue(url.as_str(), reason)),
    }
}

/// Download a text resource, treating non-2xx statuses as failures.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<String, String> {
    info!("Fetching stylesheet: {}", url);

    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}ms", timeout.as_millis())
            } else {
                e.to_string()
            }
        })?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    response.text().await.map_err(|e| e.to_string())
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode `data:[<mime>][;base64],<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<DataUri, String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data: URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data: URI has no ',' separator".to_string())?;

    let (mime, is_base64) = match meta.strip_suffix(";base64") {
        Some(m) => (m, true),
        None => (meta, false),
    };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 payload: {e}"))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(DataUri {
        mime: if mime.is_empty() {
            "text/plain".to_string()
        } else {
            mime.to_string()
        },
        bytes,
    })
}

/// Keep long references (mostly data URIs) readable in errors and logs.
pub(crate) fn shorten(reference: &str) -> String {
    if reference.chars().count() <= MAX_REFERENCE_CHARS {
        reference.to_string()
    } else {
        let head: String = reference.chars().take(MAX_REFERENCE_CHARS).collect();
        format!("{head}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_data_uri() {
        let d = decode_data_uri("data:text/css;base64,cCB7IGNvbG9yOiByZWQgfQ==").unwrap();
        assert_eq!(d.mime, "text/css");
        assert_eq!(d.bytes, b"p { color: red }");
    }

    #[test]
    fn decodes_percent_encoded_data_uri() {
        let d = decode_data_uri("data:,p%20%7B%7D").unwrap();
        assert_eq!(d.mime, "text/plain");
        assert_eq!(d.bytes, b"p {}");
    }

    #[test]
    fn malformed_data_uris_are_errors() {
        assert!(decode_data_uri("data:text/css;base64").is_err());
        assert!(decode_data_uri("data:;base64,@@@").is_err());
        assert!(decode_data_uri("https://example.com").is_err());
    }

    #[test]
    fn lone_percent_is_kept() {
        assert_eq!(decode_data_uri("data:,100%").unwrap().bytes, b"100%");
        assert_eq!(decode_data_uri("data:,%zz").unwrap().bytes, b"%zz");
        assert_eq!(decode_data_uri("data:,a%41").unwrap().bytes, b"aA");
    }

    #[test]
    fn shorten_truncates_long_references() {
        let long = format!("data:text/css,{}", "a".repeat(200));
        let s = shorten(&long);
        assert!(s.ends_with('\u{2026}'));
        assert_eq!(s.chars().count(), MAX_REFERENCE_CHARS + 1);
        assert_eq!(shorten("a.css"), "a.css");
    }

    #[tokio::test]
    async fn keeps_order_and_reports_failures() {
        let missing = Url::parse("file:///definitely/not/here/print.css").unwrap();
        let refs = vec![
            StylesheetRef::Inline("a {}".into()),
            StylesheetRef::Remote(missing.clone()),
            StylesheetRef::Data("data:,b%20%7B%7D".into()),
        ];
        let client = reqwest::Client::new();
        let resolved = resolve_stylesheets(refs, &client, Duration::from_secs(1)).await;

        assert_eq!(resolved.sheets, vec!["a {}".to_string(), "b {}".to_string()]);
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].reference, missing.as_str());
        assert_eq!(resolved.issues[0].kind, ResourceKind::Stylesheet);
    }

    #[tokio::test]
    async fn reads_local_file_stylesheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("print.css");
        std::fs::write(&path, "h1 { font-size: 20pt }").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let client = reqwest::Client::new();
        let resolved =
            resolve_stylesheets(vec![StylesheetRef::Remote(url)], &client, Duration::from_secs(1)).await;
        assert!(resolved.issues.is_empty());
        assert_eq!(resolved.sheets, vec!["h1 { font-size: 20pt }".to_string()]);
    }
}
