//! Document assembly helpers shared by the engines and the HTTP layer.
//!
//! - [`page_css`] turns [`RenderOptions`] into an `@page` rule
//! - [`inject_styles`] embeds stylesheet texts into the HTML head
//! - [`img_sources`] lists `<img src>` references for engines that load
//!   images themselves
//! - [`safe_filename`] / [`download_filename`] build `Content-Disposition`
//!   names

use crate::request::RenderOptions;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Page rules ───────────────────────────────────────────────────────────────

/// Synthesise an `@page` rule from the options, or `None` when the options
/// leave page geometry to the document.
pub fn page_css(options: &RenderOptions) -> Option<String> {
    if !options.has_page_rules() {
        return None;
    }

    let mut decls = Vec::new();
    match (options.page_size, options.landscape) {
        (Some(size), true) => decls.push(format!("size: {} landscape;", size.css_name())),
        (Some(size), false) => decls.push(format!("size: {};", size.css_name())),
        (None, true) => decls.push("size: landscape;".to_string()),
        (None, false) => {}
    }
    if let Some(margin) = options.margin_mm {
        decls.push(format!("margin: {margin}mm;"));
    }

    Some(format!("@page {{ {} }}", decls.join(" ")))
}

// ── Style injection ──────────────────────────────────────────────────────────

static RE_HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static RE_DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<!doctype[^>]*>").unwrap());
static RE_STYLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</style").unwrap());

/// Embed `sheets` as `<style>` blocks, in order, at the end of `<head>`.
///
/// Documents without a `<head>` get the blocks right after the doctype (or at
/// the very start). A `</style` sequence inside CSS text is neutralised so a
/// sheet cannot close its own block.
pub fn inject_styles(html: &str, sheets: &[String]) -> String {
    if sheets.is_empty() {
        return html.to_string();
    }

    let block: String = sheets
        .iter()
        .map(|css| {
            format!(
                "<style>\n{}\n</style>\n",
                RE_STYLE_CLOSE.replace_all(css, r"<\/style")
            )
        })
        .collect();

    let at = RE_HEAD_CLOSE
        .find(html)
        .map(|m| m.start())
        .or_else(|| RE_DOCTYPE.find(html).map(|m| m.end()))
        .unwrap_or(0);

    let mut out = String::with_capacity(html.len() + block.len());
    out.push_str(&html[..at]);
    out.push_str(&block);
    out.push_str(&html[at..]);
    out
}

// ── Image references ─────────────────────────────────────────────────────────

// `src` must follow whitespace or a quote so `data-src` is not taken for it.
static RE_IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?[\s"'/]src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

/// Distinct `<img src>` values in document order.
pub fn img_sources(html: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in RE_IMG_SRC.captures_iter(html) {
        let src = match caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            Some(m) => m.as_str().trim().to_string(),
            None => continue,
        };
        if !src.is_empty() && !seen.contains(&src) {
            seen.push(src);
        }
    }
    seen
}

// ── Download names ───────────────────────────────────────────────────────────

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Collapse anything outside `[A-Za-z0-9_-]` to `_`; empty results become
/// `"report"`.
pub fn safe_filename(name: &str) -> String {
    let replaced = RE_UNSAFE.replace_all(name.trim(), "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<safe name>.pdf`, tolerating a hint that already ends in `.pdf`.
pub fn download_filename(hint: Option<&str>) -> String {
    let stem = hint
        .map(|h| {
            let h = h.trim();
            h.strip_suffix(".pdf")
                .or_else(|| h.strip_suffix(".PDF"))
                .unwrap_or(h)
        })
        .unwrap_or("document");
    format!("{}.pdf", safe_filename(stem))
}
