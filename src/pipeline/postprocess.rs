//! Post-substitution steps applied before rasterisation.
//!
//! Each [`PostStep`] is one pass over the substituted document. `Clean` and
//! `Minify` are pure string rewrites; `EmbedImages` is the only step with
//! network I/O, because the rasteriser resolves nothing remote on its own and
//! would silently drop `<image href="https://...">` elements.
//!
//! ## Step Order
//!
//! Steps run in the order configured. The default is `[Clean]`; put
//! `EmbedImages` last so the fetched base64 payloads are not pushed through
//! the whitespace rules.

use crate::config::PostStep;
use crate::error::FlyerError;
use crate::pipeline::encode::data_url;
use crate::pipeline::input::Fetcher;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Apply `steps` to `document` in order.
pub async fn apply_post_steps(
    document: String,
    steps: &[PostStep],
    fetcher: &Fetcher,
) -> Result<String, FlyerError> {
    let mut doc = document;
    for step in steps {
        let before = doc.len();
        doc = match step {
            PostStep::Clean => clean_document(&doc),
            PostStep::Minify => minify_document(&doc),
            PostStep::EmbedImages => embed_images(&doc, fetcher).await?,
        };
        debug!("Post step {:?}: {} → {} bytes", step, before, doc.len());
    }
    Ok(doc)
}

// ── Step 1: Clean ────────────────────────────────────────────────────────────

static RE_XML_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());
static RE_DOCTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<!DOCTYPE[^>\[]*(?:\[.*?\])?\s*>").unwrap());
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Strip the XML declaration, DOCTYPE and comments, then trim.
pub fn clean_document(input: &str) -> String {
    let s = RE_XML_DECL.replace_all(input, "");
    let s = RE_DOCTYPE.replace_all(&s, "");
    let s = RE_COMMENT.replace_all(&s, "");
    s.trim().to_string()
}

// ── Step 2: Minify ───────────────────────────────────────────────────────────

// Indentation between tags always spans a line break; a lone space between
// two `<tspan>`s is content and must survive.
static RE_INDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s*\n\s*<").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());
static RE_EMPTY_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s[A-Za-z_:][\w:.-]*\s*=\s*(?:""|'')"#).unwrap());

/// Drop comments and indentation, collapse whitespace runs, remove empty
/// attributes.
pub fn minify_document(input: &str) -> String {
    let s = RE_COMMENT.replace_all(input, "");
    let s = RE_INDENT.replace_all(&s, "><");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    let s = RE_EMPTY_ATTR.replace_all(&s, "");
    s.trim().to_string()
}

// ── Step 3: Embed remote images ──────────────────────────────────────────────

static RE_IMAGE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)(<image\b[^>]*?\s(?:xlink:)?href\s*=\s*)(["'])(https?://[^"']+)(["'])"#)
        .unwrap()
});

/// Remote `http(s)` image URLs referenced by `<image>` elements, deduplicated.
pub fn remote_image_urls(document: &str) -> Vec<String> {
    let mut urls: Vec<String> = RE_IMAGE_HREF
        .captures_iter(document)
        .map(|c| c[3].to_string())
        .collect();
    urls.sort();
    urls.dedup();
    urls
}

/// Inline every remote `<image>` as a base64 `data:` URI.
///
/// An image that cannot be fetched keeps its original href and is logged;
/// the rasteriser then renders the rest of the flyer without it.
pub async fn embed_images(document: &str, fetcher: &Fetcher) -> Result<String, FlyerError> {
    let urls = remote_image_urls(document);
    if urls.is_empty() {
        return Ok(document.to_string());
    }

    let mut inlined: BTreeMap<String, String> = BTreeMap::new();
    for url in &urls {
        match fetcher.fetch_image(url).await {
            Ok(fetched) => {
                let mime = sniff_mime(&fetched.bytes, fetched.content_type.as_deref());
                debug!("Embedding {} ({}, {} bytes)", url, mime, fetched.bytes.len());
                inlined.insert(url.clone(), data_url(&mime, &fetched.bytes));
            }
            Err(e) => warn!("Leaving image unembedded: {}", e),
        }
    }

    let out = RE_IMAGE_HREF.replace_all(document, |caps: &Captures| match inlined.get(&caps[3]) {
        Some(uri) => format!("{}{}{}{}", &caps[1], &caps[2], uri, &caps[4]),
        None => caps[0].to_string(),
    });
    Ok(out.into_owned())
}

/// MIME type from the image bytes, then the declared content type.
fn sniff_mime(bytes: &[u8], declared: Option<&str>) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        return "image/svg+xml".to_string();
    }
    declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_string())
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
