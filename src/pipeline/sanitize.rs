//! Document validation, sanitisation and sizing-box normalisation.
//!
//! Templates arrive from arbitrary URLs and request bodies, so every document
//! is scrubbed of active content before substitution and once more right
//! before it is handed to the rasteriser.
//!
//! ## Rule Order
//!
//! Element removal runs before attribute removal so a handler on a removed
//! element is not scanned twice. The whole set is repeated until the output
//! stops changing: removing `<scr<script></script>ipt>` leaves a fresh
//! `<script>` behind, which the next round catches.

use crate::error::FlyerError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

/// Upper bound on sanitisation rounds. Each round strictly shrinks the input,
/// so this is only reached by adversarial nesting.
const MAX_ROUNDS: usize = 32;

/// `true` when `document` is non-blank and has an `<svg` opening tag followed
/// by a `</svg>` closing tag.
pub fn validate_document(document: &str) -> bool {
    check_document(document).is_ok()
}

/// Like [`validate_document`] but says what is wrong.
pub fn check_document(document: &str) -> Result<(), FlyerError> {
    if document.trim().is_empty() {
        return Err(FlyerError::InvalidDocument {
            reason: "document is empty".into(),
        });
    }
    let Some(open) = document.find("<svg") else {
        return Err(FlyerError::InvalidDocument {
            reason: "missing <svg> tag".into(),
        });
    };
    if !document[open..].contains("</svg>") {
        return Err(FlyerError::InvalidDocument {
            reason: "missing closing </svg> tag".into(),
        });
    }
    Ok(())
}

/// Remove scripts, event handlers, `javascript:` links and embedded
/// browsing contexts.
pub fn sanitize_document(document: &str) -> String {
    let mut current = document.to_string();
    for round in 1..=MAX_ROUNDS {
        let next = sanitize_once(&current);
        if next == current {
            if round > 1 {
                debug!("Sanitised document in {} rounds", round - 1);
            }
            return next;
        }
        current = next;
    }
    current
}

fn sanitize_once(input: &str) -> String {
    let s = remove_scripts(input);
    let s = remove_embedded_contexts(&s);
    let s = remove_dangling_tags(&s);
    scrub_tag_attributes(&s)
}

// ── Rule 1: Script elements ──────────────────────────────────────────────────

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

fn remove_scripts(input: &str) -> String {
    RE_SCRIPT.replace_all(input, "").to_string()
}

// ── Rule 2: iframe / object / embed ──────────────────────────────────────────

// One alternative per element: the regex crate has no backreferences.
static RE_EMBEDDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<iframe\b[^>]*>.*?</iframe\s*>|<object\b[^>]*>.*?</object\s*>|<embed\b[^>]*>.*?</embed\s*>",
    )
    .unwrap()
});

fn remove_embedded_contexts(input: &str) -> String {
    RE_EMBEDDED.replace_all(input, "").to_string()
}

// ── Rule 3: Self-closing, unclosed or stray tags of removed elements ─────────

static RE_DANGLING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?\s*(?:script|iframe|object|embed)\b[^>]*>").unwrap());

fn remove_dangling_tags(input: &str) -> String {
    RE_DANGLING.replace_all(input, "").to_string()
}

// ── Rule 4: Event handlers and javascript: links inside tags ─────────────────

// Quoted values may contain a literal `>`.
static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<[A-Za-z](?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap());

static RE_EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)[\s/]+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static RE_JAVASCRIPT_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)[\s/]+(?:xlink:)?href\s*=\s*(?:"\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]*)"#,
    )
    .unwrap()
});

/// Attribute rules only apply within a tag so text content such as
/// "online=yes" survives untouched.
fn scrub_tag_attributes(input: &str) -> String {
    RE_TAG
        .replace_all(input, |caps: &Captures| {
            let tag = &caps[0];
            let tag = RE_EVENT_HANDLER.replace_all(tag, "");
            RE_JAVASCRIPT_HREF.replace_all(&tag, "").into_owned()
        })
        .into_owned()
}

// ── Sizing box ───────────────────────────────────────────────────────────────

static RE_ROOT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<svg\b[^>]*>").unwrap());
static RE_VIEWBOX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\sviewBox\s*=").unwrap());
static RE_WIDTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\swidth\s*=\s*["']?\s*([0-9]*\.?[0-9]+)\s*(?:px)?\s*["'\s/>]"#).unwrap()
});
static RE_HEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\sheight\s*=\s*["']?\s*([0-9]*\.?[0-9]+)\s*(?:px)?\s*["'\s/>]"#).unwrap()
});

/// Numeric `width` / `height` of the root `<svg>` tag, in user units.
///
/// Percentages and other units are treated as absent.
pub fn root_dimensions(document: &str) -> (Option<f64>, Option<f64>) {
    let Some(root) = RE_ROOT_TAG.find(document) else {
        return (None, None);
    };
    let tag = root.as_str();
    let parse = |re: &Regex| {
        re.captures(tag)
            .and_then(|c| c[1].parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    };
    (parse(&RE_WIDTH), parse(&RE_HEIGHT))
}

/// Give the root element a `viewBox` when it has none.
///
/// The box comes from the root's numeric `width`/`height`, falling back to
/// `default_width` × `default_height`. Documents that already carry a
/// `viewBox`, or have no root tag, are returned unchanged.
pub fn normalize_dimensions(document: &str, default_width: u32, default_height: u32) -> String {
    let Some(root) = RE_ROOT_TAG.find(document) else {
        return document.to_string();
    };
    if RE_VIEWBOX.is_match(root.as_str()) {
        return document.to_string();
    }

    let (w, h) = root_dimensions(document);
    let w = w.unwrap_or(f64::from(default_width));
    let h = h.unwrap_or(f64::from(default_height));
    debug!("Synthesising viewBox 0 0 {} {}", w, h);

    // Insert right after "<svg".
    let at = root.start() + 4;
    let mut out = String::with_capacity(document.len() + 32);
    out.push_str(&document[..at]);
    out.push_str(&format!(r#" viewBox="0 0 {} {}""#, fmt_number(w), fmt_number(h)));
    out.push_str(&document[at..]);
    out
}

fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── validation ──────────────────────────────────────────────────────────

    #[test]
    fn accepts_minimal_document() {
        assert!(validate_document("<svg></svg>"));
        assert!(validate_document(
            r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#
        ));
    }

    #[test]
    fn rejects_non_documents() {
        assert!(!validate_document(""));
        assert!(!validate_document("   \n"));
        assert!(!validate_document("<html><body>hi</body></html>"));
        assert!(!validate_document("<svg><rect/>"));
        assert!(!validate_document("</svg><svg>"));
    }

    #[test]
    fn check_document_explains_rejection() {
        let err = check_document("<svg>").unwrap_err();
        assert!(err.to_string().contains("</svg>"), "{err}");
    }

    // ── sanitisation ────────────────────────────────────────────────────────

    #[test]
    fn removes_script_elements() {
        let out = sanitize_document(r#"<svg><script>alert(1)</script><rect/></svg>"#);
        assert_eq!(out, "<svg><rect/></svg>");
    }

    #[test]
    fn removes_self_closing_and_unclosed_scripts() {
        assert_eq!(sanitize_document(r#"<svg><script href="x.js"/></svg>"#), "<svg></svg>");
        assert_eq!(sanitize_document("<svg><SCRIPT>x</svg>"), "<svg>x</svg>");
    }

    #[test]
    fn nested_script_does_not_reassemble() {
        let out = sanitize_document("<svg><scr<script></script>ipt>alert(1)</script></svg>");
        assert!(!out.to_lowercase().contains("<script"), "{out}");
    }

    #[test]
    fn removes_event_handlers_in_any_quoting() {
        let out = sanitize_document(
            r#"<svg onload="evil()"><rect onclick='x()' onmouseover=y() width="5"/></svg>"#,
        );
        assert_eq!(out, r#"<svg><rect width="5"/></svg>"#);
    }

    #[test]
    fn handler_after_quoted_angle_bracket_is_removed() {
        let out = sanitize_document(r#"<svg><rect title="a>b" onload="alert(1)"/></svg>"#);
        assert!(!out.contains("onload"), "{out}");
        assert!(out.contains(r#"title="a>b""#), "{out}");
    }

    #[test]
    fn slash_separated_handler_is_removed() {
        let out = sanitize_document(r#"<svg/onload="alert(1)"><rect/></svg>"#);
        assert!(!out.contains("onload"), "{out}");
        assert_eq!(out, "<svg><rect/></svg>");

        let out = sanitize_document(r#"<svg><a/href="javascript:alert(1)">x</a></svg>"#);
        assert!(!out.contains("javascript:"), "{out}");
    }

    #[test]
    fn keeps_handler_like_text_content() {
        let doc = "<svg><text>online=yes onboarding</text></svg>";
        assert_eq!(sanitize_document(doc), doc);
    }

    #[test]
    fn removes_embedded_contexts() {
        let out = sanitize_document(
            r#"<svg><iframe src="x"></iframe><object data="y">fallback</object><embed src="z"/><rect/></svg>"#,
        );
        assert_eq!(out, "<svg><rect/></svg>");
    }

    #[test]
    fn removes_javascript_links() {
        let out = sanitize_document(r#"<svg><a xlink:href="javascript:alert(1)"><text>x</text></a></svg>"#);
        assert_eq!(out, "<svg><a><text>x</text></a></svg>");
    }

    #[test]
    fn sanitising_is_stable() {
        let doc = r#"<svg><rect fill="red"/><text>dyno.title</text></svg>"#;
        assert_eq!(sanitize_document(doc), doc);
        assert_eq!(sanitize_document(&sanitize_document(doc)), doc);
    }

    // ── sizing box ──────────────────────────────────────────────────────────

    #[test]
    fn injects_viewbox_from_root_size() {
        let out = normalize_dimensions(r#"<svg width="800" height="600"><rect/></svg>"#, 1080, 1350);
        assert_eq!(out, r#"<svg viewBox="0 0 800 600" width="800" height="600"><rect/></svg>"#);
    }

    #[test]
    fn falls_back_to_default_size() {
        let out = normalize_dimensions("<svg><rect/></svg>", 1080, 1350);
        assert_eq!(out, r#"<svg viewBox="0 0 1080 1350"><rect/></svg>"#);
    }

    #[test]
    fn percentage_size_counts_as_absent() {
        let out = normalize_dimensions(r#"<svg width="100%" height="50px"></svg>"#, 1080, 1350);
        assert!(out.contains(r#"viewBox="0 0 1080 50""#), "{out}");
    }

    #[test]
    fn existing_viewbox_untouched() {
        let doc = r#"<svg viewBox="0 0 10 10" width="20"></svg>"#;
        assert_eq!(normalize_dimensions(doc, 1080, 1350), doc);
    }

    #[test]
    fn only_root_tag_is_inspected() {
        let doc = r#"<svg><svg viewBox="0 0 5 5" width="5"/></svg>"#;
        let out = normalize_dimensions(doc, 100, 200);
        assert!(out.starts_with(r#"<svg viewBox="0 0 100 200">"#), "{out}");
    }

    #[test]
    fn fractional_dimensions_kept() {
        assert_eq!(root_dimensions(r#"<svg width="10.5" height='20'>"#), (Some(10.5), Some(20.0)));
    }
}
