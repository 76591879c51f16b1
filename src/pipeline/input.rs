//! Input resolution: turn a template reference into document text.
//!
//! Templates come from three places: a remote URL (the usual case for the
//! HTTP API, where artwork lives on a CDN), a local file (CLI use) or inline
//! text in the request body. All three end in the same check: the text must
//! look like an SVG document before anything else touches it.

use crate::config::RenderConfig;
use crate::error::FlyerError;
use crate::pipeline::sanitize::check_document;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// `Accept` header sent when fetching a template.
pub const DOCUMENT_ACCEPT: &str = "image/svg+xml, text/xml, application/xml, text/plain, */*";

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// `http(s)://` URL, fetched with the document timeout.
    Url(String),
    /// Local file path.
    File(PathBuf),
    /// Document text supplied directly.
    Inline(String),
}

impl TemplateSource {
    /// Interpret a CLI-style argument: URLs stay URLs, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if is_url(arg) {
            TemplateSource::Url(arg.to_string())
        } else {
            TemplateSource::File(PathBuf::from(arg))
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            TemplateSource::Url(u) => u.clone(),
            TemplateSource::File(p) => p.display().to_string(),
            TemplateSource::Inline(s) => format!("<inline, {} bytes>", s.len()),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Remote bytes plus the declared content type.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP client for templates and embedded images.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    document_timeout_secs: u64,
    image_timeout_secs: u64,
}

impl Fetcher {
    pub fn new(config: &RenderConfig) -> Result<Self, FlyerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FlyerError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            document_timeout_secs: config.document_fetch_timeout_secs,
            image_timeout_secs: config.image_fetch_timeout_secs,
        })
    }

    /// Fetch a template and check it is an SVG document.
    pub async fn fetch_document(&self, url: &str) -> Result<String, FlyerError> {
        info!("Fetching template from: {}", url);
        let fetched = self
            .get(url, DOCUMENT_ACCEPT, self.document_timeout_secs)
            .await?;
        let text = String::from_utf8(fetched.bytes).map_err(|_| FlyerError::InvalidDocument {
            reason: format!("'{url}' is not valid UTF-8 text"),
        })?;
        check_document(&text)?;
        debug!("Fetched template: {} bytes", text.len());
        Ok(text)
    }

    /// Fetch an image referenced from a document.
    pub async fn fetch_image(&self, url: &str) -> Result<Fetched, FlyerError> {
        self.get(url, "image/*, */*", self.image_timeout_secs).await
    }

    async fn get(&self, url: &str, accept: &str, timeout_secs: u64) -> Result<Fetched, FlyerError> {
        reqwest::Url::parse(url)
            .map_err(|e| FlyerError::InvalidRequest(format!("Invalid URL '{url}': {e}")))?;

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FlyerError::Timeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                FlyerError::FetchFailed {
                    url: url.to_string(),
                    status: None,
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .header(CACHE_CONTROL, "no-cache")
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlyerError::FetchFailed {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(map_err)?;

        Ok(Fetched {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Resolve a template source to validated document text.
pub async fn resolve_source(source: &TemplateSource, fetcher: &Fetcher) -> Result<String, FlyerError> {
    match source {
        TemplateSource::Url(url) => fetcher.fetch_document(url).await,
        TemplateSource::File(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FlyerError::TemplateReadFailed {
                    path: path.clone(),
                    source,
                })?;
            check_document(&text)?;
            debug!("Read template: {}", path.display());
            Ok(text)
        }
        TemplateSource::Inline(text) => {
            check_document(text)?;
            Ok(text.clone())
        }
    }
}
