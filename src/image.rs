//! Image enrichment: one landscape photo per article, with a deterministic
//! placeholder fallback so a post is never published without an image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::fetch::ArticleSource;
use crate::types::CandidateArticle;
use crate::TARGET_WEB_REQUEST;

/// Bound on one image-search request. Image enrichment sits inside the
/// per-article loop, so an unbounded call here could stall a whole group.
pub const IMAGE_TIMEOUT_SECS: u64 = 10;

const PLACEHOLDER_WIDTH: u32 = 1024;
const PLACEHOLDER_HEIGHT: u32 = 576;

/// Seam over the image-search API.
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    /// One landscape photo URL for `keyword`, or `None` when the provider
    /// is unavailable or has nothing to offer.
    async fn search_photo(&self, keyword: &str) -> Result<Option<String>, GenerationError>;
}

pub struct UnsplashClient {
    client: reqwest::Client,
    access_key: Option<String>,
    base_url: String,
}

impl UnsplashClient {
    pub fn new(access_key: Option<&str>, base_url: &str) -> Self {
        UnsplashClient {
            client: reqwest::Client::new(),
            access_key: access_key.map(|k| k.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ImageSource for UnsplashClient {
    async fn search_photo(&self, keyword: &str) -> Result<Option<String>, GenerationError> {
        let access_key = match &self.access_key {
            Some(key) => key,
            None => {
                debug!(target: TARGET_WEB_REQUEST, "No image-search credential; skipping photo lookup");
                return Ok(None);
            }
        };

        let response = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .query(&[
                ("query", keyword),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .header("Authorization", format!("Client-ID {}", access_key))
            .timeout(Duration::from_secs(IMAGE_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let data: Value = response.json().await?;
        let url = data
            .get("results")
            .and_then(|r| r.get(0))
            .and_then(|photo| photo.get("urls"))
            .and_then(|urls| urls.get("regular"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(url)
    }
}

/// Deterministic labeled placeholder: a fixed-size SVG graphic encoded as
/// an inline data URL, derived only from the label text.
pub fn placeholder_image(label: &str) -> String {
    let clean: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .take(40)
        .collect();
    let caption = if clean.trim().is_empty() {
        "news".to_string()
    } else {
        clean.trim().to_string()
    };

    let hue: u32 = caption.bytes().map(|b| b as u32).sum::<u32>() % 360;
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="{w}" height="{h}" fill="hsl({hue}, 45%, 30%)"/><text x="50%" y="50%" font-family="sans-serif" font-size="56" fill="#ffffff" text-anchor="middle" dominant-baseline="middle">{caption}</text></svg>"##,
        w = PLACEHOLDER_WIDTH,
        h = PLACEHOLDER_HEIGHT,
    );

    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

fn fallback_keyword(title: &str) -> String {
    let word: String = title
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    if word.is_empty() {
        "news".to_string()
    } else {
        word
    }
}

/// Resolve the single image-search keyword for an article: the keyword the
/// content fetch already produced, else a secondary one-token LLM call,
/// else the first word of the title.
async fn resolve_keyword<S: ArticleSource>(llm: &S, article: &CandidateArticle) -> String {
    if let Some(keyword) = &article.keyword {
        let trimmed = keyword.trim().to_lowercase();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }

    match llm.derive_keyword(&article.title).await {
        Ok(keyword) => keyword,
        Err(err) => {
            warn!(target: TARGET_WEB_REQUEST, "Keyword derivation failed ({}); falling back to title word", err);
            fallback_keyword(&article.title)
        }
    }
}

/// Find an image for an article. Infallible: every failure path (missing
/// credential, upstream error, empty result set) terminates in the
/// placeholder, so the returned URL is always usable.
pub async fn enrich_image<S: ArticleSource, I: ImageSource>(
    llm: &S,
    images: &I,
    article: &CandidateArticle,
) -> (String, String) {
    let keyword = resolve_keyword(llm, article).await;

    let image_url = match images.search_photo(&keyword).await {
        Ok(Some(url)) if !url.trim().is_empty() => url,
        Ok(_) => {
            debug!(target: TARGET_WEB_REQUEST, "No photo found for '{}'; using placeholder", keyword);
            placeholder_image(&keyword)
        }
        Err(err) => {
            warn!(target: TARGET_WEB_REQUEST, "Image search failed for '{}' ({}); using placeholder", keyword, err);
            placeholder_image(&keyword)
        }
    };

    (image_url, keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_deterministic_and_nonempty() {
        let a = placeholder_image("markets");
        let b = placeholder_image("markets");
        assert_eq!(a, b);
        assert!(a.starts_with("data:image/svg+xml;base64,"));
        assert!(a.len() > "data:image/svg+xml;base64,".len());
    }

    #[test]
    fn test_placeholder_differs_by_label() {
        assert_ne!(placeholder_image("markets"), placeholder_image("energy"));
    }

    #[test]
    fn test_placeholder_handles_hostile_label() {
        let url = placeholder_image("<script>\"'&");
        assert!(url.starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_fallback_keyword() {
        assert_eq!(fallback_keyword("Markets Rally On Rate News"), "markets");
        assert_eq!(fallback_keyword("\"Quoted\" headline"), "quoted");
        assert_eq!(fallback_keyword(""), "news");
    }

    #[tokio::test]
    async fn test_search_without_credential_is_none() {
        let client = UnsplashClient::new(None, "https://api.unsplash.com");
        let result = client.search_photo("markets").await.unwrap();
        assert!(result.is_none());
    }
}
