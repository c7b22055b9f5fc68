//! Content-fetch client for the Perplexity search API.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::GenerationError;
use crate::prompts;
use crate::TARGET_LLM_REQUEST;

/// Hard cap on one content-search request. A timeout is a recoverable
/// per-group failure, not fatal to the whole run.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Bound on the secondary one-token keyword call.
pub const KEYWORD_TIMEOUT_SECS: u64 = 10;

const SEARCH_MODEL: &str = "sonar-pro";

/// Seam over the content-search LLM so the orchestrator can be driven by
/// canned responses in tests.
#[allow(async_fn_in_trait)]
pub trait ArticleSource {
    /// One search request for `count` fresh articles about `prompt`,
    /// restricted to `source_domains`. Returns the raw free-text response;
    /// parsing is the extractor's job.
    async fn fetch_articles(
        &self,
        prompt: &str,
        count: i64,
        source_domains: &[String],
    ) -> Result<String, GenerationError>;

    /// Derive a single lowercase image-search keyword for a headline.
    async fn derive_keyword(&self, title: &str) -> Result<String, GenerationError>;
}

pub struct PerplexityClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PerplexityClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        PerplexityClient {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn chat_completion(&self, payload: &Value) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(target: TARGET_LLM_REQUEST, "Perplexity API error: status {} - {}", status, body);
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let data: Value = response.json().await?;
        let content = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str());

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(GenerationError::Parse(
                "no completion content in response".to_string(),
            )),
        }
    }
}

impl ArticleSource for PerplexityClient {
    async fn fetch_articles(
        &self,
        prompt: &str,
        count: i64,
        source_domains: &[String],
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "model": SEARCH_MODEL,
            "messages": [
                { "role": "system", "content": prompts::NEWS_SYSTEM_PROMPT },
                { "role": "user", "content": prompts::news_query_prompt(prompt, count) }
            ],
            "temperature": 0.1,
            "top_p": 0.9,
            "max_tokens": 3000,
            "return_images": false,
            "return_related_questions": false,
            "search_recency_filter": "day",
            "frequency_penalty": 1,
            "presence_penalty": 0,
            "search_domain_filter": source_domains,
        });

        info!(target: TARGET_LLM_REQUEST, "Requesting {} articles about: {}", count, prompt);
        debug!(target: TARGET_LLM_REQUEST, "Domain filter: {:?}", source_domains);

        match timeout(
            Duration::from_secs(FETCH_TIMEOUT_SECS),
            self.chat_completion(&payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(target: TARGET_LLM_REQUEST, "Content fetch timed out after {}s", FETCH_TIMEOUT_SECS);
                Err(GenerationError::Timeout(FETCH_TIMEOUT_SECS))
            }
        }
    }

    async fn derive_keyword(&self, title: &str) -> Result<String, GenerationError> {
        let payload = json!({
            "model": SEARCH_MODEL,
            "messages": [
                { "role": "user", "content": prompts::keyword_prompt(title) }
            ],
            "temperature": 0.0,
            "max_tokens": 10,
        });

        let raw = timeout(
            Duration::from_secs(KEYWORD_TIMEOUT_SECS),
            self.chat_completion(&payload),
        )
        .await
        .map_err(|_| GenerationError::Timeout(KEYWORD_TIMEOUT_SECS))??;

        let keyword: String = raw
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if keyword.is_empty() {
            return Err(GenerationError::Parse(
                "keyword response contained no usable token".to_string(),
            ));
        }

        debug!(target: TARGET_LLM_REQUEST, "Derived keyword '{}' for title: {}", keyword, title);
        Ok(keyword)
    }
}
