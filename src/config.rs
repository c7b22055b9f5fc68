use std::env;
use tracing::warn;

use crate::error::GenerationError;

pub const DEFAULT_PERPLEXITY_API_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_UNSPLASH_API_URL: &str = "https://api.unsplash.com";

/// Process-wide configuration, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub perplexity_api_key: String,
    pub unsplash_access_key: Option<String>,
    pub database_path: String,
    pub port: u16,
    pub perplexity_api_url: String,
    pub unsplash_api_url: String,
}

impl Config {
    /// Resolve configuration from environment variables. The content-search
    /// credential is required; without it no generation can happen at all.
    /// The image-search credential is optional and only degrades image
    /// enrichment to the placeholder fallback.
    pub fn from_env() -> Result<Self, GenerationError> {
        let perplexity_api_key = env::var("PERPLEXITY_API_KEY")
            .map_err(|_| GenerationError::Config("PERPLEXITY_API_KEY is not configured".to_string()))?;

        let unsplash_access_key = env::var("UNSPLASH_ACCESS_KEY").ok();
        if unsplash_access_key.is_none() {
            warn!("UNSPLASH_ACCESS_KEY not set; news posts will use placeholder images");
        }

        let database_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "gazette.db".to_string());

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        let perplexity_api_url =
            env::var("PERPLEXITY_API_URL").unwrap_or_else(|_| DEFAULT_PERPLEXITY_API_URL.to_string());
        let unsplash_api_url =
            env::var("UNSPLASH_API_URL").unwrap_or_else(|_| DEFAULT_UNSPLASH_API_URL.to_string());

        Ok(Config {
            perplexity_api_key,
            unsplash_access_key,
            database_path,
            port,
            perplexity_api_url,
            unsplash_api_url,
        })
    }
}
