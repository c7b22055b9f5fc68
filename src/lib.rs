pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod generator;
pub mod image;
pub mod logging;
pub mod prompts;
pub mod rate_limit;
pub mod scheduler;
pub mod types;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
