//! Prompt builders for the content-search and keyword LLM calls.

/// Default outlet allow-list used when a group has no custom source list.
pub const DEFAULT_NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "techcrunch.com",
    "cnn.com",
    "bbc.com",
    "wsj.com",
    "ft.com",
    "nasdaq.com",
    "marketwatch.com",
];

/// System instruction constraining the search model to emit strict JSON.
/// The extractor repairs the common violations anyway, but asking first
/// keeps the repair path the exception rather than the rule.
pub const NEWS_SYSTEM_PROMPT: &str = r#"You are a news curator. Always include the full source URL for each article. Focus on recent, credible news sources.

Output requirements:
1. Return ONLY a JSON array, with no explanation and no markdown code fences.
2. Use standard ASCII double quotes for all strings - never typographic quotes.
3. Do not leave trailing commas before closing brackets or braces.
4. Every article must include all requested fields."#;

/// User instruction requesting `count` fresh articles about `topic`.
pub fn news_query_prompt(topic: &str, count: i64) -> String {
    format!(
        r#"Find the {count} most recent news articles about: {topic}.

For each article you find, return a JSON object with these exact fields:
- title: catchy headline (max 80 chars)
- url: complete source URL (REQUIRED - must be the actual article URL)
- published_date: YYYY-MM-DD format
- summary: compelling 60-word summary
- keyword: a single lowercase word capturing the article's subject, for image search

Only include articles published within the last 48 hours, and do not repeat the same title twice.

IMPORTANT: Include the actual source URL from where you found each article. Return only a JSON array, no explanation.

Example format:
[{{"title":"Article Title","url":"https://example.com/article","published_date":"2024-01-01","summary":"Article summary here...","keyword":"economy"}}]"#
    )
}

/// Secondary one-token prompt used when an article arrives without a
/// usable `keyword` field.
pub fn keyword_prompt(title: &str) -> String {
    format!(
        "Reply with exactly one lowercase English word that best describes \
         the subject of this headline, and nothing else: {title}"
    )
}
