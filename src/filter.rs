//! Recency filtering and title deduplication of candidate articles.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::types::CandidateArticle;

/// Articles published more than this long before "now" are stale.
pub const MAX_ARTICLE_AGE_HOURS: i64 = 48;

/// How far back posted titles are considered for deduplication.
pub const DEDUP_WINDOW_DAYS: i64 = 7;

pub const MAX_TITLE_CHARS: usize = 80;

// Matches the title markup in the stored post content template.
static POST_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("post title regex"));

/// Recover the headline from a stored post's content.
pub fn title_from_content(content: &str) -> Option<String> {
    POST_TITLE_RE
        .captures(content)
        .map(|caps| caps[1].to_string())
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn truncate_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_TITLE_CHARS).collect()
    }
}

fn is_absolute_url(raw: &str) -> bool {
    Url::parse(raw).is_ok()
}

/// Filter candidates down to fresh, complete, not-yet-posted articles.
///
/// Order-preserving. Rejects candidates missing a title, summary, or
/// absolute URL; candidates published before the 48-hour window; and
/// candidates whose normalized title was already posted in this group
/// (or appeared earlier in the same batch). The result is capped at
/// `max` articles.
pub fn filter_articles(
    candidates: Vec<CandidateArticle>,
    existing_titles: &[String],
    now: DateTime<Utc>,
    max: usize,
) -> Vec<CandidateArticle> {
    let existing: HashSet<String> = existing_titles.iter().map(|t| normalize_title(t)).collect();
    let cutoff = (now - Duration::hours(MAX_ARTICLE_AGE_HOURS)).date_naive();

    let mut seen_in_batch: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for mut article in candidates {
        if article.title.trim().is_empty()
            || article.summary.trim().is_empty()
            || article.url.trim().is_empty()
        {
            debug!("Dropping candidate with missing fields: {:?}", article.title);
            continue;
        }

        if !is_absolute_url(article.url.trim()) {
            debug!("Dropping candidate with relative or invalid URL: {}", article.url);
            continue;
        }

        let published = match article.published_date() {
            Some(date) if date >= cutoff => date,
            _ => {
                debug!("Dropping stale or undated candidate: {}", article.title);
                continue;
            }
        };

        article.title = truncate_title(&article.title);
        let normalized = normalize_title(&article.title);

        if existing.contains(&normalized) {
            debug!("Dropping already-posted title: {}", article.title);
            continue;
        }
        if !seen_in_batch.insert(normalized) {
            debug!("Dropping in-batch duplicate title: {}", article.title);
            continue;
        }

        debug!("Keeping candidate published {}: {}", published, article.title);
        kept.push(article);
        if kept.len() >= max {
            break;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str, published_date: &str) -> CandidateArticle {
        CandidateArticle {
            title: title.to_string(),
            url: "https://example.com/article".to_string(),
            published_date: published_date.to_string(),
            summary: "A summary.".to_string(),
            keyword: Some("news".to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_stale_article_rejected() {
        // Three days old: outside the 48-hour window no matter what else
        // is valid about it.
        let kept = filter_articles(vec![article("Fresh", "2024-06-10"), article("Stale", "2024-06-07")], &[], now(), 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Fresh");
    }

    #[test]
    fn test_undated_article_rejected() {
        let kept = filter_articles(vec![article("No date", "")], &[], now(), 10);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut no_summary = article("Has title", "2024-06-10");
        no_summary.summary = String::new();
        let mut no_url = article("Has title too", "2024-06-10");
        no_url.url = "  ".to_string();

        let kept = filter_articles(vec![no_summary, no_url], &[], now(), 10);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_relative_url_rejected() {
        let mut relative = article("Relative", "2024-06-10");
        relative.url = "/articles/123".to_string();
        let kept = filter_articles(vec![relative], &[], now(), 10);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_duplicate_of_posted_title_rejected() {
        let existing = vec!["Big Merger Announced".to_string()];
        let kept = filter_articles(
            vec![article("  big merger announced ", "2024-06-10")],
            &existing,
            now(),
            10,
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn test_in_batch_duplicate_rejected() {
        let kept = filter_articles(
            vec![
                article("Same Story", "2024-06-10"),
                article("same story", "2024-06-10"),
            ],
            &[],
            now(),
            10,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_result_capped_and_order_preserved() {
        let kept = filter_articles(
            vec![
                article("First", "2024-06-10"),
                article("Second", "2024-06-10"),
                article("Third", "2024-06-10"),
            ],
            &[],
            now(),
            2,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "First");
        assert_eq!(kept[1].title, "Second");
    }

    #[test]
    fn test_long_title_truncated() {
        let long = "x".repeat(120);
        let kept = filter_articles(vec![article(&long, "2024-06-10")], &[], now(), 10);
        assert_eq!(kept[0].title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_title_from_content() {
        let content = "📰 **Rates Hold Steady**\n\nThe central bank kept rates unchanged.\n\n🤖 AI News Bot\n\n📅 Published: 6/10/2024";
        assert_eq!(
            title_from_content(content).as_deref(),
            Some("Rates Hold Steady")
        );
        assert!(title_from_content("plain text post").is_none());
    }
}
