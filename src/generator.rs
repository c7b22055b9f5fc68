//! The generation orchestrator: drives the fetch → extract → filter →
//! enrich → persist pipeline for each eligible group, owns the per-group
//! status state machine, and aggregates one report per group.

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::GenerationError;
use crate::extract;
use crate::fetch::ArticleSource;
use crate::filter::{self, DEDUP_WINDOW_DAYS};
use crate::image::{self, ImageSource};
use crate::prompts::DEFAULT_NEWS_DOMAINS;
use crate::rate_limit;
use crate::scheduler;
use crate::types::{
    AttemptStatus, CandidateArticle, Group, GroupReport, NewPost, OutcomeStatus, RunReport,
    SystemAuthor,
};

/// One trigger invocation. `group_id` selects single-group mode (manual
/// "Generate Now" and the scheduler's per-group dispatch); without it the
/// legacy bulk mode iterates every enabled group.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub group_id: Option<String>,
    pub is_manual: bool,
    pub user_id: Option<String>,
}

/// Terminal classification of one group's attempt.
#[derive(Debug)]
pub enum GroupOutcome {
    Skipped(String),
    RateLimited(String),
    Succeeded { message: String },
    Failed(String),
}

impl GroupOutcome {
    fn into_report(self, group_name: &str) -> GroupReport {
        let (status, message) = match self {
            GroupOutcome::Skipped(message) => (OutcomeStatus::Skipped, message),
            GroupOutcome::RateLimited(message) => (OutcomeStatus::RateLimited, message),
            GroupOutcome::Succeeded { message } => (OutcomeStatus::Success, message),
            GroupOutcome::Failed(message) => (OutcomeStatus::Error, message),
        };
        GroupReport {
            group: group_name.to_string(),
            status,
            message,
        }
    }
}

/// Run one generation invocation. Only top-level failures (the group
/// query itself) surface as `Err`; each group's own failure is folded
/// into its report and never aborts the remaining groups.
pub async fn run<S: ArticleSource, I: ImageSource>(
    db: &Database,
    llm: &S,
    images: &I,
    request: GenerationRequest,
) -> Result<RunReport, GenerationError> {
    let groups = match &request.group_id {
        Some(group_id) => match db.get_enabled_group(group_id).await? {
            Some(group) => vec![group],
            None => {
                info!("Group not found or automated news not enabled: {}", group_id);
                return Ok(RunReport {
                    message: "Group not found or automated news not enabled".to_string(),
                    results: Vec::new(),
                });
            }
        },
        None => db.enabled_groups().await?,
    };

    let mut results = Vec::with_capacity(groups.len());
    for group in &groups {
        let outcome = process_group(db, llm, images, group, &request).await;
        results.push(outcome.into_report(&group.name));
    }

    Ok(RunReport {
        message: "News generation completed".to_string(),
        results,
    })
}

async fn process_group<S: ArticleSource, I: ImageSource>(
    db: &Database,
    llm: &S,
    images: &I,
    group: &Group,
    request: &GenerationRequest,
) -> GroupOutcome {
    let user_id = request
        .user_id
        .clone()
        .unwrap_or_else(|| group.created_by.clone());

    // Frequency gate; a skip leaves status fields and the log untouched.
    if !scheduler::should_generate(
        group.last_generation_time(),
        group.update_frequency,
        request.is_manual,
        Utc::now(),
    ) {
        info!("Skipping group {}: frequency not met", group.name);
        return GroupOutcome::Skipped(format!(
            "Frequency not met ({} days)",
            group.update_frequency.max(1)
        ));
    }

    // Rate-limit gate. A failed count query is a hard per-group error;
    // the gate never fails open.
    let decision = match rate_limit::check_and_reserve(db, &group.id, &user_id).await {
        Ok(decision) => decision,
        Err(err) => {
            error!("Rate limit check failed for group {}: {}", group.name, err);
            return GroupOutcome::Failed(err.to_string());
        }
    };
    if !decision.can_generate {
        if let Err(log_err) = db
            .log_attempt(&group.id, &user_id, AttemptStatus::RateLimited, None)
            .await
        {
            error!("Failed to log rate-limited attempt for group {}: {}", group.name, log_err);
        }
        return GroupOutcome::RateLimited(decision.message);
    }

    // Guarded transition into `running`; the loser of a concurrent
    // manual/scheduled race reports a skip instead of clobbering state.
    match db.try_begin_generation(&group.id).await {
        Ok(true) => {}
        Ok(false) => {
            return GroupOutcome::Skipped("Generation already in progress".to_string());
        }
        Err(err) => {
            error!("Failed to start generation for group {}: {}", group.name, err);
            return GroupOutcome::Failed(err.to_string());
        }
    }

    // From here on the group is `running` and every path below must end
    // in a terminal status update.
    match produce_posts(db, llm, images, group).await {
        Ok(post_count) => {
            let completed_at = Utc::now().to_rfc3339();
            if let Err(err) = db.mark_generation_completed(&group.id, &completed_at).await {
                error!("Failed to record completion for group {}: {}", group.name, err);
                let message = err.to_string();
                let _ = db.mark_generation_failed(&group.id, &message).await;
                let _ = db
                    .log_attempt(&group.id, &user_id, AttemptStatus::Failed, Some(&message))
                    .await;
                return GroupOutcome::Failed(message);
            }

            if let Err(log_err) = db
                .log_attempt(&group.id, &user_id, AttemptStatus::Success, None)
                .await
            {
                warn!("Failed to log successful attempt for group {}: {}", group.name, log_err);
            }

            let message = if post_count == 0 {
                "No fresh articles to post".to_string()
            } else {
                format!(
                    "Created {} news posts successfully ({} generations remaining today)",
                    post_count,
                    (decision.remaining_count - 1).max(0)
                )
            };
            info!("Generated news for group {}: {}", group.name, message);
            GroupOutcome::Succeeded { message }
        }
        Err(err) => {
            let message = err.to_string();
            error!("Generation failed for group {}: {}", group.name, message);
            if let Err(mark_err) = db.mark_generation_failed(&group.id, &message).await {
                error!("Failed to record failure for group {}: {}", group.name, mark_err);
            }
            if let Err(log_err) = db
                .log_attempt(&group.id, &user_id, AttemptStatus::Failed, Some(&message))
                .await
            {
                error!("Failed to log failed attempt for group {}: {}", group.name, log_err);
            }
            GroupOutcome::Failed(message)
        }
    }
}

/// Steps 4-8 for one group: fetch, extract, filter, enrich, persist.
/// Returns the number of posts inserted; zero is a valid outcome when
/// the filter leaves nothing fresh.
async fn produce_posts<S: ArticleSource, I: ImageSource>(
    db: &Database,
    llm: &S,
    images: &I,
    group: &Group,
) -> Result<usize, GenerationError> {
    let count = if group.news_count >= 1 { group.news_count } else { 10 };
    let domains = source_domains(group);

    let raw = llm.fetch_articles(&group.news_prompt, count, &domains).await?;
    let candidates = extract::extract_articles(&raw)?;

    let now = Utc::now();
    let since = (now - Duration::days(DEDUP_WINDOW_DAYS)).to_rfc3339();
    let existing_titles = db.recent_post_titles(&group.id, &since).await?;

    let articles = filter::filter_articles(candidates, &existing_titles, now, count as usize);
    if articles.is_empty() {
        info!("No articles survived filtering for group {}", group.name);
        return Ok(0);
    }

    let author = SystemAuthor::for_group(group);
    let mut posts = Vec::with_capacity(articles.len());
    for article in &articles {
        let (image_url, keyword) = image::enrich_image(llm, images, article).await;
        posts.push(NewPost {
            group_id: group.id.clone(),
            user_id: author.user_id().to_string(),
            content: post_content(article),
            url: Some(article.url.trim().to_string()),
            image_url: Some(image_url),
            keyword: Some(keyword),
        });
    }

    db.insert_posts(&posts).await?;
    Ok(posts.len())
}

/// The group's custom source list when present, else the default outlets.
fn source_domains(group: &Group) -> Vec<String> {
    let custom = group.source_domains();
    if custom.is_empty() {
        DEFAULT_NEWS_DOMAINS.iter().map(|d| d.to_string()).collect()
    } else {
        custom
    }
}

/// The fixed post body. The title markup doubles as the deduplication
/// anchor and the downstream UI parses this layout, so the format is
/// load-bearing. The URL is stored in its own column, not embedded here.
fn post_content(article: &CandidateArticle) -> String {
    let published = article
        .published_date()
        .map(|date| date.format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|| article.published_date.clone());

    format!(
        "📰 **{}**\n\n{}\n\n🤖 AI News Bot\n\n📅 Published: {}",
        article.title, article.summary, published
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_content_template() {
        let article = CandidateArticle {
            title: "Rates Hold Steady".to_string(),
            url: "https://example.com/a".to_string(),
            published_date: "2024-01-01".to_string(),
            summary: "The central bank kept rates unchanged.".to_string(),
            keyword: Some("rates".to_string()),
        };
        assert_eq!(
            post_content(&article),
            "📰 **Rates Hold Steady**\n\nThe central bank kept rates unchanged.\n\n🤖 AI News Bot\n\n📅 Published: 1/1/2024"
        );
    }

    #[test]
    fn test_post_title_round_trips_through_dedup_markup() {
        let article = CandidateArticle {
            title: "Chipmaker Beats Forecasts".to_string(),
            url: "https://example.com/b".to_string(),
            published_date: "2024-01-02".to_string(),
            summary: "Earnings came in ahead of expectations.".to_string(),
            keyword: None,
        };
        let content = post_content(&article);
        assert_eq!(
            crate::filter::title_from_content(&content).as_deref(),
            Some("Chipmaker Beats Forecasts")
        );
    }

    #[test]
    fn test_source_domains_fallback() {
        let mut group = Group {
            id: "g1".to_string(),
            name: "Group".to_string(),
            created_by: "u1".to_string(),
            automated_news_enabled: true,
            news_prompt: "tech".to_string(),
            news_count: 5,
            news_sources: "[]".to_string(),
            update_frequency: 1,
            last_news_generation: None,
            news_generation_status: "idle".to_string(),
            last_generation_error: None,
        };
        assert_eq!(source_domains(&group).len(), DEFAULT_NEWS_DOMAINS.len());

        group.news_sources = r#"["example.com"]"#.to_string();
        assert_eq!(source_domains(&group), vec!["example.com".to_string()]);
    }
}
