//! End-to-end orchestration tests: a real SQLite database plus canned
//! content-search and image-search responses.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use gazette::db::Database;
use gazette::error::GenerationError;
use gazette::fetch::ArticleSource;
use gazette::generator::{self, GenerationRequest};
use gazette::image::ImageSource;
use gazette::rate_limit::{self, DAILY_GENERATION_LIMIT};
use gazette::types::{AttemptStatus, GenerationStatus, Group, NewPost, OutcomeStatus};

enum CannedFetch {
    Payload(String),
    Timeout,
    Upstream,
}

struct MockSearch {
    response: CannedFetch,
}

impl MockSearch {
    fn returning(payload: &str) -> Self {
        MockSearch {
            response: CannedFetch::Payload(payload.to_string()),
        }
    }
}

impl ArticleSource for MockSearch {
    async fn fetch_articles(
        &self,
        _prompt: &str,
        _count: i64,
        _source_domains: &[String],
    ) -> Result<String, GenerationError> {
        match &self.response {
            CannedFetch::Payload(payload) => Ok(payload.clone()),
            CannedFetch::Timeout => Err(GenerationError::Timeout(30)),
            CannedFetch::Upstream => Err(GenerationError::Upstream {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
        }
    }

    async fn derive_keyword(&self, _title: &str) -> Result<String, GenerationError> {
        Ok("mock".to_string())
    }
}

/// Image provider with nothing to offer, forcing the placeholder path.
struct NoImages;

impl ImageSource for NoImages {
    async fn search_photo(&self, _keyword: &str) -> Result<Option<String>, GenerationError> {
        Ok(None)
    }
}

async fn test_db() -> Database {
    let path = std::env::temp_dir().join(format!("gazette-test-{}.db", Uuid::new_v4()));
    Database::new(path.to_str().expect("temp path"))
        .await
        .expect("test database")
}

fn test_group(id: &str) -> Group {
    Group {
        id: id.to_string(),
        name: format!("Group {}", id),
        created_by: "creator-1".to_string(),
        automated_news_enabled: true,
        news_prompt: "electric vehicles".to_string(),
        news_count: 2,
        news_sources: "[]".to_string(),
        update_frequency: 1,
        last_news_generation: None,
        news_generation_status: "idle".to_string(),
        last_generation_error: None,
    }
}

fn fresh_article(title: &str, slug: &str) -> serde_json::Value {
    json!({
        "title": title,
        "url": format!("https://example.com/{}", slug),
        "published_date": Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        "summary": "A timely summary of roughly the requested length.",
        "keyword": "ev"
    })
}

fn two_fresh_articles() -> String {
    json!([
        fresh_article("EV Sales Surge in Europe", "ev-sales"),
        fresh_article("Battery Startup Raises Funding", "battery-funding"),
    ])
    .to_string()
}

async fn run_single(
    db: &Database,
    fetch: &MockSearch,
    group_id: &str,
    is_manual: bool,
) -> gazette::types::RunReport {
    generator::run(
        db,
        fetch,
        &NoImages,
        GenerationRequest {
            group_id: Some(group_id.to_string()),
            is_manual,
            user_id: None,
        },
    )
    .await
    .expect("run should not fail at top level")
}

async fn stored_group(db: &Database, id: &str) -> Group {
    db.get_group(id).await.expect("query").expect("group exists")
}

#[tokio::test]
async fn end_to_end_generation_creates_posts() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, OutcomeStatus::Success);

    let group = stored_group(&db, "g1").await;
    assert_eq!(group.status(), GenerationStatus::Completed);
    assert!(group.last_news_generation.is_some());
    assert!(group.last_generation_error.is_none());

    assert_eq!(db.count_posts("g1").await.unwrap(), 2);
    assert_eq!(db.attempt_statuses("g1").await.unwrap(), vec!["success"]);

    // Posts carry the template content, the source URL in its own field,
    // and a guaranteed image.
    let titles = db
        .recent_post_titles("g1", &(Utc::now() - Duration::days(1)).to_rfc3339())
        .await
        .unwrap();
    assert!(titles.contains(&"EV Sales Surge in Europe".to_string()));
    assert!(titles.contains(&"Battery Startup Raises Funding".to_string()));

    // With no image provider configured every post still carries an image.
    let missing_images: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts WHERE image_url IS NULL OR image_url = ''",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(missing_images, 0);
}

#[tokio::test]
async fn scheduled_pass_gates_by_frequency() {
    let db = test_db().await;

    let mut recent = test_group("g1");
    recent.last_news_generation = Some((Utc::now() - Duration::hours(3)).to_rfc3339());
    recent.news_generation_status = "completed".to_string();
    db.insert_group(&recent).await.unwrap();

    let mut due = test_group("g2");
    due.last_news_generation = Some((Utc::now() - Duration::days(2)).to_rfc3339());
    due.news_generation_status = "completed".to_string();
    db.insert_group(&due).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = gazette::scheduler::run_scheduled(&db, &fetch, &NoImages)
        .await
        .unwrap();

    assert_eq!(report.message, "Scheduled news generation completed");
    assert_eq!(report.results.len(), 2);

    let skipped = report
        .results
        .iter()
        .find(|r| r.group == "Group g1")
        .unwrap();
    let generated = report
        .results
        .iter()
        .find(|r| r.group == "Group g2")
        .unwrap();
    assert_eq!(skipped.status, OutcomeStatus::Skipped);
    assert_eq!(generated.status, OutcomeStatus::Success);
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);
    assert_eq!(db.count_posts("g2").await.unwrap(), 2);
}

#[tokio::test]
async fn frequency_gate_skips_without_touching_state() {
    let db = test_db().await;
    let mut group = test_group("g1");
    let last = (Utc::now() - Duration::hours(2)).to_rfc3339();
    group.last_news_generation = Some(last.clone());
    group.news_generation_status = "completed".to_string();
    db.insert_group(&group).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", false).await;

    assert_eq!(report.results[0].status, OutcomeStatus::Skipped);

    let stored = stored_group(&db, "g1").await;
    assert_eq!(stored.news_generation_status, "completed");
    assert_eq!(stored.last_news_generation.as_deref(), Some(last.as_str()));
    assert!(db.attempt_statuses("g1").await.unwrap().is_empty());
}

#[tokio::test]
async fn manual_request_bypasses_frequency_gate() {
    let db = test_db().await;
    let mut group = test_group("g1");
    group.last_news_generation = Some((Utc::now() - Duration::hours(2)).to_rfc3339());
    group.news_generation_status = "completed".to_string();
    db.insert_group(&group).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;

    assert_eq!(report.results[0].status, OutcomeStatus::Success);
    assert_eq!(db.count_posts("g1").await.unwrap(), 2);
}

#[tokio::test]
async fn rate_limit_blocks_after_daily_quota() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    for _ in 0..DAILY_GENERATION_LIMIT {
        db.log_attempt("g1", "creator-1", AttemptStatus::Success, None)
            .await
            .unwrap();
    }

    let decision = rate_limit::check_and_reserve(&db, "g1", "creator-1")
        .await
        .unwrap();
    assert!(!decision.can_generate);
    assert_eq!(decision.remaining_count, 0);

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::RateLimited);

    // The denial is recorded but no posts appear and status is untouched.
    let statuses = db.attempt_statuses("g1").await.unwrap();
    assert_eq!(statuses.last().map(String::as_str), Some("rate_limited"));
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);
    assert_eq!(stored_group(&db, "g1").await.status(), GenerationStatus::Idle);
}

#[tokio::test]
async fn successful_generation_consumes_one_quota_unit() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let before = rate_limit::check_and_reserve(&db, "g1", "creator-1")
        .await
        .unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Success);

    let after = rate_limit::check_and_reserve(&db, "g1", "creator-1")
        .await
        .unwrap();
    assert_eq!(after.remaining_count, before.remaining_count - 1);
}

#[tokio::test]
async fn fetch_timeout_ends_in_failed_status() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let fetch = MockSearch {
        response: CannedFetch::Timeout,
    };
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Error);

    let group = stored_group(&db, "g1").await;
    assert_eq!(group.status(), GenerationStatus::Failed);
    assert!(group
        .last_generation_error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert_eq!(db.attempt_statuses("g1").await.unwrap(), vec!["failed"]);
}

#[tokio::test]
async fn upstream_error_ends_in_failed_status() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let fetch = MockSearch {
        response: CannedFetch::Upstream,
    };
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Error);
    assert_eq!(
        stored_group(&db, "g1").await.status(),
        GenerationStatus::Failed
    );
}

#[tokio::test]
async fn unparseable_response_ends_in_failed_status() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let fetch = MockSearch::returning("Sorry, I could not find any articles today.");
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Error);

    let group = stored_group(&db, "g1").await;
    assert_eq!(group.status(), GenerationStatus::Failed);
    assert_eq!(db.attempt_statuses("g1").await.unwrap(), vec!["failed"]);
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);
}

#[tokio::test]
async fn persistence_failure_ends_in_failed_status() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    // Break the posts table so the batch insert fails after a good fetch.
    sqlx::query("DROP TABLE posts")
        .execute(db.pool())
        .await
        .unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Error);
    assert_eq!(
        stored_group(&db, "g1").await.status(),
        GenerationStatus::Failed
    );
}

#[tokio::test]
async fn stale_articles_complete_with_no_posts() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    let stale_date = (Utc::now() - Duration::days(5))
        .date_naive()
        .format("%Y-%m-%d")
        .to_string();
    let payload = json!([{
        "title": "Old News",
        "url": "https://example.com/old",
        "published_date": stale_date,
        "summary": "A perfectly formed but stale article.",
        "keyword": "old"
    }])
    .to_string();

    let fetch = MockSearch::returning(&payload);
    let report = run_single(&db, &fetch, "g1", true).await;

    // Nothing fresh is a valid outcome, not an error.
    assert_eq!(report.results[0].status, OutcomeStatus::Success);
    assert_eq!(report.results[0].message, "No fresh articles to post");
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);

    let group = stored_group(&db, "g1").await;
    assert_eq!(group.status(), GenerationStatus::Completed);
    assert!(group.last_news_generation.is_some());
}

#[tokio::test]
async fn previously_posted_title_is_not_reposted() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();

    // A week-window post with the same headline, stored in template form.
    db.insert_posts(&[NewPost {
        group_id: "g1".to_string(),
        user_id: "creator-1".to_string(),
        content: "📰 **EV Sales Surge in Europe**\n\nEarlier coverage.\n\n🤖 AI News Bot\n\n📅 Published: 6/1/2024"
            .to_string(),
        url: Some("https://example.com/earlier".to_string()),
        image_url: None,
        keyword: Some("ev".to_string()),
    }])
    .await
    .unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;
    assert_eq!(report.results[0].status, OutcomeStatus::Success);

    // Only the unseen headline got posted.
    assert_eq!(db.count_posts("g1").await.unwrap(), 2);
    let titles = db
        .recent_post_titles("g1", &(Utc::now() - Duration::days(1)).to_rfc3339())
        .await
        .unwrap();
    assert!(titles.contains(&"Battery Startup Raises Funding".to_string()));
}

#[tokio::test]
async fn concurrent_trigger_loses_status_race() {
    let db = test_db().await;
    let mut group = test_group("g1");
    group.news_generation_status = "running".to_string();
    db.insert_group(&group).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;

    assert_eq!(report.results[0].status, OutcomeStatus::Skipped);
    assert_eq!(report.results[0].message, "Generation already in progress");
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_group_yields_empty_results() {
    let db = test_db().await;
    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "missing", true).await;

    assert_eq!(
        report.message,
        "Group not found or automated news not enabled"
    );
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn disabled_group_is_not_generated() {
    let db = test_db().await;
    let mut group = test_group("g1");
    group.automated_news_enabled = false;
    db.insert_group(&group).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = run_single(&db, &fetch, "g1", true).await;
    assert!(report.results.is_empty());
    assert_eq!(db.count_posts("g1").await.unwrap(), 0);
}

#[tokio::test]
async fn bulk_mode_processes_all_enabled_groups() {
    let db = test_db().await;
    db.insert_group(&test_group("g1")).await.unwrap();
    db.insert_group(&test_group("g2")).await.unwrap();
    let mut disabled = test_group("g3");
    disabled.automated_news_enabled = false;
    db.insert_group(&disabled).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = generator::run(
        &db,
        &fetch,
        &NoImages,
        GenerationRequest {
            group_id: None,
            is_manual: true,
            user_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.status == OutcomeStatus::Success));
}

#[tokio::test]
async fn one_failing_group_does_not_abort_the_rest() {
    let db = test_db().await;

    // First group is already running so its attempt is refused; the
    // second should still be processed normally.
    let mut busy = test_group("g1");
    busy.news_generation_status = "running".to_string();
    db.insert_group(&busy).await.unwrap();
    db.insert_group(&test_group("g2")).await.unwrap();

    let fetch = MockSearch::returning(&two_fresh_articles());
    let report = generator::run(
        &db,
        &fetch,
        &NoImages,
        GenerationRequest {
            group_id: None,
            is_manual: true,
            user_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.results.len(), 2);
    let busy_report = report
        .results
        .iter()
        .find(|r| r.group == "Group g1")
        .unwrap();
    let healthy_report = report
        .results
        .iter()
        .find(|r| r.group == "Group g2")
        .unwrap();
    assert_eq!(busy_report.status, OutcomeStatus::Skipped);
    assert_eq!(healthy_report.status, OutcomeStatus::Success);
    assert_eq!(db.count_posts("g2").await.unwrap(), 2);
}
