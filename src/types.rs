use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A group's news-generation configuration and status, as stored in the
/// `groups` table. The social-app surface owns everything else about a
/// group; this crate only reads the configuration and writes the
/// generation status fields back.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub automated_news_enabled: bool,
    pub news_prompt: String,
    pub news_count: i64,
    pub news_sources: String,
    pub update_frequency: i64,
    pub last_news_generation: Option<String>,
    pub news_generation_status: String,
    pub last_generation_error: Option<String>,
}

impl Group {
    /// Custom source-domain allow-list, stored as a JSON array of strings.
    /// An empty or unparseable value means "use the defaults".
    pub fn source_domains(&self) -> Vec<String> {
        serde_json::from_str::<Vec<String>>(&self.news_sources).unwrap_or_default()
    }

    pub fn last_generation_time(&self) -> Option<DateTime<Utc>> {
        self.last_news_generation
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn status(&self) -> GenerationStatus {
        GenerationStatus::parse(&self.news_generation_status)
    }
}

/// Per-group generation state machine: idle/completed/failed -> running ->
/// {completed, failed}. Never left at `running` past a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Idle => "idle",
            GenerationStatus::Running => "running",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => GenerationStatus::Running,
            "completed" => GenerationStatus::Completed,
            "failed" => GenerationStatus::Failed,
            _ => GenerationStatus::Idle,
        }
    }
}

/// One candidate article recovered from the LLM response. Ephemeral: it
/// either becomes a post or is dropped by the filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keyword: Option<String>,
}

impl CandidateArticle {
    pub fn published_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.published_date.trim(), "%Y-%m-%d").ok()
    }
}

/// A post about to be inserted. The pipeline has no identity of its own,
/// so authorship is always a [`SystemAuthor`].
#[derive(Debug, Clone)]
pub struct NewPost {
    pub group_id: String,
    pub user_id: String,
    pub content: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub keyword: Option<String>,
}

/// Distinguished authorship capability for pipeline-created posts. Posts
/// are attributed to the group's creator rather than a real session user.
#[derive(Debug, Clone)]
pub struct SystemAuthor(String);

impl SystemAuthor {
    pub fn for_group(group: &Group) -> Self {
        SystemAuthor(group.created_by.clone())
    }

    pub fn user_id(&self) -> &str {
        &self.0
    }
}

/// Row status values for the append-only `generation_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Attempted,
    Success,
    RateLimited,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Attempted => "attempted",
            AttemptStatus::Success => "success",
            AttemptStatus::RateLimited => "rate_limited",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// Outcome classification reported back to the caller for each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
    Skipped,
    RateLimited,
}

/// One group's entry in the aggregated run response.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: String,
    pub status: OutcomeStatus,
    pub message: String,
}

/// Aggregated result of one orchestrator invocation. A failed group never
/// aborts the run; it just contributes an `Error` report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub message: String,
    pub results: Vec<GroupReport>,
}
