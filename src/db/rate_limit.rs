use chrono::Utc;
use tracing::{debug, instrument};

use super::core::Database;
use crate::types::AttemptStatus;
use crate::TARGET_DB;

impl Database {
    /// Count quota-consuming attempts for a (group, user) pair logged at
    /// or after `since` (unix seconds). Rows logged for a rate-limited
    /// denial do not consume quota themselves.
    pub async fn count_attempts_since(
        &self,
        group_id: &str,
        user_id: &str,
        since: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM generation_log
            WHERE group_id = ?1 AND user_id = ?2 AND created_at >= ?3
              AND status != 'rate_limited'
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(since)
        .fetch_one(self.pool())
        .await
    }

    /// Append one row to the generation log. The log is append-only:
    /// every attempt produces exactly one row with its terminal status.
    #[instrument(target = "db_query", level = "info", skip(self, error_message))]
    pub async fn log_attempt(
        &self,
        group_id: &str,
        user_id: &str,
        status: AttemptStatus,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO generation_log (group_id, user_id, status, error_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(Utc::now().timestamp())
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Logged {} attempt for group {}", status.as_str(), group_id);
        Ok(())
    }

    /// Statuses of all logged attempts for a group, oldest first.
    pub async fn attempt_statuses(&self, group_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT status FROM generation_log WHERE group_id = ?1 ORDER BY id ASC",
        )
        .bind(group_id)
        .fetch_all(self.pool())
        .await
    }
}
