use tracing::{debug, info, instrument};

use super::core::Database;
use crate::types::Group;
use crate::TARGET_DB;

impl Database {
    /// Fetch one group by id, regardless of whether automation is enabled.
    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?1")
            .bind(group_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Fetch one group by id if it has automated news enabled.
    pub async fn get_enabled_group(&self, group_id: &str) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            "SELECT * FROM groups WHERE id = ?1 AND automated_news_enabled = 1",
        )
        .bind(group_id)
        .fetch_optional(self.pool())
        .await
    }

    /// All groups with automated news enabled, oldest generation first so
    /// the most starved groups are processed before any rate limit bites.
    pub async fn enabled_groups(&self) -> Result<Vec<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT * FROM groups
            WHERE automated_news_enabled = 1
            ORDER BY last_news_generation ASC NULLS FIRST
            "#,
        )
        .fetch_all(self.pool())
        .await
    }

    pub async fn insert_group(&self, group: &Group) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO groups (
                id, name, created_by, automated_news_enabled, news_prompt,
                news_count, news_sources, update_frequency, last_news_generation,
                news_generation_status, last_generation_error
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.created_by)
        .bind(group.automated_news_enabled)
        .bind(&group.news_prompt)
        .bind(group.news_count)
        .bind(&group.news_sources)
        .bind(group.update_frequency)
        .bind(&group.last_news_generation)
        .bind(&group.news_generation_status)
        .bind(&group.last_generation_error)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Attempt the idle/completed/failed -> running transition. Guarded by
    /// the current status so concurrent manual and scheduled triggers for
    /// the same group cannot both enter: exactly one caller sees `true`.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn try_begin_generation(&self, group_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET news_generation_status = 'running', last_generation_error = NULL
            WHERE id = ?1 AND news_generation_status != 'running'
            "#,
        )
        .bind(group_id)
        .execute(self.pool())
        .await?;

        let entered = result.rows_affected() == 1;
        if entered {
            info!(target: TARGET_DB, "Group {} entered running state", group_id);
        } else {
            debug!(target: TARGET_DB, "Group {} already running; transition refused", group_id);
        }
        Ok(entered)
    }

    /// Terminal transition: running -> completed. Clears the error field
    /// and stamps `last_news_generation` so the frequency gate sees this
    /// attempt.
    pub async fn mark_generation_completed(
        &self,
        group_id: &str,
        completed_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE groups
            SET news_generation_status = 'completed',
                last_generation_error = NULL,
                last_news_generation = ?2
            WHERE id = ?1
            "#,
        )
        .bind(group_id)
        .bind(completed_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Terminal transition: running -> failed, recording the error message
    /// for the admin dashboard.
    pub async fn mark_generation_failed(
        &self,
        group_id: &str,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE groups
            SET news_generation_status = 'failed', last_generation_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(group_id)
        .bind(error_message)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
