use chrono::Utc;
use tracing::{debug, instrument};

use super::core::Database;
use crate::filter::title_from_content;
use crate::types::NewPost;
use crate::TARGET_DB;

impl Database {
    /// Insert one group's batch of generated posts in a single transaction
    /// so a storage failure never leaves a partial batch behind.
    #[instrument(target = "db_query", level = "info", skip(self, posts))]
    pub async fn insert_posts(&self, posts: &[NewPost]) -> Result<u64, sqlx::Error> {
        let created_at = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;

        for post in posts {
            sqlx::query(
                r#"
                INSERT INTO posts (group_id, user_id, content, url, image_url, keyword, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&post.group_id)
            .bind(&post.user_id)
            .bind(&post.content)
            .bind(&post.url)
            .bind(&post.image_url)
            .bind(&post.keyword)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(target: TARGET_DB, "Inserted {} posts", posts.len());
        Ok(posts.len() as u64)
    }

    /// Titles of posts created in this group since `since` (RFC 3339),
    /// recovered from the stored content's title markup. Used by the
    /// deduplicator to reject re-posted headlines.
    pub async fn recent_post_titles(
        &self,
        group_id: &str,
        since: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let contents = sqlx::query_scalar::<_, String>(
            "SELECT content FROM posts WHERE group_id = ?1 AND created_at >= ?2",
        )
        .bind(group_id)
        .bind(since)
        .fetch_all(self.pool())
        .await?;

        Ok(contents
            .iter()
            .filter_map(|content| title_from_content(content))
            .collect())
    }

    pub async fn count_posts(&self, group_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE group_id = ?1")
            .bind(group_id)
            .fetch_one(self.pool())
            .await
    }
}
