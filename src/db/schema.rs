use super::core::Database;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                automated_news_enabled INTEGER NOT NULL DEFAULT 0,
                news_prompt TEXT NOT NULL DEFAULT '',
                news_count INTEGER NOT NULL DEFAULT 10,
                news_sources TEXT NOT NULL DEFAULT '[]',
                update_frequency INTEGER NOT NULL DEFAULT 1,
                last_news_generation TEXT,
                news_generation_status TEXT NOT NULL DEFAULT 'idle',
                last_generation_error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_groups_enabled ON groups (automated_news_enabled, last_news_generation);

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                url TEXT,
                image_url TEXT,
                keyword TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_posts_group_created ON posts (group_id, created_at);

            -- Append-only record of generation attempts; rows are never
            -- updated or deleted, only counted.
            CREATE TABLE IF NOT EXISTS generation_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_generation_log_pair ON generation_log (group_id, user_id, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
