use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Every statement is idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Course catalog
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            title TEXT PRIMARY KEY,
            instructor TEXT,
            link TEXT,
            lessons_json TEXT NOT NULL DEFAULT '[]',
            lesson_count INTEGER NOT NULL DEFAULT 0,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Course content
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT NOT NULL,
            course_title TEXT NOT NULL,
            lesson_number INTEGER,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            hash TEXT NOT NULL,
            PRIMARY KEY (course_title, chunk_index),
            FOREIGN KEY (course_title) REFERENCES courses(title)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first.
    // chunks_fts.rowid mirrors chunks.rowid.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                course_title UNINDEXED,
                content
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_lesson ON chunks(course_title, lesson_number)")
        .execute(pool)
        .await?;

    Ok(())
}
