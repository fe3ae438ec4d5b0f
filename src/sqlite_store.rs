//! SQLite-backed [`Store`].
//!
//! `courses` is the catalog collection; `chunks` plus the FTS5 table
//! `chunks_fts` hold course content. Replacing a course deletes and
//! re-inserts all of its rows in one transaction, so a re-ingest never
//! leaves stale chunks behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use course_rag_core::models::{Chunk, ChunkHit, Course, CourseRecord, Lesson};
use course_rag_core::search::tokenize;
use course_rag_core::store::{check_chunk_ownership, ChunkQuery, Store};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::migrate;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// Turn free text into an FTS5 `OR` query of quoted terms.
///
/// Quoting keeps user punctuation (`:`, `-`, `*`, quotes) from being read
/// as FTS5 syntax.
pub fn fts_query(text: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let mut terms = tokenize(text);
    terms.retain(|t| seen.insert(t.clone()));
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl Store for SqliteStore {
    async fn replace_course(&self, course: &Course, chunks: &[Chunk]) -> Result<()> {
        check_chunk_ownership(course, chunks)?;

        let lessons_json = serde_json::to_string(&course.lessons)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks_fts WHERE course_title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE course_title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO courses (title, instructor, link, lessons_json, lesson_count, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO UPDATE SET
                instructor = excluded.instructor,
                link = excluded.link,
                lessons_json = excluded.lessons_json,
                lesson_count = excluded.lesson_count,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&course.title)
        .bind(&course.instructor)
        .bind(&course.link)
        .bind(&lessons_json)
        .bind(course.lessons.len() as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            let result = sqlx::query(
                "INSERT INTO chunks (id, course_title, lesson_number, chunk_index, content, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk.id())
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number.map(i64::from))
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert chunk {}", chunk.id()))?;

            sqlx::query("INSERT INTO chunks_fts (rowid, course_title, content) VALUES (?, ?, ?)")
                .bind(result.last_insert_rowid())
                .bind(&chunk.course_title)
                .bind(&chunk.content)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_course(&self, title: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks_fts WHERE course_title = ?")
            .bind(title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE course_title = ?")
            .bind(title)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM courses WHERE title = ?")
            .bind(title)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks_fts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM courses").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM courses ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(titles)
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        let row = sqlx::query(
            "SELECT title, instructor, link, lessons_json FROM courses WHERE title = ?",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lessons_json: String = row.get("lessons_json");
        let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)
            .with_context(|| format!("Corrupt lesson list for course '{}'", title))?;

        Ok(Some(CourseRecord {
            title: row.get("title"),
            instructor: row.get("instructor"),
            link: row.get("link"),
            lessons,
        }))
    }

    async fn course_chunks(&self, title: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT course_title, lesson_number, chunk_index, content, hash
            FROM chunks
            WHERE course_title = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(title)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Chunk {
                content: row.get("content"),
                course_title: row.get("course_title"),
                lesson_number: row
                    .get::<Option<i64>, _>("lesson_number")
                    .map(|n| n as u32),
                chunk_index: row.get::<i64, _>("chunk_index") as u64,
                hash: row.get("hash"),
            })
            .collect())
    }

    async fn search_chunks(&self, query: &ChunkQuery<'_>) -> Result<Vec<ChunkHit>> {
        let Some(fts) = fts_query(query.text) else {
            return Ok(Vec::new());
        };
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT c.content, c.course_title, c.lesson_number, c.chunk_index,
                   bm25(chunks_fts) AS rank
            FROM chunks_fts
            JOIN chunks c ON c.rowid = chunks_fts.rowid
            WHERE chunks_fts MATCH ?1
              AND (?2 IS NULL OR c.course_title = ?2)
              AND (?3 IS NULL OR c.lesson_number = ?3)
            ORDER BY rank, c.course_title, c.chunk_index
            LIMIT ?4
            "#,
        )
        .bind(&fts)
        .bind(query.course_title)
        .bind(query.lesson_number.map(i64::from))
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                ChunkHit {
                    content: row.get("content"),
                    course_title: row.get("course_title"),
                    lesson_number: row
                        .get::<Option<i64>, _>("lesson_number")
                        .map(|n| n as u32),
                    chunk_index: row.get::<i64, _>("chunk_index") as u64,
                    score: -rank, // negate so higher = better
                }
            })
            .collect())
    }
}
