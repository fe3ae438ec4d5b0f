//! Storage abstraction for course catalog records and content chunks.
//!
//! The [`Store`] trait holds two logical collections: the course catalog
//! (one [`CourseRecord`] per title) and the chunk collection. The SQLite
//! backend lives in the application crate; [`memory::InMemoryStore`] is
//! used by tests and by callers that need no persistence.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ChunkHit, Course, CourseRecord};
use crate::search::resolve_course_title;

/// Filters and limits for a chunk search.
#[derive(Debug, Clone, Copy)]
pub struct ChunkQuery<'a> {
    pub text: &'a str,
    /// Exact course title (already resolved).
    pub course_title: Option<&'a str>,
    pub lesson_number: Option<u32>,
    pub limit: usize,
}

impl<'a> ChunkQuery<'a> {
    pub fn new(text: &'a str, limit: usize) -> Self {
        Self {
            text,
            course_title: None,
            lesson_number: None,
            limit,
        }
    }

    pub fn in_course(mut self, title: &'a str) -> Self {
        self.course_title = Some(title);
        self
    }

    pub fn in_lesson(mut self, lesson_number: u32) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_course`](Store::replace_course) | Replace a course record and all its chunks |
/// | [`delete_course`](Store::delete_course) | Remove a course and its chunks |
/// | [`clear`](Store::clear) | Remove everything |
/// | [`course_titles`](Store::course_titles) | All stored titles, sorted |
/// | [`get_course`](Store::get_course) | Catalog record by exact title |
/// | [`resolve_course_name`](Store::resolve_course_name) | Loose name to stored title |
/// | [`course_chunks`](Store::course_chunks) | Chunks of one course in index order |
/// | [`search_chunks`](Store::search_chunks) | Ranked chunk search with filters |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace the catalog record for `course.title` and every chunk stored
    /// under that title. Chunks of other courses are untouched.
    ///
    /// Fails if any chunk names a different course.
    async fn replace_course(&self, course: &Course, chunks: &[Chunk]) -> Result<()>;

    /// Returns `true` if the course existed.
    async fn delete_course(&self, title: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;

    async fn course_titles(&self) -> Result<Vec<String>>;

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>>;

    async fn course_chunks(&self, title: &str) -> Result<Vec<Chunk>>;

    /// Best matches first. Empty queries return no hits.
    async fn search_chunks(&self, query: &ChunkQuery<'_>) -> Result<Vec<ChunkHit>>;

    async fn course_count(&self) -> Result<usize> {
        Ok(self.course_titles().await?.len())
    }

    /// Map a loosely written course name to a stored title.
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let titles = self.course_titles().await?;
        Ok(resolve_course_title(name, &titles).map(str::to_string))
    }
}

/// Reject chunks that belong to another course.
pub fn check_chunk_ownership(course: &Course, chunks: &[Chunk]) -> Result<()> {
    if let Some(stray) = chunks.iter().find(|c| c.course_title != course.title) {
        anyhow::bail!(
            "chunk {} belongs to '{}', not '{}'",
            stray.id(),
            stray.course_title,
            course.title
        );
    }
    Ok(())
}
