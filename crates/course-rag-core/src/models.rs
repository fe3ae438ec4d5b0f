//! Core data models for course ingestion and retrieval.
//!
//! A [`Course`] owns its [`Lesson`]s. A [`Chunk`] refers back to its course
//! by title and to its lesson by number; it never owns either. None of these
//! types are mutated after construction: re-ingesting a course produces a
//! fresh set of values that replaces the stored ones wholesale.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Header metadata and lesson outline for one ingested course document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Unique, non-empty course title. Foreign key for every chunk.
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Look up a lesson by its number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|l| l.lesson_number == lesson_number)
    }
}

/// One numbered section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

/// One retrievable unit of course text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text including its contextual prefix.
    pub content: String,
    pub course_title: String,
    /// `None` for chunks not attached to a lesson.
    pub lesson_number: Option<u32>,
    /// Sequential index, unique within the course (or within the run,
    /// depending on the ingestion policy).
    pub chunk_index: u64,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

impl Chunk {
    pub fn new(
        content: String,
        course_title: String,
        lesson_number: Option<u32>,
        chunk_index: u64,
    ) -> Self {
        let hash = content_hash(&content);
        Self {
            content,
            course_title,
            lesson_number,
            chunk_index,
            hash,
        }
    }

    /// Stable store key: the escaped course title, `_`, then the index.
    ///
    /// Spaces become `_`; a literal `_` becomes `%5F` and `%` becomes
    /// `%25`, so distinct `(title, index)` pairs never share an id.
    ///
    /// ```rust
    /// use course_rag_core::models::Chunk;
    ///
    /// let c = Chunk::new("x".into(), "Intro to RAG".into(), Some(0), 3);
    /// assert_eq!(c.id(), "Intro_to_RAG_3");
    /// ```
    pub fn id(&self) -> String {
        let mut id = String::with_capacity(self.course_title.len() + 8);
        for c in self.course_title.chars() {
            match c {
                ' ' => id.push('_'),
                '_' => id.push_str("%5F"),
                '%' => id.push_str("%25"),
                other => id.push(other),
            }
        }
        format!("{}_{}", id, self.chunk_index)
    }
}

/// Catalog record for a course, stored separately from its content chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub title: String,
    pub instructor: Option<String>,
    pub link: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl CourseRecord {
    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    pub fn lesson_link(&self, lesson_number: u32) -> Option<&str> {
        self.lessons
            .iter()
            .find(|l| l.lesson_number == lesson_number)
            .and_then(|l| l.lesson_link.as_deref())
    }
}

impl From<&Course> for CourseRecord {
    fn from(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            link: course.link.clone(),
            lessons: course.lessons.clone(),
        }
    }
}

/// A chunk returned by a store search, with its backend score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkHit {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u64,
    /// Higher is better. Scale depends on the backend.
    pub score: f64,
}

pub(crate) fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_deterministic() {
        let a = Chunk::new("same".into(), "C".into(), Some(1), 0);
        let b = Chunk::new("same".into(), "C".into(), Some(1), 7);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn chunk_ids_do_not_collide() {
        let id = |title: &str, index| Chunk::new("x".into(), title.into(), None, index).id();
        assert_eq!(id("A B", 0), "A_B_0");
        assert_eq!(id("A_B", 0), "A%5FB_0");
        assert_eq!(id("100%", 2), "100%25_2");
        assert_ne!(id("A B", 0), id("A_B", 0));
        assert_ne!(id("A  B", 0), id("A_B", 0));
        assert_ne!(id("A%5FB", 0), id("A_B", 0));
    }

    #[test]
    fn record_lesson_link_lookup() {
        let record = CourseRecord {
            title: "C".into(),
            instructor: None,
            link: None,
            lessons: vec![
                Lesson {
                    lesson_number: 0,
                    title: "Intro".into(),
                    lesson_link: Some("https://example.com/l0".into()),
                },
                Lesson {
                    lesson_number: 1,
                    title: "Next".into(),
                    lesson_link: None,
                },
            ],
        };
        assert_eq!(record.lesson_link(0), Some("https://example.com/l0"));
        assert_eq!(record.lesson_link(1), None);
        assert_eq!(record.lesson_link(9), None);
        assert_eq!(record.lesson_count(), 2);
    }
}
