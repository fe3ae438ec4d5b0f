//! In-memory [`Store`] implementation for tests and ephemeral use.
//!
//! Uses a `BTreeMap` and a `Vec` behind `std::sync::RwLock`. Search is
//! term-overlap scoring via [`crate::search::overlap_score`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ChunkHit, Course, CourseRecord};
use crate::search::{overlap_score, tokenize};

use super::{check_chunk_ownership, ChunkQuery, Store};

pub struct InMemoryStore {
    courses: RwLock<BTreeMap<String, CourseRecord>>,
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            courses: RwLock::new(BTreeMap::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_course(&self, course: &Course, chunks: &[Chunk]) -> Result<()> {
        check_chunk_ownership(course, chunks)?;

        let mut courses = self.courses.write().unwrap();
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.course_title != course.title);
        stored.extend(chunks.iter().cloned());
        courses.insert(course.title.clone(), CourseRecord::from(course));
        Ok(())
    }

    async fn delete_course(&self, title: &str) -> Result<bool> {
        let mut courses = self.courses.write().unwrap();
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.course_title != title);
        Ok(courses.remove(title).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.courses.write().unwrap().clear();
        self.chunks.write().unwrap().clear();
        Ok(())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(self.courses.read().unwrap().keys().cloned().collect())
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        Ok(self.courses.read().unwrap().get(title).cloned())
    }

    async fn course_chunks(&self, title: &str) -> Result<Vec<Chunk>> {
        let mut out: Vec<Chunk> = self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.course_title == title)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }

    async fn search_chunks(&self, query: &ChunkQuery<'_>) -> Result<Vec<ChunkHit>> {
        let terms = tokenize(query.text);
        if terms.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let stored = self.chunks.read().unwrap();
        let mut hits: Vec<ChunkHit> = stored
            .iter()
            .filter(|c| query.course_title.map_or(true, |t| c.course_title == t))
            .filter(|c| {
                query
                    .lesson_number
                    .map_or(true, |n| c.lesson_number == Some(n))
            })
            .filter_map(|c| {
                let score = overlap_score(&terms, &c.content);
                (score > 0.0).then(|| ChunkHit {
                    content: c.content.clone(),
                    course_title: c.course_title.clone(),
                    lesson_number: c.lesson_number,
                    chunk_index: c.chunk_index,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.course_title.cmp(&b.course_title))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(query.limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lesson;

    fn course(title: &str) -> Course {
        Course {
            title: title.into(),
            link: None,
            instructor: Some("Teach".into()),
            lessons: vec![
                Lesson {
                    lesson_number: 0,
                    title: "Intro".into(),
                    lesson_link: None,
                },
                Lesson {
                    lesson_number: 1,
                    title: "More".into(),
                    lesson_link: Some("https://example.com/1".into()),
                },
            ],
        }
    }

    fn chunk(title: &str, lesson: u32, index: u64, text: &str) -> Chunk {
        Chunk::new(text.into(), title.into(), Some(lesson), index)
    }

    #[tokio::test]
    async fn test_replace_course_replaces_only_that_course() {
        let store = InMemoryStore::new();
        store
            .replace_course(
                &course("A"),
                &[chunk("A", 0, 0, "old text"), chunk("A", 1, 1, "old more")],
            )
            .await
            .unwrap();
        store
            .replace_course(&course("B"), &[chunk("B", 0, 0, "b text")])
            .await
            .unwrap();
        store
            .replace_course(&course("A"), &[chunk("A", 0, 0, "new text")])
            .await
            .unwrap();

        let a = store.course_chunks("A").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "new text");
        assert_eq!(store.course_chunks("B").await.unwrap().len(), 1);
        assert_eq!(store.course_titles().await.unwrap(), vec!["A", "B"]);
        assert_eq!(store.course_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_course_rejects_foreign_chunks() {
        let store = InMemoryStore::new();
        let err = store
            .replace_course(&course("A"), &[chunk("B", 0, 0, "x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("belongs to 'B'"));
        assert!(store.course_titles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_filters_and_ranks() {
        let store = InMemoryStore::new();
        store
            .replace_course(
                &course("A"),
                &[
                    chunk("A", 0, 0, "prompt caching saves tokens"),
                    chunk("A", 1, 1, "tool use with prompt caching and batching"),
                ],
            )
            .await
            .unwrap();
        store
            .replace_course(&course("B"), &[chunk("B", 0, 0, "prompt engineering basics")])
            .await
            .unwrap();

        let all = store
            .search_chunks(&ChunkQuery::new("prompt caching", 10))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].course_title, "B");

        let in_a = store
            .search_chunks(&ChunkQuery::new("prompt", 10).in_course("A").in_lesson(1))
            .await
            .unwrap();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].chunk_index, 1);

        let none = store
            .search_chunks(&ChunkQuery::new("   ", 10))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = InMemoryStore::new();
        store
            .replace_course(&course("A"), &[chunk("A", 0, 0, "x")])
            .await
            .unwrap();
        assert!(store.delete_course("A").await.unwrap());
        assert!(!store.delete_course("A").await.unwrap());
        assert!(store.course_chunks("A").await.unwrap().is_empty());

        store
            .replace_course(&course("B"), &[chunk("B", 0, 0, "y")])
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.course_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_course_record() {
        let store = InMemoryStore::new();
        store.replace_course(&course("A"), &[]).await.unwrap();
        let rec = store.get_course("A").await.unwrap().unwrap();
        assert_eq!(rec.lesson_count(), 2);
        assert_eq!(rec.lesson_link(1), Some("https://example.com/1"));
        assert!(store.get_course("missing").await.unwrap().is_none());
    }
}
