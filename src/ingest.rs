//! Ingest orchestration.
//!
//! Coordinates the full flow: filesystem scan → read bytes → parse and
//! chunk ([`IngestionPipeline`]) → per-course replacement in the store.
//! Unreadable or malformed files are reported and skipped; they never
//! abort the run.

use anyhow::Result;
use course_rag_core::parser::DocumentParser;
use course_rag_core::pipeline::{IngestReport, IngestionPipeline, SourceDocument};
use course_rag_core::store::Store;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{ChunkingConfig, Config};
use crate::connector_fs::{self, DocFile};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::sqlite_store::SqliteStore;

/// Build the parser and pipeline described by `[chunking]`.
pub fn build_pipeline(chunking: &ChunkingConfig) -> Result<IngestionPipeline> {
    let parser = DocumentParser::new(chunking.chunk_config())?
        .normalize_whitespace(chunking.normalize_whitespace);
    Ok(IngestionPipeline::new(parser, chunking.index_policy))
}

/// Read each file into a [`SourceDocument`]. Read errors are carried, not raised.
pub fn read_sources(
    files: &[DocFile],
    progress: &dyn IngestProgressReporter,
) -> Vec<SourceDocument> {
    let total = files.len() as u64;
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let source = match std::fs::read(&file.path) {
                Ok(bytes) => SourceDocument::new(&file.relative, bytes),
                Err(e) => SourceDocument::unreadable(&file.relative, e.to_string()),
            };
            progress.report(IngestProgressEvent::Reading {
                n: i as u64 + 1,
                total,
            });
            match file.stem() {
                Some(stem) => source.with_fallback_title(stem),
                None => source,
            }
        })
        .collect()
}

/// Parse and chunk `paths` in the given order. Nothing is written.
pub fn ingest_paths(paths: &[PathBuf], chunking: &ChunkingConfig) -> Result<IngestReport> {
    let pipeline = build_pipeline(chunking)?;
    let files: Vec<DocFile> = paths
        .iter()
        .map(|p| DocFile {
            path: p.clone(),
            relative: p.display().to_string(),
        })
        .collect();
    Ok(pipeline.ingest(read_sources(&files, &NoProgress)))
}

/// Replace every course in `report` in the store. Returns chunks written.
pub async fn store_report<S: Store + ?Sized>(
    store: &S,
    report: &IngestReport,
    progress: &dyn IngestProgressReporter,
) -> Result<usize> {
    let total = report.courses.len() as u64;
    let mut written = 0;
    for (i, course) in report.courses.iter().enumerate() {
        let chunks: Vec<_> = report.chunks_for(&course.title).cloned().collect();
        store.replace_course(course, &chunks).await?;
        written += chunks.len();
        tracing::info!(course = %course.title, chunks = chunks.len(), "stored course");
        progress.report(IngestProgressEvent::Storing {
            n: i as u64 + 1,
            total,
        });
    }
    Ok(written)
}

/// Result of [`ingest_dir`].
#[derive(Debug)]
pub struct IngestRun {
    pub files: usize,
    pub chunks_written: usize,
    /// Courses deleted by `clear` because the batch did not contain them.
    pub removed: usize,
    pub report: IngestReport,
}

/// Scan `root`, ingest every matching file, and write the courses.
///
/// With `clear`, courses missing from this batch are deleted only after
/// every course in it has been written, so a failed write never leaves
/// the store emptier than before.
pub async fn ingest_dir<S: Store + ?Sized>(
    config: &Config,
    store: &S,
    root: &Path,
    clear: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestRun> {
    progress.report(IngestProgressEvent::Discovering {
        root: root.display().to_string(),
    });
    let scan = connector_fs::scan_dir(root, &config.docs)?;
    tracing::debug!(
        files = scan.files.len(),
        unreadable = scan.unreadable.len(),
        root = %root.display(),
        "scanned docs"
    );

    let mut sources = read_sources(&scan.files, progress);
    sources.extend(
        scan.unreadable
            .iter()
            .map(|u| SourceDocument::unreadable(&u.relative, &u.error)),
    );

    let pipeline = build_pipeline(&config.chunking)?;
    let report = pipeline.ingest(sources);

    let chunks_written = store_report(store, &report, progress).await?;

    let mut removed = 0;
    if clear {
        let keep: HashSet<&str> = report.courses.iter().map(|c| c.title.as_str()).collect();
        for title in store.course_titles().await? {
            if !keep.contains(title.as_str()) && store.delete_course(&title).await? {
                tracing::info!(course = %title, "removed course not in batch");
                removed += 1;
            }
        }
    }

    Ok(IngestRun {
        files: scan.files.len(),
        chunks_written,
        removed,
        report,
    })
}

pub async fn run_ingest(
    config: &Config,
    path: Option<PathBuf>,
    clear: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<()> {
    let root = path.unwrap_or_else(|| config.docs.root.clone());
    let store = SqliteStore::open(config).await?;

    let run = ingest_dir(config, &store, &root, clear, progress).await?;
    let report = &run.report;

    println!("ingest {}", root.display());
    println!("  files read: {}", run.files);
    println!("  courses: {}", report.courses.len());
    println!("  chunks written: {}", run.chunks_written);
    println!("  skipped: {}", report.skipped.len());
    for s in &report.skipped {
        println!("    {}: {}", s.source_id, s.reason);
    }
    if clear {
        println!("  cleared existing courses: {} removed", run.removed);
    }
    if !report.warnings.is_empty() {
        println!("  warnings: {}", report.warnings.len());
        for w in &report.warnings {
            println!("    {}: {}", w.source_id, w.warning);
        }
    }
    println!("ok");

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_rag_core::error::SkipReason;
    use course_rag_core::store::memory::InMemoryStore;

    const DOC_A: &str = "Course Title: Alpha Course\nCourse Instructor: Ann\n\nLesson 0: Intro\nAlpha basics are here.\n\nLesson 1: Next\nMore alpha material.\n";
    const DOC_B: &str = "Course Title: Beta Course\n\nLesson 0: Only\nBeta content sentence.\n";

    #[test]
    fn ingest_paths_keeps_going_after_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let bin = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        std::fs::write(&a, DOC_A).unwrap();
        std::fs::write(&bin, [0u8, 159, 146, 150]).unwrap();
        std::fs::write(&c, DOC_B).unwrap();
        let missing = dir.path().join("missing.txt");

        let report = ingest_paths(&[a, bin, c, missing], &ChunkingConfig::default()).unwrap();
        assert_eq!(report.courses.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(report.skipped[0].reason, SkipReason::InvalidUtf8(_)));
        assert!(matches!(report.skipped[1].reason, SkipReason::Unreadable(_)));
    }

    #[test]
    fn untitled_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("loose_notes.txt");
        std::fs::write(&p, "Lesson 1: One\nSome words.").unwrap();
        let report = ingest_paths(&[p], &ChunkingConfig::default()).unwrap();
        assert_eq!(report.courses[0].title, "loose_notes");
    }

    #[tokio::test]
    async fn ingest_dir_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), DOC_A).unwrap();
        std::fs::write(dir.path().join("b.txt"), DOC_B).unwrap();

        let config = crate::config::parse_config("[db]\npath = \"unused.sqlite\"\n").unwrap();
        let store = InMemoryStore::new();

        ingest_dir(&config, &store, dir.path(), false, &NoProgress)
            .await
            .unwrap();
        let first = store.course_chunks("Alpha Course").await.unwrap();
        ingest_dir(&config, &store, dir.path(), false, &NoProgress)
            .await
            .unwrap();
        let second = store.course_chunks("Alpha Course").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.course_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_removes_courses_no_longer_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), DOC_A).unwrap();
        let config = crate::config::parse_config("[db]\npath = \"unused.sqlite\"\n").unwrap();
        let store = InMemoryStore::new();
        store
            .replace_course(
                &course_rag_core::models::Course {
                    title: "Stale".into(),
                    link: None,
                    instructor: None,
                    lessons: vec![],
                },
                &[],
            )
            .await
            .unwrap();

        let run = ingest_dir(&config, &store, dir.path(), true, &NoProgress)
            .await
            .unwrap();
        assert_eq!(run.removed, 1);
        assert_eq!(store.course_titles().await.unwrap(), vec!["Alpha Course"]);
    }

    /// Delegates to an in-memory store but refuses to write one course.
    struct RejectingStore {
        inner: InMemoryStore,
        reject: &'static str,
    }

    #[async_trait::async_trait]
    impl Store for RejectingStore {
        async fn replace_course(
            &self,
            course: &course_rag_core::models::Course,
            chunks: &[course_rag_core::models::Chunk],
        ) -> Result<()> {
            if course.title == self.reject {
                anyhow::bail!("disk full");
            }
            self.inner.replace_course(course, chunks).await
        }

        async fn delete_course(&self, title: &str) -> Result<bool> {
            self.inner.delete_course(title).await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }

        async fn course_titles(&self) -> Result<Vec<String>> {
            self.inner.course_titles().await
        }

        async fn get_course(
            &self,
            title: &str,
        ) -> Result<Option<course_rag_core::models::CourseRecord>> {
            self.inner.get_course(title).await
        }

        async fn course_chunks(&self, title: &str) -> Result<Vec<course_rag_core::models::Chunk>> {
            self.inner.course_chunks(title).await
        }

        async fn search_chunks(
            &self,
            query: &course_rag_core::store::ChunkQuery<'_>,
        ) -> Result<Vec<course_rag_core::models::ChunkHit>> {
            self.inner.search_chunks(query).await
        }
    }

    #[tokio::test]
    async fn failed_write_with_clear_keeps_existing_courses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), DOC_A).unwrap();
        std::fs::write(dir.path().join("b.txt"), DOC_B).unwrap();
        let config = crate::config::parse_config("[db]\npath = \"unused.sqlite\"\n").unwrap();

        let store = RejectingStore {
            inner: InMemoryStore::new(),
            reject: "Beta Course",
        };
        store
            .inner
            .replace_course(
                &course_rag_core::models::Course {
                    title: "Existing".into(),
                    link: None,
                    instructor: None,
                    lessons: vec![],
                },
                &[],
            )
            .await
            .unwrap();

        let result = ingest_dir(&config, &store, dir.path(), true, &NoProgress).await;
        assert!(result.is_err());
        let titles = store.course_titles().await.unwrap();
        assert!(titles.contains(&"Existing".to_string()));
        assert!(titles.contains(&"Alpha Course".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_entry_is_skipped_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), DOC_A).unwrap();
        std::fs::write(dir.path().join("c.txt"), DOC_B).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.txt"), dir.path().join("b.txt"))
            .unwrap();

        let mut config = crate::config::parse_config("[db]\npath = \"unused.sqlite\"\n").unwrap();
        config.docs.follow_symlinks = true;
        let store = InMemoryStore::new();

        let run = ingest_dir(&config, &store, dir.path(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(run.report.courses.len(), 2);
        assert_eq!(run.report.skipped.len(), 1);
        assert_eq!(run.report.skipped[0].source_id, "b.txt");
        assert!(matches!(run.report.skipped[0].reason, SkipReason::Unreadable(_)));
        assert_eq!(store.course_count().await.unwrap(), 2);
    }
}
