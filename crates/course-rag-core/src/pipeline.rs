//! Batch ingestion: raw documents in, courses and indexed chunks out.
//!
//! The pipeline is pure. It does not read files or write to a store; the
//! caller supplies each document's bytes (or the read error) and persists
//! the [`IngestReport`]. A document that cannot be decoded or parsed is
//! recorded in [`IngestReport::skipped`] and the rest of the batch
//! continues.
//!
//! # Ordering
//!
//! Output follows input order. When two documents share a course title the
//! later one wins and the earlier one is dropped with a warning, so running
//! the same batch twice produces identical output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseWarning, SkipReason};
use crate::models::{Chunk, Course};
use crate::parser::{ChunkedDocument, DocumentParser};

/// How chunk indices are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkIndexPolicy {
    /// Each course starts at 0.
    #[default]
    PerCourse,
    /// One counter runs across the whole batch.
    Global,
}

/// One input document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Where the document came from (usually a file path). Used in reports.
    pub source_id: String,
    /// Title used when the document has no `Course Title:` line.
    pub fallback_title: Option<String>,
    /// Document bytes, or the error that prevented reading them.
    pub bytes: Result<Vec<u8>, String>,
}

impl SourceDocument {
    pub fn new(source_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_id: source_id.into(),
            fallback_title: None,
            bytes: Ok(bytes),
        }
    }

    pub fn unreadable(source_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            fallback_title: None,
            bytes: Err(error.into()),
        }
    }

    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub source_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentWarning {
    pub source_id: String,
    pub warning: IngestWarning,
}

/// A recoverable problem attached to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum IngestWarning {
    Parse(ParseWarning),
    /// A later document in the same batch had the same course title.
    Superseded { course_title: String, by: String },
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestWarning::Parse(w) => w.fmt(f),
            IngestWarning::Superseded { course_title, by } => {
                write!(f, "course '{}' superseded by {}", course_title, by)
            }
        }
    }
}

/// Everything produced by one [`IngestionPipeline::ingest`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub courses: Vec<Course>,
    pub chunks: Vec<Chunk>,
    pub skipped: Vec<SkippedDocument>,
    pub warnings: Vec<DocumentWarning>,
}

impl IngestReport {
    /// Chunks belonging to `course_title`, in index order.
    pub fn chunks_for<'a>(&'a self, course_title: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks
            .iter()
            .filter(move |c| c.course_title == course_title)
    }
}

pub struct IngestionPipeline {
    parser: DocumentParser,
    policy: ChunkIndexPolicy,
}

impl IngestionPipeline {
    pub fn new(parser: DocumentParser, policy: ChunkIndexPolicy) -> Self {
        Self { parser, policy }
    }

    pub fn parser(&self) -> &DocumentParser {
        &self.parser
    }

    pub fn policy(&self) -> ChunkIndexPolicy {
        self.policy
    }

    /// Decode, parse and chunk every document in `sources`.
    pub fn ingest(&self, sources: Vec<SourceDocument>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut parsed: Vec<(String, ChunkedDocument)> = Vec::new();

        for source in sources {
            match self.ingest_one(&source) {
                Ok(doc) => {
                    for w in &doc.warnings {
                        tracing::warn!(source = %source.source_id, "{}", w);
                        report.warnings.push(DocumentWarning {
                            source_id: source.source_id.clone(),
                            warning: IngestWarning::Parse(w.clone()),
                        });
                    }
                    parsed.push((source.source_id, doc));
                }
                Err(reason) => {
                    tracing::warn!(source = %source.source_id, "skipping document: {}", reason);
                    report.skipped.push(SkippedDocument {
                        source_id: source.source_id,
                        reason,
                    });
                }
            }
        }

        // last occurrence of each title wins
        let mut last_seen: HashMap<String, usize> = HashMap::new();
        for (i, (_, doc)) in parsed.iter().enumerate() {
            last_seen.insert(doc.course.title.clone(), i);
        }

        let mut next_global = 0u64;
        for (i, (source_id, doc)) in parsed.into_iter().enumerate() {
            let winner = last_seen[&doc.course.title];
            if winner != i {
                tracing::warn!(
                    source = %source_id,
                    course = %doc.course.title,
                    "duplicate course title in batch, keeping the later document"
                );
                report.warnings.push(DocumentWarning {
                    source_id,
                    warning: IngestWarning::Superseded {
                        course_title: doc.course.title.clone(),
                        by: format!("document #{}", winner + 1),
                    },
                });
                continue;
            }

            let mut next_index = match self.policy {
                ChunkIndexPolicy::PerCourse => 0,
                ChunkIndexPolicy::Global => next_global,
            };
            for draft in doc.chunks {
                report.chunks.push(draft.into_chunk(next_index));
                next_index += 1;
            }
            next_global = next_index.max(next_global);

            tracing::debug!(
                source = %source_id,
                course = %doc.course.title,
                lessons = doc.course.lessons.len(),
                "parsed course"
            );
            report.courses.push(doc.course);
        }

        report
    }

    fn ingest_one(&self, source: &SourceDocument) -> Result<ChunkedDocument, SkipReason> {
        let bytes = source
            .bytes
            .as_ref()
            .map_err(|e| SkipReason::Unreadable(e.clone()))?;
        let text = decode(bytes)?;
        self.parser
            .parse_and_chunk(text, source.fallback_title.as_deref())
            .map_err(|e| match e {
                ParseError::MissingTitle => SkipReason::MissingTitle,
            })
    }
}

/// UTF-8 decode with BOM stripping. Text containing NUL is treated as binary.
pub fn decode(bytes: &[u8]) -> Result<&str, SkipReason> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| SkipReason::InvalidUtf8(e.valid_up_to()))?;
    if text.contains('\0') {
        return Err(SkipReason::Binary);
    }
    Ok(text)
}
