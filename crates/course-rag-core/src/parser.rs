//! Course document parser.
//!
//! A course document is plain text with a short labelled header followed
//! by numbered lessons:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson0
//! Welcome to the course. ...
//!
//! Lesson 1: Getting Started
//! ...
//! ```
//!
//! Header labels are matched case-insensitively and in order; link and
//! instructor are optional. Lesson boundaries are found by a
//! [`LessonBoundaryDetector`], by default [`LessonHeadingDetector`]
//! (`Lesson <digits>: <title>`). Malformed metadata never aborts parsing:
//! the affected field is left unset and a [`ParseWarning`] is recorded.

use regex::Regex;

use crate::chunk::{split_text, ChunkConfig};
use crate::error::{ConfigurationError, ParseError, ParseWarning};
use crate::models::{Chunk, Course, Lesson};

const TITLE_LABEL: &str = "Course Title:";
const LINK_LABEL: &str = "Course Link:";
const INSTRUCTOR_LABEL: &str = "Course Instructor:";
const LESSON_LINK_LABEL: &str = "Lesson Link:";

/// A recognised lesson heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonMarker {
    pub lesson_number: u32,
    pub title: String,
}

/// Decides whether a line starts a new lesson.
///
/// The parser calls [`detect`](LessonBoundaryDetector::detect) with each
/// trimmed body line; any line for which it returns `Some` opens a lesson.
pub trait LessonBoundaryDetector: Send + Sync {
    fn detect(&self, line: &str) -> Option<LessonMarker>;
}

/// Matches `Lesson <digits>: <title>`, case-insensitively.
pub struct LessonHeadingDetector {
    pattern: Regex,
}

impl LessonHeadingDetector {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?i)^lesson\s+(\d+):\s*(.+)$")
                .expect("lesson heading pattern is valid"),
        }
    }

    /// Use a custom pattern. It must capture the lesson number in group 1
    /// and the title in group 2.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for LessonHeadingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LessonBoundaryDetector for LessonHeadingDetector {
    fn detect(&self, line: &str) -> Option<LessonMarker> {
        let caps = self.pattern.captures(line)?;
        let lesson_number = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let title = caps.get(2)?.as_str().trim();
        if title.is_empty() {
            return None;
        }
        Some(LessonMarker {
            lesson_number,
            title: title.to_string(),
        })
    }
}

/// A lesson with its raw body, before chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
    pub body: String,
}

/// Result of [`DocumentParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<ParsedLesson>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedDocument {
    /// Course metadata without lesson bodies.
    pub fn course(&self) -> Course {
        Course {
            title: self.title.clone(),
            link: self.link.clone(),
            instructor: self.instructor.clone(),
            lessons: self
                .lessons
                .iter()
                .map(|l| Lesson {
                    lesson_number: l.lesson_number,
                    title: l.title.clone(),
                    lesson_link: l.lesson_link.clone(),
                })
                .collect(),
        }
    }
}

/// A chunk that has not been assigned its index yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub content: String,
}

impl ChunkDraft {
    pub fn into_chunk(self, chunk_index: u64) -> Chunk {
        Chunk::new(
            self.content,
            self.course_title,
            self.lesson_number,
            chunk_index,
        )
    }
}

/// Course metadata plus its chunk drafts in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDocument {
    pub course: Course,
    pub chunks: Vec<ChunkDraft>,
    pub warnings: Vec<ParseWarning>,
}

/// Contextual header prepended to every chunk.
pub fn contextual_prefix(course_title: &str, lesson_number: u32) -> String {
    format!("Course {} Lesson {} content: ", course_title, lesson_number)
}

/// Parses course documents and splits their lessons into chunk drafts.
pub struct DocumentParser {
    chunk_config: ChunkConfig,
    normalize_whitespace: bool,
    detector: Box<dyn LessonBoundaryDetector>,
}

impl std::fmt::Debug for DocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentParser")
            .field("chunk_config", &self.chunk_config)
            .field("normalize_whitespace", &self.normalize_whitespace)
            .finish_non_exhaustive()
    }
}

impl DocumentParser {
    /// Create a parser with the default lesson detector.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if `chunk_config` is invalid.
    pub fn new(chunk_config: ChunkConfig) -> Result<Self, ConfigurationError> {
        chunk_config.validate()?;
        Ok(Self {
            chunk_config,
            normalize_whitespace: true,
            detector: Box::new(LessonHeadingDetector::new()),
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn LessonBoundaryDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Collapse whitespace runs in lesson bodies to single spaces (default on).
    pub fn normalize_whitespace(mut self, enabled: bool) -> Self {
        self.normalize_whitespace = enabled;
        self
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.chunk_config
    }

    /// Parse a document that must carry its own `Course Title:` line.
    pub fn parse(&self, raw: &str) -> Result<ParsedDocument, ParseError> {
        self.parse_with_fallback(raw, None)
    }

    /// Parse a document, using `fallback_title` when the header has no title.
    pub fn parse_with_fallback(
        &self,
        raw: &str,
        fallback_title: Option<&str>,
    ) -> Result<ParsedDocument, ParseError> {
        let lines: Vec<&str> = raw.lines().collect();
        let mut warnings = Vec::new();

        let (header, body_start) = parse_header(&lines, &mut warnings);

        let title = match header.title {
            Some(t) => t,
            None => {
                let fallback = fallback_title
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(ParseError::MissingTitle)?;
                warnings.push(ParseWarning::TitleFallback {
                    title: fallback.to_string(),
                });
                fallback.to_string()
            }
        };

        let lessons = self.parse_lessons(&lines, body_start, &mut warnings);

        Ok(ParsedDocument {
            title,
            link: header.link,
            instructor: header.instructor,
            lessons,
            warnings,
        })
    }

    /// Split each lesson body and prefix every piece with its context.
    ///
    /// Lessons whose body is empty after trimming keep their place in the
    /// course outline but yield no chunks.
    pub fn chunk(&self, doc: ParsedDocument) -> ChunkedDocument {
        let course = doc.course();
        let mut chunks = Vec::new();

        for lesson in &doc.lessons {
            if lesson.body.trim().is_empty() {
                continue;
            }
            // validated in `new`
            let pieces = split_text(&lesson.body, &self.chunk_config).unwrap_or_default();
            let prefix = contextual_prefix(&course.title, lesson.lesson_number);
            chunks.extend(pieces.into_iter().map(|piece| ChunkDraft {
                course_title: course.title.clone(),
                lesson_number: Some(lesson.lesson_number),
                content: format!("{}{}", prefix, piece),
            }));
        }

        ChunkedDocument {
            course,
            chunks,
            warnings: doc.warnings,
        }
    }

    /// [`parse_with_fallback`](Self::parse_with_fallback) followed by [`chunk`](Self::chunk).
    pub fn parse_and_chunk(
        &self,
        raw: &str,
        fallback_title: Option<&str>,
    ) -> Result<ChunkedDocument, ParseError> {
        let doc = self.parse_with_fallback(raw, fallback_title)?;
        Ok(self.chunk(doc))
    }

    fn parse_lessons(
        &self,
        lines: &[&str],
        body_start: usize,
        warnings: &mut Vec<ParseWarning>,
    ) -> Vec<ParsedLesson> {
        let mut lessons: Vec<ParsedLesson> = Vec::new();
        let mut open: Option<(LessonMarker, Vec<&str>)> = None;
        let mut reported_unattached = false;

        for (i, line) in lines.iter().enumerate().skip(body_start) {
            if let Some(marker) = self.detector.detect(line.trim()) {
                if let Some((m, body)) = open.take() {
                    self.close_lesson(&mut lessons, m, &body, warnings);
                }
                open = Some((marker, Vec::new()));
            } else if let Some((_, body)) = open.as_mut() {
                body.push(line);
            } else if !line.trim().is_empty() && !reported_unattached {
                warnings.push(ParseWarning::UnattachedContent { line: i + 1 });
                reported_unattached = true;
            }
        }
        if let Some((m, body)) = open.take() {
            self.close_lesson(&mut lessons, m, &body, warnings);
        }

        lessons
    }

    fn close_lesson(
        &self,
        lessons: &mut Vec<ParsedLesson>,
        marker: LessonMarker,
        body_lines: &[&str],
        warnings: &mut Vec<ParseWarning>,
    ) {
        let mut body_lines = body_lines;
        let mut lesson_link = None;

        if let Some(first) = body_lines.iter().position(|l| !l.trim().is_empty()) {
            if let Some(value) = strip_label(body_lines[first].trim(), LESSON_LINK_LABEL) {
                if value.is_empty() {
                    warnings.push(ParseWarning::EmptyLessonLink {
                        lesson_number: marker.lesson_number,
                    });
                } else {
                    lesson_link = Some(value.to_string());
                }
                body_lines = &body_lines[first + 1..];
            }
        }

        let raw_body = body_lines.join("\n");
        let body = if self.normalize_whitespace {
            raw_body.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            raw_body.trim().to_string()
        };

        if let Some(existing) = lessons
            .iter_mut()
            .find(|l| l.lesson_number == marker.lesson_number)
        {
            warnings.push(ParseWarning::DuplicateLesson {
                lesson_number: marker.lesson_number,
            });
            if !body.is_empty() {
                if !existing.body.is_empty() {
                    existing.body.push(if self.normalize_whitespace { ' ' } else { '\n' });
                }
                existing.body.push_str(&body);
            }
            if existing.lesson_link.is_none() {
                existing.lesson_link = lesson_link;
            }
            return;
        }

        lessons.push(ParsedLesson {
            lesson_number: marker.lesson_number,
            title: marker.title,
            lesson_link,
            body,
        });
    }
}

#[derive(Default)]
struct Header {
    title: Option<String>,
    link: Option<String>,
    instructor: Option<String>,
}

/// Consume the labelled header lines. Returns the header and the index of
/// the first line after it.
fn parse_header(lines: &[&str], warnings: &mut Vec<ParseWarning>) -> (Header, usize) {
    let labels = [TITLE_LABEL, LINK_LABEL, INSTRUCTOR_LABEL];
    let mut header = Header::default();
    let mut next_label = 0;
    let mut pos = 0;

    while next_label < labels.len() {
        let Some(idx) = (pos..lines.len()).find(|&i| !lines[i].trim().is_empty()) else {
            break;
        };
        let line = lines[idx].trim();

        let found = labels[next_label..]
            .iter()
            .enumerate()
            .find_map(|(offset, label)| strip_label(line, label).map(|v| (next_label + offset, v)));
        let Some((field, value)) = found else {
            break;
        };

        let value = if value.is_empty() {
            warnings.push(ParseWarning::EmptyHeaderField {
                label: labels[field].trim_end_matches(':').to_string(),
            });
            None
        } else {
            Some(value.to_string())
        };
        match field {
            0 => header.title = value,
            1 => header.link = value,
            _ => header.instructor = value,
        }

        next_label = field + 1;
        pos = idx + 1;
    }

    (header, pos)
}

/// If `line` starts with `label` (ASCII case-insensitive), return the trimmed rest.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}
