//! Typed errors and recoverable diagnostics for the ingestion core.
//!
//! [`ConfigurationError`] is fatal and raised before any document is
//! touched. [`ParseWarning`] and [`SkipReason`] are recoverable: they are
//! collected on the parse result or the ingest report and logged, and
//! processing of the remaining input continues.

use serde::Serialize;
use thiserror::Error;

/// Invalid chunking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("chunk max_size must be > 0")]
    ZeroMaxSize,

    #[error("chunk overlap ({overlap}) must be smaller than max_size ({max_size})")]
    OverlapTooLarge { max_size: usize, overlap: usize },
}

/// A document that cannot become a course at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document has no 'Course Title:' line and no fallback title")]
    MissingTitle,
}

/// Partially malformed input the parser recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// No `Course Title:` line; the fallback title was used.
    TitleFallback { title: String },
    /// A header label was present with an empty value; the field is unset.
    EmptyHeaderField { label: String },
    /// Non-blank text between the header and the first lesson marker.
    UnattachedContent { line: usize },
    /// A lesson number appeared twice; the second body was merged into the first.
    DuplicateLesson { lesson_number: u32 },
    /// A `Lesson Link:` line with no value.
    EmptyLessonLink { lesson_number: u32 },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::TitleFallback { title } => {
                write!(f, "missing 'Course Title:' line, using '{}'", title)
            }
            ParseWarning::EmptyHeaderField { label } => {
                write!(f, "empty value for '{}', field left unset", label)
            }
            ParseWarning::UnattachedContent { line } => {
                write!(f, "line {} is outside any lesson and was ignored", line)
            }
            ParseWarning::DuplicateLesson { lesson_number } => {
                write!(f, "lesson {} appears more than once, bodies merged", lesson_number)
            }
            ParseWarning::EmptyLessonLink { lesson_number } => {
                write!(f, "lesson {} has an empty 'Lesson Link:'", lesson_number)
            }
        }
    }
}

/// Why a document was left out of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("unreadable: {0}")]
    Unreadable(String),

    #[error("not valid UTF-8 (first bad byte at offset {0})")]
    InvalidUtf8(usize),

    #[error("binary content")]
    Binary,

    #[error("no course title")]
    MissingTitle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_messages() {
        let e = ConfigurationError::OverlapTooLarge {
            max_size: 10,
            overlap: 10,
        };
        assert_eq!(
            e.to_string(),
            "chunk overlap (10) must be smaller than max_size (10)"
        );
    }

    #[test]
    fn skip_reason_serializes_with_kind() {
        let json = serde_json::to_value(SkipReason::InvalidUtf8(4)).unwrap();
        assert_eq!(json["kind"], "invalid_utf8");
        assert_eq!(json["detail"], 4);
    }
}
