//! Sentence-boundary text chunker with overlap.
//!
//! Splits lesson text into segments of at most `max_size` characters,
//! preferring to cut just after a sentence end. Consecutive chunks share
//! `overlap` characters: each chunk after the first starts `overlap`
//! characters before the previous cut.
//!
//! # Algorithm
//!
//! 1. If the text from the current start fits in `max_size`, emit it and stop.
//! 2. Otherwise look backward from `start + max_size` for the nearest
//!    sentence end (`.`, `!`, `?` followed by whitespace or end of text)
//!    whose cut point lies past `start + overlap`.
//! 3. If there is none, find the sentence that crosses the window end. When
//!    it is longer than `max_size`, [`SentenceOverflow`] decides: extend to
//!    its end (one oversized chunk) or cut at the `max_size` boundary. A
//!    sentence that would fit on its own is always cut at the boundary.
//! 4. Restart `overlap` characters before the cut. A whitespace-only
//!    remainder ends the loop without emitting a chunk.
//!
//! Lengths are measured in `char`s, never bytes, and every chunk is an exact
//! slice of the input.
//!
//! # Example
//!
//! ```rust
//! use course_rag_core::chunk::{split_text, ChunkConfig};
//!
//! let config = ChunkConfig::new(20, 5).unwrap();
//! let chunks = split_text("One short line. Another short line.", &config).unwrap();
//! assert_eq!(chunks[0], "One short line.");
//! assert!(chunks[1].starts_with("line."));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Default target chunk length in characters.
pub const DEFAULT_MAX_SIZE: usize = 800;

/// Default carry-over between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 100;

/// What to do when no sentence boundary exists inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceOverflow {
    /// Emit one oversized chunk that runs to the next sentence end.
    #[default]
    Extend,
    /// Cut at exactly `max_size` characters.
    HardSplit,
}

/// Chunk sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub max_size: usize,
    pub overlap: usize,
    pub overflow: SentenceOverflow,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            overlap: DEFAULT_OVERLAP,
            overflow: SentenceOverflow::Extend,
        }
    }
}

impl ChunkConfig {
    /// Build a validated config with the default overflow policy.
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ConfigurationError> {
        let config = Self {
            max_size,
            overlap,
            overflow: SentenceOverflow::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_overflow(mut self, overflow: SentenceOverflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Requires `0 <= overlap < max_size`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_size == 0 {
            return Err(ConfigurationError::ZeroMaxSize);
        }
        if self.overlap >= self.max_size {
            return Err(ConfigurationError::OverlapTooLarge {
                max_size: self.max_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

/// Split `text` into overlapping, sentence-aligned chunks.
///
/// Returns an empty vector for empty or whitespace-only text, and exactly
/// one chunk when the text fits in `max_size`.
///
/// # Errors
///
/// [`ConfigurationError`] if `config` violates `0 <= overlap < max_size`.
pub fn split_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>, ConfigurationError> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let max = config.max_size;
    let overlap = config.overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        if len - start <= max {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let window_end = start + max;
        let cut = last_sentence_end(&chars, start + overlap, window_end).unwrap_or_else(|| {
            // the crossing sentence begins at the last boundary inside the overlap
            let sentence_start = last_sentence_end(&chars, start, start + overlap).unwrap_or(start);
            let sentence_end = next_sentence_end(&chars, window_end).unwrap_or(len);
            let oversized = sentence_end - sentence_start > max;
            match config.overflow {
                SentenceOverflow::Extend if oversized => sentence_end,
                _ => window_end,
            }
        });

        chunks.push(chars[start..cut].iter().collect());

        if chars[cut..].iter().all(|c| c.is_whitespace()) {
            break;
        }
        // cut > start + overlap always holds, so this moves forward
        start = cut - overlap;
    }

    Ok(chunks)
}

/// `chars[i]` ends a sentence: terminal punctuation followed by whitespace or EOF.
fn is_sentence_end(chars: &[char], i: usize) -> bool {
    matches!(chars[i], '.' | '!' | '?')
        && chars.get(i + 1).map_or(true, |c| c.is_whitespace())
}

/// Largest cut point in `(lo, hi]` that falls just after a sentence end.
fn last_sentence_end(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    (lo + 1..=hi).rev().find(|&cut| is_sentence_end(chars, cut - 1))
}

/// First cut point after `from` that falls just after a sentence end.
fn next_sentence_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len())
        .find(|&i| is_sentence_end(chars, i))
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig::new(max, overlap).unwrap()
    }

    fn sample_text() -> String {
        (0..40)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i * 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_max() {
        assert_eq!(
            ChunkConfig::new(100, 100),
            Err(ConfigurationError::OverlapTooLarge {
                max_size: 100,
                overlap: 100
            })
        );
        assert_eq!(ChunkConfig::new(0, 0), Err(ConfigurationError::ZeroMaxSize));

        let bad = ChunkConfig {
            max_size: 10,
            overlap: 50,
            overflow: SentenceOverflow::Extend,
        };
        assert!(split_text("anything", &bad).is_err());
    }

    #[test]
    fn test_default_config() {
        let c = ChunkConfig::default();
        assert_eq!(c.max_size, 800);
        assert_eq!(c.overlap, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", &cfg(800, 100)).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(split_text("", &cfg(800, 100)).unwrap().is_empty());
        assert!(split_text("   \n\t ", &cfg(800, 100)).unwrap().is_empty());
    }

    #[test]
    fn test_cuts_at_sentence_end() {
        let text = "Hello world. This is lesson zero content that is long enough to require splitting into two parts for the test.";
        let chunks = split_text(text, &cfg(60, 10)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Hello world.");
        assert!(chunks[1].starts_with("llo world."));
        assert!(chunks[1].ends_with("for the test."));
    }

    #[test]
    fn test_overlap_is_prefix_of_next_chunk() {
        let text = sample_text();
        let config = cfg(200, 30);
        let chunks = split_text(&text, &config).unwrap();
        assert!(chunks.len() > 3);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let tail: String = prev[prev.len() - 30..].iter().collect();
            assert!(
                pair[1].starts_with(&tail),
                "chunk {:?} does not start with {:?}",
                pair[1],
                tail
            );
        }
    }

    #[test]
    fn test_chunks_reconstruct_text() {
        let text = sample_text();
        let overlap = 25;
        let chunks = split_text(&text, &cfg(150, overlap)).unwrap();
        let mut rebuilt = chunks[0].clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_bounds_respected_with_short_sentences() {
        let text = sample_text();
        for c in split_text(&text, &cfg(120, 20)).unwrap() {
            assert!(c.chars().count() <= 120, "oversized chunk: {:?}", c);
        }
    }

    #[test]
    fn test_sentence_crossing_window_is_cut_when_it_fits() {
        let text = "Alpha is short. Bbbbbbbbb bbbbbbbbb bbbbbbbbb bbbbbbbb. Tail sentence goes here okay.";
        let overlap = 20;
        let chunks = split_text(text, &cfg(50, overlap)).unwrap();
        for c in &chunks {
            assert!(c.chars().count() <= 50, "oversized chunk: {:?}", c);
        }
        let mut rebuilt = chunks[0].clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_bounds_respected_with_mixed_sentence_lengths() {
        let words = ["a", "bb", "ccc", "dddd", "eeeee"];
        let text = (0..60)
            .map(|i| {
                let n = 1 + (i * 7) % 9;
                let sentence: Vec<&str> = (0..n).map(|j| words[(i + j) % words.len()]).collect();
                format!("{}.", sentence.join(" "))
            })
            .collect::<Vec<_>>()
            .join(" ");
        for (max, overlap) in [(40, 15), (45, 30), (60, 10)] {
            for c in split_text(&text, &cfg(max, overlap)).unwrap() {
                assert!(c.chars().count() <= max, "oversized chunk: {:?}", c);
            }
        }
    }

    #[test]
    fn test_long_sentence_extends_into_one_oversized_chunk() {
        let long = "word ".repeat(40);
        let text = format!("Short start. {}end. Tail sentence.", long);
        let chunks = split_text(&text, &cfg(50, 5)).unwrap();
        let oversized: Vec<_> = chunks.iter().filter(|c| c.chars().count() > 50).collect();
        assert_eq!(oversized.len(), 1);
        assert!(oversized[0].ends_with("end."));
        // nothing is dropped
        assert!(chunks.last().unwrap().ends_with("Tail sentence."));
    }

    #[test]
    fn test_hard_split_policy_never_exceeds_max() {
        let text = "x".repeat(250);
        let config = cfg(100, 10).with_overflow(SentenceOverflow::HardSplit);
        let chunks = split_text(&text, &config).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_trailing_whitespace_remainder_dropped() {
        let text = format!("{} {}", "First sentence here.", "Second one ends.   \n\n  ");
        let chunks = split_text(&text, &cfg(25, 5)).unwrap();
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_zero_overlap() {
        let text = "Alpha beta. Gamma delta. Epsilon zeta.";
        let chunks = split_text(text, &cfg(13, 0)).unwrap();
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks[0], "Alpha beta.");
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "Ünïcödé sèntence ønë. Ånother sëntence twö. Thïrd sentence thrëe.";
        let chunks = split_text(text, &cfg(30, 4)).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
        assert_eq!(chunks[0], "Ünïcödé sèntence ønë.");
    }

    #[test]
    fn test_question_and_exclamation_boundaries() {
        let text = "Is this a question? Yes it is! And a statement follows here.";
        let chunks = split_text(text, &cfg(35, 3)).unwrap();
        assert_eq!(chunks[0], "Is this a question? Yes it is!");
    }

    #[test]
    fn test_abbreviation_without_space_is_not_a_boundary() {
        let text = "Version 1.5 was released. Then version 2.0 arrived with more.";
        let chunks = split_text(text, &cfg(30, 2)).unwrap();
        assert_eq!(chunks[0], "Version 1.5 was released.");
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let a = split_text(&text, &cfg(90, 15)).unwrap();
        let b = split_text(&text, &cfg(90, 15)).unwrap();
        assert_eq!(a, b);
    }
}
