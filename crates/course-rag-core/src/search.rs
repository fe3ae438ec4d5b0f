//! Course-aware retrieval on top of a [`Store`].
//!
//! Callers rarely know a course's exact title, so a search first resolves
//! the requested course name against the catalog:
//!
//! 1. Case-insensitive exact match.
//! 2. Substring match in either direction (shortest title wins).
//! 3. Token overlap: the title sharing the largest fraction of the name's
//!    terms, provided at least half of them match.
//!
//! The resolved title and optional lesson number then filter the chunk
//! search. An unresolvable course name is an error, never an unfiltered
//! search.

use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::models::ChunkHit;
use crate::store::{ChunkQuery, Store};

/// Lowercased alphanumeric terms of `text`, in order, with duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of distinct `terms` that occur in `text`. `0.0` when `terms` is empty.
pub fn overlap_score(terms: &[String], text: &str) -> f64 {
    let wanted: HashSet<&str> = terms.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return 0.0;
    }
    let present: HashSet<String> = tokenize(text).into_iter().collect();
    let matched = wanted.iter().filter(|t| present.contains(**t)).count();
    matched as f64 / wanted.len() as f64
}

/// Resolve a loosely written course name to one of `titles`.
pub fn resolve_course_title<'a>(name: &str, titles: &'a [String]) -> Option<&'a str> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(t) = titles.iter().find(|t| t.to_lowercase() == needle) {
        return Some(t.as_str());
    }

    let substring = titles
        .iter()
        .filter(|t| {
            let lower = t.to_lowercase();
            lower.contains(&needle) || needle.contains(&lower)
        })
        .min_by_key(|t| t.chars().count());
    if let Some(t) = substring {
        return Some(t.as_str());
    }

    let terms = tokenize(&needle);
    let mut best: Option<(&'a str, f64)> = None;
    for t in titles {
        let score = overlap_score(&terms, t);
        if score >= 0.5 && best.map_or(true, |(_, s)| score > s) {
            best = Some((t.as_str(), score));
        }
    }
    best.map(|(t, _)| t)
}

/// One course-content search.
#[derive(Debug, Clone, Copy)]
pub struct CourseSearch<'a> {
    pub query: &'a str,
    /// Loose course name, resolved with [`resolve_course_title`].
    pub course_name: Option<&'a str>,
    pub lesson_number: Option<u32>,
    pub limit: usize,
}

/// Hits plus the filters that were actually applied.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSearchOutcome {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
    pub hits: Vec<ChunkHit>,
}

/// Resolve the course filter, then search chunks.
///
/// # Errors
///
/// `No course found matching '<name>'` when `course_name` resolves to
/// nothing, or any store error.
pub async fn search_course_content<S: Store + ?Sized>(
    store: &S,
    req: &CourseSearch<'_>,
) -> Result<CourseSearchOutcome> {
    let course_title = match req.course_name {
        Some(name) => match store.resolve_course_name(name).await? {
            Some(t) => Some(t),
            None => bail!("No course found matching '{}'", name),
        },
        None => None,
    };

    let mut query = ChunkQuery::new(req.query, req.limit);
    query.course_title = course_title.as_deref();
    query.lesson_number = req.lesson_number;
    let hits = store.search_chunks(&query).await?;

    Ok(CourseSearchOutcome {
        course_title,
        lesson_number: req.lesson_number,
        hits,
    })
}
