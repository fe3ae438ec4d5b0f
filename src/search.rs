//! `crag search`: ranked chunk search from the command line.

use anyhow::Result;
use course_rag_core::search::{search_course_content, CourseSearch};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_search(
    config: &Config,
    query: &str,
    course: Option<String>,
    lesson: Option<u32>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = SqliteStore::open(config).await?;
    let req = CourseSearch {
        query,
        course_name: course.as_deref(),
        lesson_number: lesson,
        limit: limit.unwrap_or(config.retrieval.max_results),
    };
    let outcome = search_course_content(&store, &req).await;
    store.close().await;
    let outcome = outcome?;

    if outcome.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    if let Some(title) = &outcome.course_title {
        println!("course: {}", title);
        println!();
    }

    for (i, hit) in outcome.hits.iter().enumerate() {
        let lesson = hit
            .lesson_number
            .map(|n| format!("lesson {}", n))
            .unwrap_or_else(|| "no lesson".to_string());
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            hit.score,
            hit.course_title,
            lesson
        );
        println!("    chunk: {}", hit.chunk_index);
        println!("    excerpt: \"{}\"", excerpt(&hit.content, 240));
        println!();
    }

    Ok(())
}

/// First `max` chars of `text` on one line.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short\ntext", 20), "short text");
        assert_eq!(excerpt("ééééé", 3), "ééé...");
    }
}
