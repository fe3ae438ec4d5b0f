//! `crag courses` and `crag outline`: what is in the course catalog.

use anyhow::{bail, Result};
use course_rag_core::store::Store;
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::tools::{CourseOutlineTool, Tool};

pub async fn run_courses(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let titles = store.course_titles().await?;
    let chunks = store.chunk_count().await?;

    println!("Courses: {}", titles.len());
    println!("Chunks:  {}", chunks);
    if !titles.is_empty() {
        println!();
    }
    for title in &titles {
        let lessons = store
            .get_course(title)
            .await?
            .map(|r| r.lesson_count())
            .unwrap_or(0);
        println!("  {} ({} lessons)", title, lessons);
    }

    store.close().await;
    Ok(())
}

pub async fn run_outline(config: &Config, course_name: &str) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let tool = CourseOutlineTool::new(store.clone() as Arc<dyn Store>);
    let output = tool.execute(json!({ "course_name": course_name })).await;
    store.close().await;
    let output = output?;

    if output.sources.is_empty() {
        bail!("{}", output.text);
    }
    println!("{}", output.text);
    Ok(())
}
