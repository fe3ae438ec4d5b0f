//! Query orchestration.
//!
//! [`RagSystem`] ties the store, the search tools, the answer generator and
//! session history together. Each query gets its own [`ToolRegistry`], so
//! sources recorded by one request never leak into a concurrent one.

use anyhow::Result;
use course_rag_core::store::Store;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::generator::{create_generator, AnswerGenerator};
use crate::session::SessionManager;
use crate::sqlite_store::SqliteStore;
use crate::tools::{Source, ToolRegistry};

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub title: String,
    pub lesson_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
    pub courses: Vec<CourseSummary>,
}

pub struct RagSystem {
    store: Arc<dyn Store>,
    generator: Box<dyn AnswerGenerator>,
    sessions: SessionManager,
    max_results: usize,
}

impl RagSystem {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        let generator = create_generator(&config.generation)?;
        Ok(Self::with_generator(config, store, generator))
    }

    pub fn with_generator(
        config: &Config,
        store: Arc<dyn Store>,
        generator: Box<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            store,
            generator,
            sessions: SessionManager::with_capacity(
                config.generation.max_history,
                config.generation.max_sessions,
            ),
            max_results: config.retrieval.max_results,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer `query`, recording the exchange when `session_id` is given.
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryAnswer> {
        let tools = ToolRegistry::with_course_tools(Arc::clone(&self.store), self.max_results);
        let history = session_id.and_then(|id| self.sessions.history(id));

        let answer = self
            .generator
            .generate(query, history.as_deref(), &tools)
            .await?;

        let sources = tools.last_sources();
        tools.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer);
        }
        tracing::info!(
            session = session_id.unwrap_or("-"),
            sources = sources.len(),
            "answered query"
        );

        Ok(QueryAnswer { answer, sources })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let titles = self.store.course_titles().await?;
        let mut courses = Vec::with_capacity(titles.len());
        for title in &titles {
            let lesson_count = self
                .store
                .get_course(title)
                .await?
                .map(|r| r.lesson_count())
                .unwrap_or(0);
            courses.push(CourseSummary {
                title: title.clone(),
                lesson_count,
            });
        }
        Ok(CourseAnalytics {
            total_courses: titles.len(),
            course_titles: titles,
            courses,
        })
    }
}

/// `crag ask`: answer one question against the SQLite store.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    let store = Arc::new(SqliteStore::open(config).await?);
    let rag = RagSystem::new(config, Arc::clone(&store) as Arc<dyn Store>)?;
    let answer = rag.query(question, None).await;
    store.close().await;
    let answer = answer?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("sources:");
        for source in &answer.sources {
            match &source.link {
                Some(link) => println!("  {} <{}>", source.text, link),
                None => println!("  {}", source.text),
            }
        }
    }
    Ok(())
}
