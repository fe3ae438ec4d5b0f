//! Search tools exposed to the answer generator.
//!
//! Each tool declares a JSON Schema for its parameters (the shape the
//! Anthropic Messages API expects under `input_schema`) and returns plain
//! text for the model plus the [`Source`]s it drew on. The
//! [`ToolRegistry`] dispatches by name and remembers the sources of the
//! most recent execution of each tool so the caller can attach them to
//! the final answer.
//!
//! # Built-in tools
//!
//! | Name | Purpose |
//! |------|---------|
//! | `search_course_content` | Ranked chunk search with optional course/lesson filter |
//! | `get_course_outline` | Course title, link, instructor and lesson list |

use anyhow::{bail, Result};
use async_trait::async_trait;
use course_rag_core::search::{search_course_content, CourseSearch};
use course_rag_core::store::Store;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Where a piece of an answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    /// `"Course - Lesson N"`, `"Course"`, or `"Course - Course Outline"`.
    pub text: String,
    pub link: Option<String>,
}

/// Text for the model plus the sources behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// A tool the answer generator can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores. Must not be empty.
    fn name(&self) -> &str;

    /// One-line description for the model.
    fn description(&self) -> &str;

    /// JSON Schema object with `type: "object"`, `properties`, and `required`.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    ///
    /// Lookups that find nothing are reported in the output text;
    /// `Err` is reserved for invalid parameters.
    async fn execute(&self, params: Value) -> Result<ToolOutput>;
}

// ═══════════════════════════════════════════════════════════════════════
// search_course_content
// ═══════════════════════════════════════════════════════════════════════

pub struct CourseSearchTool {
    store: Arc<dyn Store>,
    max_results: usize,
}

impl CourseSearchTool {
    pub fn new(store: Arc<dyn Store>, max_results: usize) -> Self {
        Self { store, max_results }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let query = required_str(&params, "query")?;
        let course_name = optional_str(&params, "course_name");
        let lesson_number = optional_lesson(&params)?;

        let req = CourseSearch {
            query: &query,
            course_name: course_name.as_deref(),
            lesson_number,
            limit: self.max_results,
        };
        let outcome = match search_course_content(self.store.as_ref(), &req).await {
            Ok(o) => o,
            Err(e) => return Ok(ToolOutput::text_only(e.to_string())),
        };

        if outcome.hits.is_empty() {
            let mut msg = String::from("No relevant content found");
            if let Some(name) = &course_name {
                msg.push_str(&format!(" in course '{}'", name));
            }
            if let Some(n) = lesson_number {
                msg.push_str(&format!(" in lesson {}", n));
            }
            msg.push('.');
            return Ok(ToolOutput::text_only(msg));
        }

        let mut records = HashMap::new();
        let mut blocks = Vec::with_capacity(outcome.hits.len());
        let mut sources = Vec::with_capacity(outcome.hits.len());

        for hit in &outcome.hits {
            let label = match hit.lesson_number {
                Some(n) => format!("{} - Lesson {}", hit.course_title, n),
                None => hit.course_title.clone(),
            };

            let link = match hit.lesson_number {
                Some(n) => {
                    if !records.contains_key(&hit.course_title) {
                        let record = self.store.get_course(&hit.course_title).await?;
                        records.insert(hit.course_title.clone(), record);
                    }
                    records
                        .get(&hit.course_title)
                        .and_then(|r| r.as_ref())
                        .and_then(|r| r.lesson_link(n))
                        .map(str::to_string)
                }
                None => None,
            };

            blocks.push(format!("[{}]\n{}", label, hit.content));
            sources.push(Source { text: label, link });
        }

        Ok(ToolOutput {
            text: blocks.join("\n\n"),
            sources,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// get_course_outline
// ═══════════════════════════════════════════════════════════════════════

pub struct CourseOutlineTool {
    store: Arc<dyn Store>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get a course's title, link, instructor and complete lesson list"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Computer Use')"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let course_name = required_str(&params, "course_name")?;

        let record = match self.store.resolve_course_name(&course_name).await? {
            Some(title) => self.store.get_course(&title).await?,
            None => None,
        };
        let Some(record) = record else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'",
                course_name
            )));
        };

        let mut lines = vec![format!("Course Title: {}", record.title)];
        if let Some(link) = &record.link {
            lines.push(format!("Course Link: {}", link));
        }
        if let Some(instructor) = &record.instructor {
            lines.push(format!("Course Instructor: {}", instructor));
        }
        lines.push(String::new());
        if record.lessons.is_empty() {
            lines.push("No lessons listed.".to_string());
        } else {
            lines.push("Lessons:".to_string());
            for lesson in &record.lessons {
                lines.push(format!("Lesson {}: {}", lesson.lesson_number, lesson.title));
            }
        }

        Ok(ToolOutput {
            text: lines.join("\n"),
            sources: vec![Source {
                text: format!("{} - Course Outline", record.title),
                link: record.link.clone(),
            }],
        })
    }
}

fn required_str(params: &Value, key: &str) -> Result<String> {
    match params.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => bail!("missing required parameter '{}'", key),
    }
}

fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts an integer or a numeric string; `null` means absent.
fn optional_lesson(params: &Value) -> Result<Option<u32>> {
    match params.get("lesson_number") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Ok(Some(n)),
            None => bail!("lesson_number must be a non-negative integer"),
        },
        Some(Value::String(s)) => match s.trim().parse::<u32>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("lesson_number must be a non-negative integer"),
        },
        Some(_) => bail!("lesson_number must be a non-negative integer"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolRegistry
// ═══════════════════════════════════════════════════════════════════════

/// Tools by name, plus the sources each one produced last.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    sources: Mutex<HashMap<String, Vec<Source>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with `search_course_content` and `get_course_outline`.
    pub fn with_course_tools(store: Arc<dyn Store>, max_results: usize) -> Self {
        let mut registry = Self::new();
        registry.tools.push(Box::new(CourseSearchTool::new(
            Arc::clone(&store),
            max_results,
        )));
        registry.tools.push(Box::new(CourseOutlineTool::new(store)));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        if tool.name().trim().is_empty() {
            bail!("Tool must have a 'name'");
        }
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in Anthropic `tools` format.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Run a tool by name. Unknown names yield `Tool '<name>' not found`.
    pub async fn execute(&self, name: &str, params: Value) -> Result<String> {
        let Some(tool) = self.find(name) else {
            return Ok(format!("Tool '{}' not found", name));
        };
        let params = if params.is_null() { json!({}) } else { params };
        let output = tool.execute(params).await?;
        tracing::debug!(tool = name, sources = output.sources.len(), "tool executed");
        self.sources
            .lock()
            .unwrap()
            .insert(name.to_string(), output.sources);
        Ok(output.text)
    }

    /// Sources of the first tool (in registration order) whose last run produced any.
    pub fn last_sources(&self) -> Vec<Source> {
        let sources = self.sources.lock().unwrap();
        self.tools
            .iter()
            .filter_map(|t| sources.get(t.name()))
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    pub fn reset_sources(&self) {
        self.sources.lock().unwrap().clear();
    }
}
