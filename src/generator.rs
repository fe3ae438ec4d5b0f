//! Answer generation.
//!
//! The `anthropic` provider calls the Messages API with the registry's tool
//! definitions and runs a bounded tool-use loop: while the model asks for a
//! tool and rounds remain, the tool results are fed back and the model is
//! called again. The final round is sent without tools so the model must
//! answer in text.
//!
//! The `disabled` provider needs no network. It answers with the output of
//! `search_course_content` for the query, which keeps `crag ask` and the
//! HTTP API usable offline and in tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "You answer questions about course materials.

Tools:
- search_course_content: search lesson text, optionally within one course or lesson.
- get_course_outline: course title, link, instructor and the numbered lesson list.

Use a tool only for questions about specific course content or structure. \
Answer general knowledge questions directly. When a search returns nothing, \
say so plainly. Do not mention the tools or the search in your answer.

For outline questions, give the course title, course link and every lesson \
with its number and title.

Be brief and direct. Use examples when they make the answer clearer.";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produce an answer for `query`. `history` is prior conversation as text.
    async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<String>;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(OfflineGenerator)),
        "anthropic" => Ok(Box::new(AnthropicGenerator::from_env(config)?)),
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }
}

/// Answers from search results alone.
pub struct OfflineGenerator;

#[async_trait]
impl AnswerGenerator for OfflineGenerator {
    async fn generate(
        &self,
        query: &str,
        _history: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<String> {
        tools
            .execute("search_course_content", json!({ "query": query }))
            .await
    }
}

pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    config: GenerationConfig,
}

impl AnthropicGenerator {
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            config: config.clone(),
        })
    }

    fn request_body(
        &self,
        system: &str,
        messages: &[Value],
        tool_defs: Option<&[Value]>,
    ) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": messages,
        });
        if let Some(defs) = tool_defs {
            if !defs.is_empty() {
                body["tools"] = json!(defs);
                body["tool_choice"] = json!({ "type": "auto" });
            }
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.config.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "anthropic request failed, retrying");
                        last_err = Some(anyhow::anyhow!(
                            "Anthropic API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Anthropic API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

#[async_trait]
impl AnswerGenerator for AnthropicGenerator {
    async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<String> {
        let system = match history {
            Some(h) if !h.is_empty() => {
                format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, h)
            }
            _ => SYSTEM_PROMPT.to_string(),
        };
        let tool_defs = tools.definitions();
        let mut messages = vec![json!({ "role": "user", "content": query })];

        for round in 0..=self.config.max_tool_rounds {
            let offer_tools = round < self.config.max_tool_rounds;
            let body = self.request_body(
                &system,
                &messages,
                offer_tools.then_some(tool_defs.as_slice()),
            );
            let response = self.send(&body).await?;
            let content = response
                .get("content")
                .and_then(|c| c.as_array())
                .cloned()
                .unwrap_or_default();

            let tool_calls = tool_uses(&content);
            if response.get("stop_reason").and_then(|s| s.as_str()) != Some("tool_use")
                || tool_calls.is_empty()
                || !offer_tools
            {
                return Ok(text_of(&content));
            }

            messages.push(json!({ "role": "assistant", "content": content }));

            let mut results = Vec::with_capacity(tool_calls.len());
            for (id, name, input) in tool_calls {
                tracing::debug!(tool = %name, round, "model requested tool");
                let result = match tools.execute(&name, input).await {
                    Ok(text) => json!({
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": text,
                    }),
                    Err(e) => json!({
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": format!("Tool error: {}", e),
                        "is_error": true,
                    }),
                };
                results.push(result);
            }
            messages.push(json!({ "role": "user", "content": results }));
        }

        bail!("Model did not produce an answer")
    }
}

/// `(id, name, input)` for every `tool_use` block.
fn tool_uses(content: &[Value]) -> Vec<(String, String, Value)> {
    content
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
        .filter_map(|b| {
            Some((
                b.get("id")?.as_str()?.to_string(),
                b.get("name")?.as_str()?.to_string(),
                b.get("input").cloned().unwrap_or_else(|| json!({})),
            ))
        })
        .collect()
}

/// Concatenated text of all `text` blocks.
fn text_of(content: &[Value]) -> String {
    content
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tool_uses_and_text() {
        let content = vec![
            json!({"type": "text", "text": "Let me look. "}),
            json!({"type": "tool_use", "id": "tu_1", "name": "search_course_content", "input": {"query": "mcp"}}),
            json!({"type": "text", "text": "Done."}),
        ];
        let calls = tool_uses(&content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "tu_1");
        assert_eq!(calls[0].1, "search_course_content");
        assert_eq!(calls[0].2["query"], "mcp");
        assert_eq!(text_of(&content), "Let me look. Done.");
    }

    #[test]
    fn final_round_omits_tools() {
        let config = GenerationConfig::default();
        let gen = AnthropicGenerator::new(&config, "test-key".into()).unwrap();
        let defs = vec![json!({"name": "t"})];
        let with = gen.request_body("sys", &[], Some(&defs));
        assert_eq!(with["tools"][0]["name"], "t");
        assert_eq!(with["max_tokens"], 800);
        let without = gen.request_body("sys", &[], None);
        assert!(without.get("tools").is_none());
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = GenerationConfig {
            provider: "other".into(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
