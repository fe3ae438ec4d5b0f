//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] validates the file before any command touches the
//! database or the documents directory.

use anyhow::{Context, Result};
use course_rag_core::chunk::{ChunkConfig, SentenceOverflow, DEFAULT_MAX_SIZE, DEFAULT_OVERLAP};
use course_rag_core::pipeline::ChunkIndexPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub overflow: SentenceOverflow,
    #[serde(default)]
    pub index_policy: ChunkIndexPolicy,
    #[serde(default = "default_true")]
    pub normalize_whitespace: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_MAX_SIZE,
            chunk_overlap: DEFAULT_OVERLAP,
            overflow: SentenceOverflow::default(),
            index_policy: ChunkIndexPolicy::default(),
            normalize_whitespace: true,
        }
    }
}

impl ChunkingConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            max_size: self.chunk_size,
            overlap: self.chunk_overlap,
            overflow: self.overflow,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_MAX_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_OVERLAP
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Sessions kept in memory; the least recently used is evicted first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_url: default_api_url(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_tool_rounds: default_max_tool_rounds(),
            max_history: default_max_history(),
            max_sessions: default_max_sessions(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_max_tool_rounds() -> usize {
    2
}
fn default_max_history() -> usize {
    2
}
fn default_max_sessions() -> usize {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Ingest `[docs] root` before accepting requests.
    #[serde(default)]
    pub ingest_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ingest_on_start: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("./docs")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config
        .chunking
        .chunk_config()
        .validate()
        .with_context(|| "Invalid [chunking] section")?;

    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }

    match config.generation.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    if config.generation.is_enabled() && config.generation.model.trim().is_empty() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    if config.generation.max_sessions < 1 {
        anyhow::bail!("generation.max_sessions must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 1.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_config("[db]\npath = \"./data/crag.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.overflow, SentenceOverflow::Extend);
        assert_eq!(config.chunking.index_policy, ChunkIndexPolicy::PerCourse);
        assert_eq!(config.retrieval.max_results, 5);
        assert_eq!(config.generation.provider, "disabled");
        assert_eq!(config.generation.max_history, 2);
        assert_eq!(config.generation.max_sessions, 1000);
        assert_eq!(config.docs.include_globs, vec!["**/*.txt"]);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = parse_config(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Invalid [chunking] section"), "{}", msg);
        assert!(msg.contains("must be smaller than max_size"), "{}", msg);
    }

    #[test]
    fn chunking_policies_parse() {
        let config = parse_config(
            "[db]\npath = \"x.sqlite\"\n[chunking]\noverflow = \"hard_split\"\nindex_policy = \"global\"\nnormalize_whitespace = false\n",
        )
        .unwrap();
        assert_eq!(config.chunking.overflow, SentenceOverflow::HardSplit);
        assert_eq!(config.chunking.index_policy, ChunkIndexPolicy::Global);
        assert!(!config.chunking.normalize_whitespace);
    }

    #[test]
    fn unknown_provider_rejected() {
        let err =
            parse_config("[db]\npath = \"x.sqlite\"\n[generation]\nprovider = \"mystery\"\n")
                .unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn zero_max_results_rejected() {
        assert!(parse_config("[db]\npath = \"x.sqlite\"\n[retrieval]\nmax_results = 0\n").is_err());
    }
}
