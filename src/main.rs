//! # Course RAG CLI (`crag`)
//!
//! The `crag` binary ingests course transcripts, answers questions about
//! them, and serves the HTTP API used by the chat frontend.
//!
//! ## Usage
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and run schema migrations |
//! | `crag ingest [path]` | Parse, chunk and store course documents |
//! | `crag courses` | List stored courses with lesson counts |
//! | `crag search "<query>"` | Ranked chunk search, optionally per course/lesson |
//! | `crag outline <course>` | Show a course's title, link and lessons |
//! | `crag ask "<question>"` | Answer a question with sources |
//! | `crag serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! crag init
//! crag ingest ./docs --clear
//! crag search "prompt caching" --course "Building with Claude" --lesson 3
//! crag outline "MCP"
//! crag serve
//! ```

mod catalog;
mod config;
mod connector_fs;
mod db;
mod generator;
mod ingest;
mod logging;
mod migrate;
mod progress;
mod rag;
mod search;
mod server;
mod session;
mod sqlite_store;
mod tools;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use progress::ProgressMode;

/// Course RAG: ingest course transcripts and answer questions about them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "Course transcript ingestion and retrieval-augmented question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest course documents from a file or directory.
    ///
    /// Each document is parsed into a course with lessons, chunked, and
    /// stored. Re-ingesting a course replaces its chunks. Documents that
    /// cannot be read or parsed are reported and skipped.
    Ingest {
        /// File or directory to ingest. Defaults to `[docs].root`.
        path: Option<PathBuf>,

        /// Remove stored courses that are not part of this ingest.
        /// Applied only after every document has been written.
        #[arg(long)]
        clear: bool,

        /// Progress output: `off`, `human` or `json` (stderr).
        /// Defaults to `human` on a TTY, otherwise `off`.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// List stored courses.
    Courses,

    /// Search course content.
    Search {
        /// Search query.
        query: String,

        /// Course name; partial names are resolved to the closest title.
        #[arg(long)]
        course: Option<String>,

        /// Lesson number within the course.
        #[arg(long)]
        lesson: Option<u32>,

        /// Maximum number of results. Defaults to `[retrieval].max_results`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a course outline.
    Outline {
        /// Course name; partial names are resolved to the closest title.
        course: String,
    },

    /// Answer a question about the courses.
    Ask {
        question: String,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    match s {
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => Err(format!(
            "invalid progress mode '{}': expected off, human or json",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            clear,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            ingest::run_ingest(&cfg, path, clear, reporter.as_ref()).await?;
        }
        Commands::Courses => {
            catalog::run_courses(&cfg).await?;
        }
        Commands::Search {
            query,
            course,
            lesson,
            limit,
        } => {
            search::run_search(&cfg, &query, course, lesson, limit).await?;
        }
        Commands::Outline { course } => {
            catalog::run_outline(&cfg, &course).await?;
        }
        Commands::Ask { question } => {
            rag::run_ask(&cfg, &question).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
