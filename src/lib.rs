//! # Course RAG
//!
//! Course transcript ingestion and retrieval-augmented question answering.
//!
//! Course documents (a small header followed by `Lesson N: Title` sections)
//! are parsed into courses and lessons, split into overlapping chunks that
//! carry their course and lesson context, and stored in SQLite with FTS5.
//! Questions are answered by a generator that can call two tools: a ranked
//! content search and a course outline lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  docs/*.txt │──▶│ Parse+Chunk  │──▶│  SQLite  │
//! │             │   │  (pipeline)  │   │   FTS5   │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   HTTP   │
//!                 │  (crag)  │        │   API    │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! The parsing, chunking and in-memory retrieval logic lives in the
//! I/O-free `course-rag-core` crate; this crate adds the filesystem
//! scanner, the SQLite store, answer generation and the two frontends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`connector_fs`] | Document discovery on disk |
//! | [`ingest`] | Read, parse, chunk and store documents |
//! | [`progress`] | Ingest progress reporting |
//! | [`db`] / [`migrate`] | Database connection and schema |
//! | [`sqlite_store`] | SQLite implementation of the course store |
//! | [`search`] | `crag search` |
//! | [`catalog`] | `crag courses` and `crag outline` |
//! | [`tools`] | Tools exposed to the answer generator |
//! | [`generator`] | Answer generation providers |
//! | [`session`] | Conversation history |
//! | [`rag`] | Query orchestration and `crag ask` |
//! | [`server`] | HTTP API |

pub mod catalog;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod generator;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod rag;
pub mod search;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod tools;
