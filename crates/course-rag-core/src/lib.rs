//! # Course RAG Core
//!
//! I/O-free ingestion and retrieval logic for Course RAG: data models,
//! sentence-aware chunking, course document parsing, the batch ingestion
//! pipeline, the store abstraction, and course-aware search.
//!
//! This crate contains no tokio runtime, sqlx, filesystem, or network
//! code. The `course-rag` application crate supplies documents from disk
//! and a SQLite-backed [`store::Store`].
//!
//! ```rust
//! use course_rag_core::chunk::ChunkConfig;
//! use course_rag_core::parser::DocumentParser;
//! use course_rag_core::pipeline::{ChunkIndexPolicy, IngestionPipeline, SourceDocument};
//!
//! let parser = DocumentParser::new(ChunkConfig::default()).unwrap();
//! let pipeline = IngestionPipeline::new(parser, ChunkIndexPolicy::PerCourse);
//! let doc = "Course Title: Intro\n\nLesson 0: Start\nHello world.";
//! let report = pipeline.ingest(vec![SourceDocument::new("intro.txt", doc.as_bytes().to_vec())]);
//! assert_eq!(report.courses[0].title, "Intro");
//! assert_eq!(report.chunks[0].content, "Course Intro Lesson 0 content: Hello world.");
//! ```

pub mod chunk;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod search;
pub mod store;
