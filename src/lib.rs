#![deny(missing_docs)]

//! Core library for the roadmap advising backend.

/// Retrieval, prompt routing and generation behind the HTTP endpoints.
pub mod advisor;
/// HTTP routing and REST handlers.
pub mod api;
/// Workbook loading and catalog record synthesis.
pub mod catalog;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Gemini text generation client.
pub mod generation;
/// Catalog ingestion runs.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Qdrant vector store integration.
pub mod qdrant;
/// Catalog vector store: embedding plus Qdrant persistence and search.
pub mod store;
