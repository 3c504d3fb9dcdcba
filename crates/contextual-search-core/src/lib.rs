//! # Contextual Search Core
//!
//! Backend-agnostic logic for Contextual Search: data models, chunking,
//! context resolution, the context-generation and embedding ports, the
//! index schema descriptor, score fusion, index management, the hybrid
//! query engine, and the ingest orchestrator.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Concrete
//! backends and model adapters live in the `contextual-search` app crate
//! and plug in through [`store::SearchBackend`], [`embedding::EmbeddingPort`]
//! and [`generation::LlmClient`].

pub mod cancel;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod generation;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;
