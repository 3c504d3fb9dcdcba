//! # Contextual Search
//!
//! Contextual retrieval over a hybrid lexical + vector index.
//!
//! Documents are split into overlapping chunks; each chunk gets a short
//! LLM-written summary of where it sits in the document, and the chunk and
//! summary are embedded together. Queries run a best-fields text match and
//! a k-NN vector search side by side and fuse the two score lists.
//!
//! The pipeline itself lives in `contextual-search-core`; this crate
//! supplies configuration, the concrete adapters, and the `cxs` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────────┐
//! │ extract  │──▶│  core        │──▶│  SearchBackend     │
//! │ PDF/text │   │ chunk+enrich │   │ SQLite/OpenSearch  │
//! └──────────┘   └──────┬───────┘   └─────────┬─────────┘
//!                       │                     │
//!              ┌────────┴────────┐            ▼
//!              ▼                 ▼      ┌──────────┐
//!         ┌─────────┐     ┌──────────┐  │   CLI    │
//!         │   llm   │     │embedding │  │  (cxs)   │
//!         └─────────┘     └──────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cxs init                        # create the index and fusion pipeline
//! cxs process ./docs/guide.pdf    # chunk, enrich and index a document
//! cxs search "how do I configure retries?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | PDF and text extraction |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | LLM completion clients |
//! | [`backend`] | Backend selection |
//! | [`sqlite_store`] | SQLite backend |
//! | [`opensearch`] | OpenSearch backend |
//! | [`ingest`] | `init` and `process` commands |
//! | [`search`] | `search` command |

pub mod backend;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod opensearch;
pub mod pipeline;
pub mod search;
pub mod sqlite_store;
