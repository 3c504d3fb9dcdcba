//! Search backend selection.
//!
//! | `index.backend` | Backend |
//! |-----------------|---------|
//! | `"sqlite"` | [`SqliteBackend`]: FTS5 + brute-force cosine in a local database |
//! | `"opensearch"` | [`OpenSearchBackend`]: k-NN index and search pipeline on a cluster |
//! | `"memory"` | [`InMemoryBackend`]: process-local, nothing persists |

use std::sync::Arc;

use anyhow::{bail, Result};
use contextual_search_core::store::memory::InMemoryBackend;
use contextual_search_core::store::SearchBackend;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::opensearch::OpenSearchBackend;
use crate::sqlite_store::SqliteBackend;

/// Create the backend named by `index.backend`.
///
/// The SQLite backend runs migrations on connect, so `cxs init` and
/// `cxs process` work against a fresh database path.
pub async fn create_backend(config: &Config) -> Result<Arc<dyn SearchBackend>> {
    match config.index.backend.as_str() {
        "sqlite" => {
            let pool = db::connect(config).await?;
            migrate::run_migrations(&pool).await?;
            Ok(Arc::new(SqliteBackend::new(pool)))
        }
        "opensearch" => Ok(Arc::new(OpenSearchBackend::new(&config.opensearch)?)),
        "memory" => Ok(Arc::new(InMemoryBackend::new())),
        other => bail!(
            "Unknown index backend: '{}'. Available: sqlite, opensearch, memory",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let mut config = parse_config("").unwrap();
        config.index.backend = "elastic".to_string();
        let err = create_backend(&config).await.err().unwrap();
        assert!(err.to_string().contains("Unknown index backend"));
    }

    #[tokio::test]
    async fn test_sqlite_backend_is_migrated() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = parse_config("").unwrap();
        config.db.path = tmp.path().join("nested").join("cxs.sqlite");
        let backend = create_backend(&config).await.unwrap();
        assert!(!backend.index_exists("docs").await.unwrap());
    }
}
