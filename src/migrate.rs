use anyhow::Result;
use sqlx::SqlitePool;

/// Create the tables the SQLite backend needs. Idempotent.
///
/// One database holds any number of named indexes:
///
/// - `indexes`: one row per index with its schema descriptor as JSON
/// - `records`: enriched records keyed by `(index_name, record_id)`
/// - `records_fts`: FTS5 mirror of `records` for lexical search
/// - `search_pipelines`: fusion pipeline definitions as JSON
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexes (
            name TEXT PRIMARY KEY,
            schema_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            index_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            content TEXT NOT NULL,
            context TEXT NOT NULL,
            vector BLOB NOT NULL,
            PRIMARY KEY (index_name, record_id),
            FOREIGN KEY (index_name) REFERENCES indexes(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_pipelines (
            name TEXT PRIMARY KEY,
            definition_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='records_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE records_fts USING fts5(
                index_name UNINDEXED,
                record_id UNINDEXED,
                content,
                context
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}
