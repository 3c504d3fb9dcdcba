//! `cxs init` and `cxs process`: index creation and document ingestion.
//!
//! `process` runs the whole ingest flow for one file: extraction, chunking,
//! (re)creating the index, per-chunk context generation and embedding, and
//! bulk writes. Ctrl-C cancels the run between chunks and batches.

use std::path::Path;

use anyhow::{Context, Result};
use contextual_search_core::pipeline::IngestReport;

use crate::config::Config;
use crate::extract::extract_file;
use crate::pipeline::build_pipeline;

/// Create the index and register its fusion pipeline.
pub async fn run_init(config: &Config, recreate: bool) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    pipeline.create_index(recreate).await?;
    println!(
        "Index '{}' ready ({} backend, {} dimensions).",
        config.index.index_name,
        config.index.backend,
        config.dimension()
    );
    Ok(())
}

/// Extract, chunk, enrich and index the document at `path`.
pub async fn run_process(config: &Config, path: &Path) -> Result<()> {
    let text = extract_file(path)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "document extracted");

    let pipeline = build_pipeline(config).await?;

    let cancel = pipeline.cancellation();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            cancel.cancel();
        }
    });

    let result = pipeline.process_document(&text).await;
    watcher.abort();

    let report = result?;
    println!("{}", summary_line(path, &report));
    Ok(())
}

fn summary_line(path: &Path, report: &IngestReport) -> String {
    let mut line = format!(
        "Processed {}: {} chunks, {} records indexed in {} batches",
        path.display(),
        report.chunks,
        report.index.records,
        report.index.batches_written
    );
    if report.index.batches_failed > 0 {
        line.push_str(&format!(" ({} batches failed)", report.index.batches_failed));
    }
    line.push('.');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextual_search_core::index::IndexSummary;

    #[test]
    fn test_summary_line_mentions_failures_only_when_present() {
        let mut report = IngestReport {
            chunks: 12,
            index: IndexSummary {
                records: 12,
                batches_written: 2,
                batches_failed: 0,
            },
        };
        let line = summary_line(Path::new("doc.pdf"), &report);
        assert_eq!(line, "Processed doc.pdf: 12 chunks, 12 records indexed in 2 batches.");

        report.index.batches_failed = 1;
        let line = summary_line(Path::new("doc.pdf"), &report);
        assert!(line.ends_with("(1 batches failed)."));
    }

    #[tokio::test]
    async fn test_process_missing_file_fails() {
        let config = crate::config::parse_config("").unwrap();
        let err = run_process(&config, Path::new("/nonexistent/doc.txt"))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to extract text"));
    }
}
