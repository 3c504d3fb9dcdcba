//! `cxs search`: hybrid retrieval from the command line.

use anyhow::Result;
use contextual_search_core::models::SearchHit;

use crate::config::Config;
use crate::pipeline::build_pipeline;

/// Run a hybrid search and print ranked hits.
///
/// A failed query is reported and treated as an empty result; only
/// setup errors (config, backend connection) fail the command.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(config).await?;

    let hits = match pipeline.search(query, limit).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::error!("search failed: {}", e);
            eprintln!("Error: {}", e);
            Vec::new()
        }
    };

    print!("{}", format_hits(&hits));
    Ok(())
}

fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("{}. [{:.4}]\n", i + 1, hit.score));
        out.push_str(&format!("    Content: {}\n", hit.content));
        out.push_str(&format!("    Context: {}\n", hit.context));
        out.push('\n');
    }
    out
}
