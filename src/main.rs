//! # Contextual Search CLI (`cxs`)
//!
//! ## Usage
//!
//! ```bash
//! cxs --config ./config/cxs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cxs init` | Create the index and register its fusion pipeline |
//! | `cxs process <file>` | Chunk, enrich and index a PDF or text document |
//! | `cxs search "<query>"` | Hybrid search over the index |
//! | `cxs completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! cxs init --recreate
//! cxs process ./docs/handbook.pdf
//! cxs search "vacation policy" --limit 3
//! RUST_LOG=contextual_search_core=debug cxs process notes.md
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use contextual_search::{config, ingest, logging, search};

/// Contextual Search CLI: contextual retrieval over a hybrid
/// lexical + vector index.
///
/// All commands except `completions` read a TOML configuration file.
/// See `config/cxs.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cxs",
    about = "Contextual Search: contextual retrieval over a hybrid lexical + vector index",
    version,
    long_about = "Contextual Search splits documents into chunks, asks an LLM to situate each \
    chunk within its document, embeds chunk and context together, and answers queries by \
    fusing a best-fields text match with a k-NN vector search."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cxs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index and register its fusion pipeline.
    ///
    /// Leaves an existing index untouched unless `--recreate` is given.
    Init {
        /// Drop and recreate the index if it already exists.
        #[arg(long)]
        recreate: bool,
    },

    /// Index a document.
    ///
    /// Extracts the text of a PDF or UTF-8 text file, chunks it, generates
    /// a context summary and embedding per chunk, and writes the records
    /// in bulk batches. With `index.recreate_on_process = true` (the default)
    /// the index is rebuilt first.
    Process {
        /// Path to the document (`.pdf`, `.txt`, `.md`, ...).
        file: PathBuf,
    },

    /// Search the index.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to `retrieval.result_count`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "cxs", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Init { recreate } => {
            ingest::run_init(&cfg, recreate).await?;
        }
        Commands::Process { file } => {
            ingest::run_process(&cfg, &file).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
