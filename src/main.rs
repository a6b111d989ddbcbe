use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use litflow::capabilities::{EntrezSearch, GeminiClient, PmcFullText};
use litflow::config::{find_config_file, get_config, load_config, Config};
use litflow::models::{ExportConfig, ExportFormat, SearchRequest};
use litflow::session::Session;

/// Search, enrich, curate, and analyze PubMed literature working sets
#[derive(Parser, Debug)]
#[command(name = "litflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search, enrich, curate, and analyze PubMed literature working sets", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a search pipeline and print or export the resulting working set
    Search {
        /// PubMed query string (omit when using --idea)
        query: Option<String>,

        /// Generate the query from a free-text research idea first
        #[arg(long, conflicts_with = "query")]
        idea: Option<String>,

        /// Earliest publication date (YYYY/MM/DD)
        #[arg(long, default_value = litflow::models::DEFAULT_START_DATE)]
        start_date: String,

        /// Latest publication date (YYYY/MM/DD)
        #[arg(long, default_value = litflow::models::DEFAULT_END_DATE)]
        end_date: String,

        /// Total number of records to aggregate
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Records requested per upstream batch
        #[arg(long, default_value_t = 50)]
        chunk_size: usize,

        /// Include preprint-server records
        #[arg(long, default_value_t = false)]
        include_preprints: bool,

        /// Only records with a free full-text copy
        #[arg(long, default_value_t = false)]
        free_full_text: bool,

        /// Attempt full-text enrichment for each record
        #[arg(long, default_value_t = false)]
        full_text: bool,

        /// Export the working set to a file instead of printing it
        #[arg(long, value_enum)]
        export: Option<ExportKind>,

        /// Synthesize research gaps across the working set after the search
        #[arg(long, default_value_t = false)]
        analyze: bool,
    },

    /// Generate a PubMed query from a free-text research idea
    GenerateQuery {
        /// The research idea
        idea: String,
    },
}

/// Export format selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExportKind {
    Json,
    Csv,
}

impl From<ExportKind> for ExportFormat {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Json => ExportFormat::Json,
            ExportKind::Csv => ExportFormat::Csv,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<PathBuf>) -> Result<Config> {
    match path.or_else(find_config_file) {
        Some(path) => load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(get_config()),
    }
}

fn build_session(config: &Config) -> Result<Session> {
    let mut entrez = EntrezSearch::new().context("failed to set up the search capability")?;
    if let Some(key) = &config.api_keys.ncbi {
        entrez = entrez.with_api_key(key);
    }

    let pmc = PmcFullText::new().context("failed to set up the full-text capability")?;

    let gemini = GeminiClient::new(config.api_keys.gemini.clone().unwrap_or_default())
        .context("failed to set up the analysis capability")?;

    Ok(
        Session::new(Arc::new(entrez), Arc::new(pmc), Arc::new(gemini.clone()))
            .with_query_gen(Arc::new(gemini))
            .with_enrichment_concurrency(config.enrichment.concurrency),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(cli.config.clone())?;
    let session = build_session(&config)?;

    match cli.command {
        Commands::Search {
            query,
            idea,
            start_date,
            end_date,
            limit,
            chunk_size,
            include_preprints,
            free_full_text,
            full_text,
            export,
            analyze,
        } => {
            let query = match (query, idea) {
                (Some(query), _) => query,
                (None, Some(idea)) => {
                    let generated = session
                        .generate_query(&idea)
                        .await
                        .context("query generation failed")?;
                    eprintln!("generated query: {}", generated);
                    generated
                }
                (None, None) => anyhow::bail!("either a query or --idea is required"),
            };

            let request = SearchRequest::new(query)
                .date_range(start_date, end_date)
                .limit(limit)
                .chunk_size(chunk_size)
                .exclude_preprints(!include_preprints)
                .free_full_text_only(free_full_text)
                .fetch_full_text(full_text);

            let summary = session.run_search(request).await?;
            eprintln!(
                "fetched {} records, {} in working set",
                summary.fetched, summary.seeded
            );

            session.select_all();

            if let Some(kind) = export {
                let artifact =
                    session.export_selection(&ExportConfig::new(ExportFormat::from(kind)))?;
                std::fs::write(&artifact.filename, &artifact.bytes)
                    .with_context(|| format!("failed to write {}", artifact.filename))?;
                eprintln!("wrote {}", artifact.filename);
            } else {
                let articles = session.active_articles();
                println!("{}", serde_json::to_string_pretty(&articles)?);
            }

            if analyze {
                let result = session.analyze_selection().await?;
                println!("{}", result);
            }
        }

        Commands::GenerateQuery { idea } => {
            let query = session.generate_query(&idea).await?;
            println!("{}", query);
        }
    }

    Ok(())
}
