//! xbrl-filings main entry point
//!
//! This is the command-line interface for querying filings.xbrl.org and
//! downloading report artifacts.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xbrl_filings::config::{load_config_with_hash, Config};
use xbrl_filings::download::{into_result, Concurrency, DownloadOptions, Downloader};
use xbrl_filings::http::build_http_client;
use xbrl_filings::output::{
    print_download_statistics, print_query_statistics, write_diagnostics, write_filings,
    write_key_path_availability, DownloadStatistics, QueryStatistics,
};
use xbrl_filings::query::{PageSource, QueryParams, QueryResult};
use xbrl_filings::resource::DownloadRequest;
use xbrl_filings::{FileKind, Scope};

/// xbrl-filings: a client for the filings.xbrl.org API
///
/// Queries filings page by page, links them to their entities and
/// validation messages, and downloads report packages with SHA-256
/// verification.
#[derive(Parser, Debug)]
#[command(name = "xbrl-filings")]
#[command(version)]
#[command(about = "Query and download XBRL filings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a query and print a summary
    Query {
        #[command(flatten)]
        query: QueryArgs,

        /// Print the filings as tab-separated rows
        #[arg(long)]
        list: bool,

        /// Print every diagnostic
        #[arg(long)]
        diagnostics: bool,

        /// Print key path retrieval counts
        #[arg(long)]
        key_paths: bool,
    },

    /// Run a query and download artifacts of the filings
    Download {
        #[command(flatten)]
        query: QueryArgs,

        /// Artifact kinds to download
        #[arg(long, value_delimiter = ',', default_value = "package")]
        kinds: Vec<FileKind>,

        /// Target directory (overrides the config)
        #[arg(long)]
        to_dir: Option<PathBuf>,

        /// Stem pattern containing /name/ (overrides the config)
        #[arg(long)]
        stem_pattern: Option<String>,

        /// Maximum concurrent downloads, 0 for unlimited (overrides the config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip SHA-256 verification of packages
        #[arg(long)]
        no_check_corruption: bool,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Link filings to their entities
    #[arg(long)]
    entities: bool,

    /// Link filings to their validation messages
    #[arg(long)]
    messages: bool,

    /// Maximum number of filings
    #[arg(long)]
    max_size: Option<usize>,

    /// Filings per page (overrides the config)
    #[arg(long)]
    page_size: Option<usize>,

    /// Sort order, e.g. -date_added
    #[arg(long)]
    sort: Option<String>,

    /// Extra query parameter, e.g. filter[country]=FI
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

impl QueryArgs {
    fn scope(&self) -> Scope {
        Scope {
            entities: self.entities,
            validation_messages: self.messages,
        }
    }

    fn params(&self, config: &Config) -> QueryParams {
        QueryParams {
            page_size: self.page_size.unwrap_or(config.api.max_page_size),
            sort: self.sort.clone(),
            extra: self.params.clone(),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Expected KEY=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Query {
            query,
            list,
            diagnostics,
            key_paths,
        } => {
            let result = run_query(&config, &query).await?;
            print_query_statistics(&QueryStatistics::from_result(&result));

            let mut out = io::stdout().lock();
            if list {
                write_filings(&mut out, &result.filings)?;
            }
            if diagnostics {
                write_diagnostics(&mut out, &result.diagnostics)?;
            }
            if key_paths {
                write_key_path_availability(&mut out, &result.diagnostics)?;
            }
            out.flush()?;
        }
        Command::Download {
            query,
            kinds,
            to_dir,
            stem_pattern,
            concurrency,
            no_check_corruption,
        } => {
            let mut result = run_query(&config, &query).await?;
            print_query_statistics(&QueryStatistics::from_result(&result));

            let downloader = Downloader::new(
                build_http_client(&config.user_agent)?,
                DownloadOptions {
                    concurrency: Concurrency::from_limit(
                        concurrency.unwrap_or(config.download.max_concurrent),
                    ),
                    timeout: Duration::from_secs(config.download.timeout_secs),
                },
            );

            let mut request = DownloadRequest::new(
                kinds,
                to_dir.unwrap_or_else(|| config.download.directory.clone()),
            )
            .with_check_corruption(config.download.check_corruption && !no_check_corruption);
            if let Some(pattern) = stem_pattern.or_else(|| config.download.stem_pattern.clone()) {
                request = request.with_stem_pattern(pattern);
            }

            let outcomes = result.filings.download(&downloader, &request).await?;
            let stats = DownloadStatistics::from_outcomes(&outcomes, downloader.stats());
            print_download_statistics(&stats, &outcomes);

            into_result(outcomes).context("Download batch had failures")?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("xbrl_filings=info,warn"),
            1 => EnvFilter::new("xbrl_filings=debug,info"),
            2 => EnvFilter::new("xbrl_filings=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(io::stderr)
        .init();
}

/// Runs the query described by the command line
async fn run_query(config: &Config, args: &QueryArgs) -> anyhow::Result<QueryResult> {
    let source = PageSource::from_config(config)?;
    let scope = args.scope();

    tracing::info!(
        "Entry point: {}, entities: {}, validation messages: {}",
        source.entry_point(),
        scope.entities,
        scope.validation_messages
    );

    let result = source
        .run_query(&args.params(config), scope, args.max_size)
        .await
        .context("Query failed")?;
    Ok(result)
}
