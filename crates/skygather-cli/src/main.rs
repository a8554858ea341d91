//! `skygather` command line entry point.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

mod run;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Consume the live event stream.
    Stream,
    /// Crawl the search API over the topic queries.
    Search,
    /// Search first, then stream for the remainder of the duration.
    Hybrid,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Stream => write!(f, "stream"),
            Method::Search => write!(f, "search"),
            Method::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Collect topic-relevant Bluesky posts into a durable corpus.
#[derive(Debug, Parser)]
#[command(name = "skygather", version, about)]
pub struct Cli {
    /// Collection method.
    #[arg(long, value_enum, default_value_t = Method::Search)]
    pub method: Method,

    /// Run duration in seconds. Required for stream and hybrid runs.
    #[arg(long)]
    pub duration: Option<u64>,

    /// Oldest post date to collect (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub since: Option<String>,

    /// Newest post date to collect (YYYY-MM-DD or RFC 3339).
    #[arg(long)]
    pub until: Option<String>,

    /// Stop after this many relevant posts.
    #[arg(long)]
    pub max_posts: Option<u64>,

    /// Session name; defaults to a timestamped one.
    #[arg(long)]
    pub session_name: Option<String>,

    /// Topic catalog YAML file; overrides SKYGATHER_TOPICS_PATH.
    #[arg(long, value_name = "FILE")]
    pub topics: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = skygather_core::load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    run::run(cli, config).await
}
