use anyhow::{Context, Result};
use clap::Parser;
use rrss::{Config, Pipeline};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "rrss",
    about = "Enrich an RSS/Atom feed with sanitized full-article content"
)]
struct Args {
    /// Feed URL (or article URL with --article-markup)
    url: String,

    /// Config file (defaults to ~/.config/rrss/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of items enriched at once
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Skip the pause after each article fetch
    #[arg(long)]
    no_pacing: bool,

    /// Allow feeds and articles on localhost/private networks
    #[arg(long)]
    allow_private_hosts: bool,

    /// Treat URL as an article page and print its largest sanitized <article>
    #[arg(long)]
    article_markup: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.as_ref().cloned().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(n) = args.concurrency {
        config.max_concurrent_fetches = n;
    }
    if args.no_pacing {
        config.fetch_pacing_ms = 0;
    }
    if args.allow_private_hosts {
        config.allow_private_hosts = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let pipeline = Pipeline::new(config).context("Failed to create pipeline")?;

    if args.article_markup {
        let markup = pipeline
            .fetcher()
            .extract_article_markup(&args.url)
            .await
            .with_context(|| format!("Failed to extract article from {}", args.url))?;
        println!("{}", markup);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing without remaining article fetches");
                cancel.cancel();
            }
        });
    }

    let records = pipeline
        .run_with_cancel(&args.url, cancel)
        .await
        .with_context(|| format!("Failed to enrich feed {}", args.url))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    }
    .context("Failed to serialize records")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json).context("Failed to write output")?;
    Ok(())
}
