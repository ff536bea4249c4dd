use anyhow::{bail, Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;

use topstories::sources::{SourceKind, SourceRegistry};

/// Print the raw upstream payload for a section, then what it parses into.
#[derive(Parser, Debug)]
#[command(name = "fetch_raw")]
struct Args {
    /// Upstream section, e.g. "home" or "world"
    #[arg(default_value = "home")]
    section: String,

    /// Source to query
    #[arg(long, default_value = "nytimes")]
    source: String,

    /// Path to config.toml
    #[arg(long, value_name = "FILE", default_value = "config.default.toml")]
    config: PathBuf,

    /// Skip the parse step
    #[arg(long)]
    raw_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config).await?;
    let registry = SourceRegistry::from_config(&config)?;

    let kind: SourceKind = args.source.parse()?;
    let source = registry.resolve(kind)?;

    println!("\n{}", "=".repeat(60));
    println!("Source: {}  Section: {}", kind, args.section);
    println!("{}", "=".repeat(60));

    let raw = source
        .fetch_raw(&args.section)
        .await
        .with_context(|| format!("failed to fetch section '{}'", args.section))?;
    println!("{}", raw);

    if args.raw_only {
        return Ok(());
    }

    match source.parse_articles(&raw) {
        Ok(articles) => {
            println!("\n✓ Parsed {} articles", articles.len());
            for (i, article) in articles.iter().take(5).enumerate() {
                println!("  {}. {}", i + 1, article.heading);
                println!("     {}  (updated {})", article.link, article.updated);
            }
            Ok(())
        }
        Err(e) => bail!("✗ Parse failed: {}", e),
    }
}
