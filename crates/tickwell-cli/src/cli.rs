//! CLI argument definitions for tickwell.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Run the HTTP API and the cache sweeper |
//! | `scrape` | Run one scrape pass and print its report |
//! | `quote` | Assemble a quote for a ticker |
//! | `symbols add` | Register a symbol |
//! | `sources add` | Attach a scrape URL for a (symbol, source) pair |
//! | `sources base-url` | Set a source's base URL |
//! | `cache sweep` | Remove expired cache entries |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `info` | Log filter when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! tickwell symbols add NOVO-B --name "Novo Nordisk B"
//! tickwell sources add --symbol NOVO-B --source NASDAQ_EU --url "https://api.nasdaq.com/..."
//! tickwell scrape --fail-fast
//! tickwell quote NOVO-B --duration 7d --currency DKK --pretty
//! ```

use clap::{Args, Parser, Subcommand};

/// Tickwell - price scraping and quote service
#[derive(Debug, Parser)]
#[command(
    name = "tickwell",
    author,
    version,
    about = "Price scraping and quote service",
    long_about = "Tickwell scrapes prices for registered symbols from six market-data \
sources, stores them in a local DuckDB warehouse and assembles cached quotes.\n\
\n\
Configuration is read from the environment (and an optional .env file).\n\
Use 'tickwell <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API until Ctrl-C.
    Serve(ServeArgs),
    /// Run one scrape pass over every stale (symbol, source) pair.
    Scrape(ScrapeArgs),
    /// Assemble the quote for a ticker.
    Quote(QuoteArgs),
    /// Manage symbols.
    Symbols(SymbolsArgs),
    /// Manage scrape descriptors and source base URLs.
    Sources(SourcesArgs),
    /// Manage the quote cache.
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on; overrides `PORT`.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Abort the pass at the first failing pair.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Ticker, case-insensitive.
    pub symbol: String,

    /// History lookback such as `90m`, `24h` or `7d`; invalid values fall back to `24h`.
    #[arg(long)]
    pub duration: Option<String>,

    /// Convert the quote into this currency.
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct SymbolsArgs {
    #[command(subcommand)]
    pub command: SymbolsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SymbolsCommand {
    /// Register a symbol.
    Add(SymbolAddArgs),
}

#[derive(Debug, Args)]
pub struct SymbolAddArgs {
    pub ticker: String,

    /// Display name.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    #[command(subcommand)]
    pub command: SourcesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SourcesCommand {
    /// Attach a scrape URL to a (symbol, source) pair.
    Add(SourceAddArgs),
    /// Set the base URL of a scraping source.
    BaseUrl(SourceBaseUrlArgs),
}

#[derive(Debug, Args)]
pub struct SourceAddArgs {
    /// Registered ticker.
    #[arg(long)]
    pub symbol: String,

    /// Source identifier, e.g. `BORSFRA`, `NASDAQ_EU` or `YAHOO`.
    #[arg(long)]
    pub source: String,

    /// Source-specific scrape URL.
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Args)]
pub struct SourceBaseUrlArgs {
    /// Source identifier.
    #[arg(long)]
    pub source: String,

    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Remove expired entries from both tiers.
    Sweep,
}
