//! CLI argument definitions for quotedesk.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | HTTP API plus the daily refresh scheduler |
//! | `refresh` | Fetch and store history for the configured symbols |
//! | `companies` | Stored symbols |
//! | `data` | Latest bars for one symbol |
//! | `summary` | 52-week high/low and average close |
//! | `movers` | Top gainers and losers on one date |
//! | `closes` | Close series for one symbol |
//! | `moving-average` | Trailing mean of closes |
//!
//! # Examples
//!
//! ```bash
//! quotedesk refresh --symbols INFY.NS,TCS.NS --period 6mo
//! quotedesk summary INFY.NS --pretty
//! quotedesk serve --bind 0.0.0.0:8000 --refresh-at 09:00 --utc-offset +05:30
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quotedesk_core::Period;
use time::macros::format_description;
use time::{Time, UtcOffset};

pub const DEFAULT_SYMBOLS: &str = "INFY.NS,TCS.NS,RELIANCE.NS,HDFCBANK.NS";

/// Daily equity bars: fetch, store and summarize.
#[derive(Debug, Parser)]
#[command(name = "quotedesk", author, version, about)]
pub struct Cli {
    /// Data directory; the warehouse lives at `<home>/warehouse.duckdb`.
    #[arg(long, global = true, env = "QUOTEDESK_HOME")]
    pub home: Option<PathBuf>,

    /// Comma-separated symbols to refresh.
    #[arg(long, global = true, env = "QUOTEDESK_SYMBOLS", default_value = DEFAULT_SYMBOLS)]
    pub symbols: String,

    /// History lookback (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max).
    #[arg(long, global = true, default_value_t = Period::OneYear)]
    pub period: Period,

    /// Use a deterministic offline series and an in-memory store.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Per-request provider timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API and refresh once a day.
    Serve(ServeArgs),
    /// Refresh the configured symbols now and print the report.
    Refresh,
    /// List stored symbols.
    Companies,
    /// Latest bars for a symbol, oldest first.
    Data(DataArgs),
    /// 52-week high/low and average close for a symbol.
    Summary(SymbolArgs),
    /// Biggest gainers and losers on one date.
    Movers(MoversArgs),
    /// Close series for a symbol.
    Closes(SymbolArgs),
    /// Trailing moving average of closes.
    MovingAverage(MovingAverageArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "QUOTEDESK_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Local wall-clock time of the daily refresh (`HH:MM`).
    #[arg(long, default_value = "09:00", value_parser = parse_clock)]
    pub refresh_at: Time,

    /// UTC offset the refresh time is read in (`+HH:MM`).
    #[arg(long, default_value = "+05:30", value_parser = parse_offset, allow_hyphen_values = true)]
    pub utc_offset: UtcOffset,

    #[arg(long, default_value_t = false)]
    pub no_scheduler: bool,
}

#[derive(Debug, Args)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct DataArgs {
    pub symbol: String,

    #[arg(long, default_value_t = 30)]
    pub days: usize,
}

#[derive(Debug, Args)]
pub struct MoversArgs {
    /// `YYYY-MM-DD`; defaults to the latest stored date.
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct MovingAverageArgs {
    pub symbol: String,

    #[arg(long, default_value_t = 5)]
    pub window: usize,
}

fn parse_clock(value: &str) -> Result<Time, String> {
    Time::parse(value, format_description!("[hour]:[minute]"))
        .map_err(|error| format!("expected HH:MM, got '{value}': {error}"))
}

fn parse_offset(value: &str) -> Result<UtcOffset, String> {
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|error| format!("expected +HH:MM, got '{value}': {error}"))
}
