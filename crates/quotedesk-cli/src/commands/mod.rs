mod query;
mod refresh;
mod serve;

use std::sync::Arc;

use quotedesk_core::{
    Analytics, IngestPipeline, MemoryStore, ReqwestHttpClient, SeriesStore, Symbol, YahooAdapter,
    YahooConfig,
};
use quotedesk_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Store, provider and symbol list resolved from global options.
pub struct Context {
    pub pipeline: IngestPipeline,
    pub analytics: Analytics<dyn SeriesStore>,
    pub symbols: Vec<Symbol>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let symbols = Symbol::parse_list(&cli.symbols)?;
        if symbols.is_empty() {
            return Err(CliError::Command(String::from("--symbols must name at least one symbol")));
        }

        let store: Arc<dyn SeriesStore> = if cli.mock {
            tracing::info!("mock mode: synthetic provider, in-memory store");
            Arc::new(MemoryStore::new())
        } else {
            let config = cli
                .home
                .clone()
                .map_or_else(WarehouseConfig::default, WarehouseConfig::with_home);
            Arc::new(Warehouse::open(config)?)
        };

        let provider = if cli.mock {
            YahooAdapter::default()
        } else {
            let yahoo = YahooConfig {
                timeout_ms: cli.timeout_ms,
                ..YahooConfig::default()
            };
            YahooAdapter::with_http_client(Arc::new(ReqwestHttpClient::new()), yahoo)
        };

        Ok(Self {
            analytics: Analytics::new(Arc::clone(&store)),
            pipeline: IngestPipeline::new(Arc::new(provider), store),
            symbols,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let context = Context::from_cli(cli)?;

    // An in-memory store starts empty; fill it so reads have something to show.
    if cli.mock && !matches!(cli.command, Command::Refresh) {
        context.pipeline.refresh(&context.symbols, cli.period).await;
    }

    match &cli.command {
        Command::Serve(args) => serve::run(args, context, cli.period).await,
        Command::Refresh => refresh::run(&context, cli.period, cli.pretty).await,
        Command::Companies => query::companies(&context, cli.pretty),
        Command::Data(args) => query::data(&context, args, cli.pretty),
        Command::Summary(args) => query::summary(&context, args, cli.pretty),
        Command::Movers(args) => query::movers(&context, args, cli.pretty),
        Command::Closes(args) => query::closes(&context, args, cli.pretty),
        Command::MovingAverage(args) => query::moving_average(&context, args, cli.pretty),
    }
}
