use quotedesk_core::{Symbol, TradeDate};

use super::Context;
use crate::cli::{DataArgs, MoversArgs, MovingAverageArgs, SymbolArgs};
use crate::error::CliError;
use crate::output;

pub fn companies(context: &Context, pretty: bool) -> Result<(), CliError> {
    output::render(&context.analytics.companies()?, pretty)
}

pub fn data(context: &Context, args: &DataArgs, pretty: bool) -> Result<(), CliError> {
    if !(1..=365).contains(&args.days) {
        return Err(CliError::Command(format!(
            "--days must be between 1 and 365, got {}",
            args.days
        )));
    }

    let symbol = Symbol::parse(&args.symbol)?;
    let bars = context.analytics.recent_bars(&symbol, args.days)?;
    if bars.is_empty() {
        return Err(CliError::NotFound(symbol.to_string()));
    }
    output::render(&bars, pretty)
}

pub fn summary(context: &Context, args: &SymbolArgs, pretty: bool) -> Result<(), CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let summary = context
        .analytics
        .summary(&symbol)?
        .ok_or_else(|| CliError::NotFound(symbol.to_string()))?;
    output::render(&summary, pretty)
}

pub fn movers(context: &Context, args: &MoversArgs, pretty: bool) -> Result<(), CliError> {
    if args.top == 0 {
        return Err(CliError::Command(String::from(
            "--top must be greater than zero",
        )));
    }

    let date = args.date.as_deref().map(TradeDate::parse).transpose()?;
    output::render(&context.analytics.top_movers(date, args.top)?, pretty)
}

pub fn closes(context: &Context, args: &SymbolArgs, pretty: bool) -> Result<(), CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let points = context.analytics.closes(&symbol)?;
    if points.is_empty() {
        return Err(CliError::NotFound(symbol.to_string()));
    }
    output::render(&points, pretty)
}

pub fn moving_average(
    context: &Context,
    args: &MovingAverageArgs,
    pretty: bool,
) -> Result<(), CliError> {
    if args.window == 0 {
        return Err(CliError::Command(String::from(
            "--window must be greater than zero",
        )));
    }

    let symbol = Symbol::parse(&args.symbol)?;
    output::render(&context.analytics.moving_average(&symbol, args.window)?, pretty)
}
