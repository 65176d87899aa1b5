use quotedesk_core::Period;
use quotedesk_web::AppState;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::Context;
use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::scheduler::{self, DailySchedule};

pub async fn run(args: &ServeArgs, context: Context, period: Period) -> Result<(), CliError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if args.no_scheduler {
        tracing::info!("daily refresh disabled");
        None
    } else {
        let schedule = DailySchedule::new(args.refresh_at, args.utc_offset);
        Some(tokio::spawn(scheduler::run_daily(
            schedule,
            context.pipeline.clone(),
            context.symbols.clone(),
            period,
            shutdown_rx,
        )))
    };

    let state = AppState::new(context.pipeline, context.symbols, period);
    let listener = TcpListener::bind(args.bind).await?;
    quotedesk_web::serve(listener, state, async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for shutdown signal");
        }
        tracing::info!("shutting down");
        let _ = shutdown_tx.send(true);
    })
    .await?;

    if let Some(handle) = scheduler {
        if let Err(error) = handle.await {
            tracing::warn!(%error, "scheduler task ended abnormally");
        }
    }
    Ok(())
}
