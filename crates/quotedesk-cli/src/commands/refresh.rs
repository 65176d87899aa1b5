use quotedesk_core::Period;

use super::Context;
use crate::error::CliError;
use crate::output;

/// Prints the report even when every symbol failed, then exits non-zero.
pub async fn run(context: &Context, period: Period, pretty: bool) -> Result<(), CliError> {
    let report = context.pipeline.refresh(&context.symbols, period).await;
    output::render(&report, pretty)?;

    if report.is_complete_failure() {
        return Err(CliError::RefreshFailed(report.outcomes.len()));
    }
    Ok(())
}
