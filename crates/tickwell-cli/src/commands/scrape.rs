use tickwell_core::AppContext;

use super::CommandResult;
use crate::error::CliError;

/// A pass that isolated failures still prints its report, with exit code 3.
pub async fn run(context: &AppContext) -> Result<CommandResult, CliError> {
    let report = context.scraper.scrape_symbols().await?;
    let partial_failure = !report.failures.is_empty();
    Ok(CommandResult {
        data: Some(serde_json::to_value(&report)?),
        partial_failure,
    })
}
