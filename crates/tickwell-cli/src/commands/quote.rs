use chrono::Utc;
use tickwell_core::{parse_currency_code, quote_range, AppContext};

use super::CommandResult;
use crate::cli::QuoteArgs;
use crate::error::CliError;

pub async fn run(args: &QuoteArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let target = args
        .currency
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_currency_code)
        .transpose()?;

    let (start, end) = quote_range(args.duration.as_deref(), Utc::now());
    let quote = context.quotes.get_quote(&args.symbol, start, end).await?;
    let quote = match target {
        Some(currency) => context.currency.convert_quote_currency(quote, &currency)?,
        None => quote,
    };

    Ok(CommandResult::data(serde_json::to_value(&quote)?))
}
