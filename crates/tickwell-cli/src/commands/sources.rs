use tickwell_core::{AppContext, SourceId, Ticker};

use super::CommandResult;
use crate::cli::{SourceAddArgs, SourceBaseUrlArgs, SourcesArgs, SourcesCommand};
use crate::error::CliError;

pub fn run(args: &SourcesArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    match &args.command {
        SourcesCommand::Add(args) => add(args, context),
        SourcesCommand::BaseUrl(args) => base_url(args, context),
    }
}

fn add(args: &SourceAddArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.symbol)?;
    let source: SourceId = args.source.parse()?;
    let symbol = context.store.symbol_by_ticker(&ticker)?;

    context
        .store
        .upsert_symbol_source(symbol.id, source, args.url.as_deref())?;
    let descriptor = context.store.symbol_source(symbol.id, source)?;
    Ok(CommandResult::data(serde_json::to_value(&descriptor)?))
}

fn base_url(args: &SourceBaseUrlArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let source: SourceId = args.source.parse()?;
    context
        .store
        .upsert_scraping_source(source, Some(args.url.as_str()))?;
    let scraping_source = context.store.scraping_source(source)?;
    Ok(CommandResult::data(serde_json::to_value(&scraping_source)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[test]
    fn add_attaches_url_to_registered_symbol() {
        let context = test_support::context();
        let ticker = Ticker::parse("AAPL").expect("ticker");
        context.store.create_symbol(&ticker, None).expect("symbol");

        let args = SourceAddArgs {
            symbol: String::from("aapl"),
            source: String::from("NASDAQ"),
            url: Some(String::from("https://api.nasdaq.com/api/quote/AAPL/info")),
        };
        let data = add(&args, &context).expect("added").data.expect("output");
        assert_eq!(
            data["scrape_url"],
            "https://api.nasdaq.com/api/quote/AAPL/info"
        );
    }

    #[test]
    fn add_rejects_unknown_source_and_symbol() {
        let context = test_support::context();
        let args = SourceAddArgs {
            symbol: String::from("AAPL"),
            source: String::from("BLOOMBERG"),
            url: None,
        };
        assert!(matches!(
            add(&args, &context),
            Err(CliError::Validation(_))
        ));

        let args = SourceAddArgs {
            source: String::from("NASDAQ"),
            ..args
        };
        assert!(matches!(add(&args, &context), Err(CliError::Store(_))));
    }

    #[test]
    fn base_url_is_stored_per_source() {
        let context = test_support::context();
        let args = SourceBaseUrlArgs {
            source: String::from("YFINANCEAPI"),
            url: String::from("https://yfapi.net"),
        };

        let data = base_url(&args, &context).expect("stored").data.expect("output");
        assert_eq!(data["base_url"], "https://yfapi.net");
    }
}
