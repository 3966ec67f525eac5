use tickwell_core::{AppContext, Ticker};

use super::CommandResult;
use crate::cli::{SymbolAddArgs, SymbolsArgs, SymbolsCommand};
use crate::error::CliError;

pub fn run(args: &SymbolsArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    match &args.command {
        SymbolsCommand::Add(args) => add(args, context),
    }
}

fn add(args: &SymbolAddArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let name = args.name.as_deref().filter(|name| !name.trim().is_empty());
    let symbol = context.store.create_symbol(&ticker, name)?;
    Ok(CommandResult::data(serde_json::to_value(&symbol)?))
}
