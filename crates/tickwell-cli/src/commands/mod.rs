mod cache;
mod quote;
mod scrape;
mod serve;
mod sources;
mod symbols;

use serde_json::Value;
use tickwell_core::{AppConfig, AppContext};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Printable outcome of one command.
#[derive(Debug, Default)]
pub struct CommandResult {
    pub data: Option<Value>,
    /// Set when the command finished but part of its work failed.
    pub partial_failure: bool,
}

impl CommandResult {
    fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            partial_failure: false,
        }
    }
}

pub async fn run(cli: &Cli, config: AppConfig) -> Result<CommandResult, CliError> {
    let context = AppContext::open(config)?;
    execute(&cli.command, &context).await
}

async fn execute(command: &Command, context: &AppContext) -> Result<CommandResult, CliError> {
    match command {
        Command::Serve(args) => serve::run(args, context).await,
        Command::Scrape(_) => scrape::run(context).await,
        Command::Quote(args) => quote::run(args, context).await,
        Command::Symbols(args) => symbols::run(args, context),
        Command::Sources(args) => sources::run(args, context),
        Command::Cache(args) => cache::run(args, context).await,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tickwell_core::{AppConfig, AppContext, ReqwestHttpClient};
    use tickwell_warehouse::Warehouse;

    pub fn context() -> AppContext {
        let config = AppConfig::from_lookup(|name| match name {
            "TICKWELL_HOME" => Some(String::from("/nonexistent")),
            _ => None,
        })
        .expect("config");
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let http = Arc::new(ReqwestHttpClient::new().expect("http client"));
        AppContext::with_parts(config, warehouse, http)
    }
}
