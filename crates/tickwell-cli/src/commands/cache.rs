use serde_json::json;
use tickwell_core::AppContext;

use super::CommandResult;
use crate::cli::{CacheArgs, CacheCommand};
use crate::error::CliError;

pub async fn run(args: &CacheArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    match args.command {
        CacheCommand::Sweep => {
            let removed = context.cache.delete_expired().await?;
            Ok(CommandResult::data(json!({ "removed": removed })))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::commands::test_support;

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let context = test_support::context();
        context
            .cache
            .put("quote:DTE:1:2", String::from("{}"), Duration::ZERO)
            .await
            .expect("expired entry");
        context
            .cache
            .put("quote:NOVO-B:1:2", String::from("{}"), Duration::from_secs(60))
            .await
            .expect("live entry");

        let args = CacheArgs {
            command: CacheCommand::Sweep,
        };
        let data = run(&args, &context).await.expect("sweep").data.expect("output");
        assert_eq!(data["removed"], 1);

        let live = context.cache.get("quote:NOVO-B:1:2").await.expect("get");
        assert_eq!(live.as_deref(), Some("{}"));
    }
}
