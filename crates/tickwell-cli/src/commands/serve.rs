use std::net::SocketAddr;
use std::sync::Arc;

use tickwell_core::{spawn_sweeper, AppContext, SWEEP_INTERVAL};
use tickwell_web::AppState;
use tracing::info;

use super::CommandResult;
use crate::cli::ServeArgs;
use crate::error::CliError;

pub async fn run(args: &ServeArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let port = args.port.unwrap_or(context.config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let sweeper = spawn_sweeper(Arc::clone(&context.cache), SWEEP_INTERVAL);
    info!(
        policy = %context.config.failure_policy,
        memory_cache = context.cache.memory_enabled(),
        "starting server"
    );

    let served = tickwell_web::serve(AppState::from_context(context), addr).await;
    sweeper.abort();
    served?;

    Ok(CommandResult::default())
}
