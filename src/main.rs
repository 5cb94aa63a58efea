//! Task dispatch server entry point.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use task_dispatch::api;
use task_dispatch::config::Config;
use task_dispatch::dispatch::{DispatchContext, Dispatcher};
use task_dispatch::llm::OpenAiClient;
use task_dispatch::tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env().context("Invalid configuration")?);
    if config.api_token.is_none() {
        warn!("AIPROXY_TOKEN is not set; every remote model call will fail");
    }
    if config.allow_remote_exec {
        warn!("ALLOW_REMOTE_EXEC is enabled; setup_and_run_datagen will run downloaded scripts");
    }

    let llm = OpenAiClient::new(Arc::clone(&config)).context("Failed to build HTTP client")?;
    let ctx = DispatchContext::new(Arc::clone(&config), Arc::new(llm));
    let registry = ToolRegistry::new();
    info!(
        "Registered {} operations; chat model {}",
        registry.get_tool_schemas().len(),
        config.chat_model
    );

    let dispatcher = Arc::new(Dispatcher::new(ctx, registry));
    api::serve(config, dispatcher).await.context("Server error")?;
    Ok(())
}
