mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use std::sync::Arc;
use toolchat::host::McpToolHost;
use toolchat::offline_tools::offline_toolset;
use toolchat::{Orchestrator, ToolCatalog, ToolInvoker, ToolSet};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let backend = config.build_backend()?;

    let mut mcp_host = None;
    let (catalog, invoker): (Arc<dyn ToolCatalog>, Arc<dyn ToolInvoker>) = if config.local_tools {
        let host = Arc::new(offline_toolset().context("could not build offline tools")?);
        let catalog: Arc<dyn ToolCatalog> = host.clone();
        let invoker: Arc<dyn ToolInvoker> = host;
        (catalog, invoker)
    } else {
        let host = McpToolHost::connect(&config.transport(), config.connect_timeout())
            .await
            .context("could not connect to the tool host")?;
        let host = Arc::new(host);
        mcp_host = Some(host.clone());
        let catalog: Arc<dyn ToolCatalog> = host.clone();
        let invoker: Arc<dyn ToolInvoker> = host;
        (catalog, invoker)
    };

    let tools = ToolSet::fetch(catalog.as_ref())
        .await
        .context("could not load the tool catalog")?;
    info!(backend = backend.name(), model = config.model(), tools = ?tools.names(), "session ready");

    let mut orchestrator = Orchestrator::new(backend, tools, invoker)
        .with_observer(Arc::new(cli::ConsoleObserver));
    if let Some(max_turns) = config.max_turns() {
        orchestrator = orchestrator.with_max_turns(max_turns);
    }

    let mut client = cli::CliClient::new(orchestrator);
    client.chat().await?;
    drop(client);
    drop(catalog);

    if let Some(host) = mcp_host.and_then(|host| Arc::try_unwrap(host).ok()) {
        host.shutdown().await;
    }
    Ok(())
}
