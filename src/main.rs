//! MCP Session Server - Binary Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mcp_session_server::config::Config;
use mcp_session_server::tools::{register_builtin_tools, ToolRegistry};
use mcp_session_server::{ServerInfo, Transport};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // stdout carries the stdio transport, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);

    let transport = Transport::from_config(&config, ServerInfo::default(), Arc::new(tools));
    info!(
        transport = transport.name(),
        version = mcp_session_server::VERSION,
        "Starting MCP server"
    );

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
