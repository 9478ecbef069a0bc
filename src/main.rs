use nocodb_mcp_server::{McpHttpServer, NocoMcpResult, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> NocoMcpResult<()> {
    // Loaded before the subscriber so RUST_LOG from .env applies; the outcome is logged once tracing is up.
    // Existing environment variables win over .env entries.
    let dotenv = dotenvy::dotenv();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "nocodb_mcp_server=debug".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = dotenv {
        // It's okay if .env file doesn't exist
        tracing::debug!("No .env file found or error loading it: {}", e);
    }

    tracing::info!("Starting NocoDB MCP server...");

    let config = ServerConfig::load()?;

    tracing::info!("{}", config.resolved_port_line());
    tracing::info!(
        "Configuration - Host: {}, Transport: {}, NOCODB_URL set: {}, NOCODB_BASE_ID set: {}, Auth: {}",
        config.host,
        config.transport,
        config.nocodb.url.is_some(),
        config.nocodb.base_id.is_some(),
        if config.auth.enabled { "enabled" } else { "disabled" }
    );

    McpHttpServer::new(config).serve().await?;

    Ok(())
}
