//! NocoDB MCP Server
//!
//! Exposes a NocoDB base to Model Context Protocol (MCP) clients over HTTP.
//!
//! ## Features
//!
//! - **Tools**: list tables, read table schemas, record CRUD and field searches
//! - **Filters**: builder for NocoDB `where` expressions (`eq` … `between`)
//! - **Transports**: SSE (`/sse` + `/messages/`) or request/response (`/mcp`)
//! - **Authentication**: optional Bearer token on the MCP endpoints
//! - **Configuration**: flags or environment (`PORT`, `NOCODB_URL`, ...)
//!
//! ## Example
//!
//! ```rust,no_run
//! use nocodb_mcp_server::{McpHttpServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::load()?;
//!     McpHttpServer::new(config).serve().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http_server;
pub mod mcp;
pub mod nocodb;
pub mod tools;

// Re-export commonly used types
pub use config::{AuthConfig, Cli, NocoDbDefaults, ServerConfig, Transport};
pub use error::{NocoMcpError, NocoMcpResult};
pub use http_server::McpHttpServer;
pub use mcp::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use nocodb::{Connector, HttpConnector, NocoDbApi, NocoDbClient};
pub use tools::{NocoDbTools, ToolName};
