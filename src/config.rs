//! Configuration management for the NocoDB MCP server
//!
//! Every setting can come from a command-line flag or from the environment;
//! flags win. A `.env` file is loaded by `main` before parsing and never
//! overrides variables that are already set.

use crate::error::{NocoMcpError, NocoMcpResult};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::fmt;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// How MCP messages are carried over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// `GET /sse` event stream plus `POST /messages/` for client messages
    Sse,
    /// One JSON-RPC exchange per `POST /mcp`
    #[value(name = "http", alias = "streamable-http")]
    StreamableHttp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Sse => write!(f, "sse"),
            Transport::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// Command-line interface
#[derive(Debug, Clone, Parser)]
#[command(name = "nocodb-mcp-server", version, about)]
pub struct Cli {
    /// Transport used to expose the MCP endpoint
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Sse)]
    pub transport: Transport,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Default NocoDB instance URL, used when a tool call does not pass `nocodb_url`
    #[arg(long, env = "NOCODB_URL")]
    pub nocodb_url: Option<String>,

    /// Default NocoDB API token, used when a tool call does not pass `api_token`
    #[arg(long, env = "NOCODB_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Default NocoDB base id, used when a tool call does not pass `base_id`
    #[arg(long, env = "NOCODB_BASE_ID")]
    pub base_id: Option<String>,
}

/// Fallback NocoDB connection settings taken from the environment
#[derive(Clone, Default)]
pub struct NocoDbDefaults {
    pub url: Option<String>,
    pub api_token: Option<String>,
    pub base_id: Option<String>,
}

// Keeps the token out of logs.
impl fmt::Debug for NocoDbDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NocoDbDefaults")
            .field("url", &self.url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("base_id", &self.base_id)
            .finish()
    }
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// API key for Bearer token authentication
    pub api_key: Option<String>,

    /// Whether authentication is enabled
    pub enabled: bool,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    pub nocodb: NocoDbDefaults,
    pub auth: AuthConfig,
}

impl AuthConfig {
    /// Create AuthConfig from environment variables
    pub fn from_env() -> Self {
        let api_key = std::env::var("HTTP_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let disable_auth = std::env::var("DISABLE_AUTH")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let enabled = !disable_auth && api_key.is_some();

        Self { api_key, enabled }
    }

    pub fn disabled() -> Self {
        Self {
            api_key: None,
            enabled: false,
        }
    }
}

impl ServerConfig {
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            transport: cli.transport,
            nocodb: NocoDbDefaults {
                url: non_empty(cli.nocodb_url),
                api_token: non_empty(cli.api_token),
                base_id: non_empty(cli.base_id),
            },
            auth: AuthConfig::from_env(),
        }
    }

    /// Parse the process arguments and environment
    pub fn load() -> NocoMcpResult<Self> {
        let cli = Cli::try_parse().map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => NocoMcpError::ConfigurationError {
                message: e.to_string(),
            },
        })?;
        Ok(Self::from_cli(cli))
    }

    /// Startup log line announcing the port the server will bind
    pub fn resolved_port_line(&self) -> String {
        format!("Resolved PORT={}", self.port)
    }

    /// `host:port` as handed to the listener; host names are resolved at bind time
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_resolution_from_env_and_flags() {
        std::env::remove_var("PORT");
        let cli = Cli::try_parse_from(["nocodb-mcp-server"]).unwrap();
        assert_eq!(cli.port, DEFAULT_PORT);

        std::env::set_var("PORT", "9090");
        let cli = Cli::try_parse_from(["nocodb-mcp-server"]).unwrap();
        assert_eq!(cli.port, 9090);

        let cli = Cli::try_parse_from(["nocodb-mcp-server", "--port", "7000"]).unwrap();
        assert_eq!(cli.port, 7000);

        std::env::remove_var("PORT");

        assert!(Cli::try_parse_from(["nocodb-mcp-server", "--port", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["nocodb-mcp-server", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_transport_flag_accepts_aliases() {
        let cli =
            Cli::try_parse_from(["nocodb-mcp-server", "--transport", "streamable-http"]).unwrap();
        assert_eq!(cli.transport, Transport::StreamableHttp);

        let cli = Cli::try_parse_from(["nocodb-mcp-server", "--transport", "http"]).unwrap();
        assert_eq!(cli.transport, Transport::StreamableHttp);

        let cli = Cli::try_parse_from(["nocodb-mcp-server", "--transport", "sse"]).unwrap();
        assert_eq!(cli.transport, Transport::Sse);

        assert!(Cli::try_parse_from(["nocodb-mcp-server", "--transport", "stdio"]).is_err());
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 9090,
            transport: Transport::Sse,
            nocodb: NocoDbDefaults::default(),
            auth: AuthConfig::disabled(),
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.resolved_port_line(), "Resolved PORT=9090");
    }

    #[test]
    fn test_blank_defaults_are_dropped() {
        let cli = Cli::try_parse_from([
            "nocodb-mcp-server",
            "--nocodb-url",
            "  ",
            "--base-id",
            "p123",
        ])
        .unwrap();
        let config = ServerConfig::from_cli(cli);
        assert_eq!(config.nocodb.url, None);
        assert_eq!(config.nocodb.base_id.as_deref(), Some("p123"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let defaults = NocoDbDefaults {
            url: Some("http://nocodb".to_string()),
            api_token: Some("secret-token".to_string()),
            base_id: None,
        };
        let rendered = format!("{:?}", defaults);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_auth_config_from_env() {
        std::env::set_var("HTTP_API_KEY", "test-key");
        std::env::set_var("DISABLE_AUTH", "false");

        let config = AuthConfig::from_env();
        assert!(config.enabled);
        assert_eq!(config.api_key, Some("test-key".to_string()));

        std::env::set_var("DISABLE_AUTH", "true");
        assert!(!AuthConfig::from_env().enabled);

        std::env::remove_var("HTTP_API_KEY");
        std::env::remove_var("DISABLE_AUTH");
    }
}
