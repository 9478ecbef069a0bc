//! NocoDB v2 REST client

use crate::config::NocoDbDefaults;
use crate::error::{NocoMcpError, NocoMcpResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_HEADER: &str = "xc-token";

/// A single call against the NocoDB API, relative to the instance base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful (2xx) NocoDB response with its raw body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn json(&self) -> NocoMcpResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Transport used by the tools to reach NocoDB
#[async_trait]
pub trait NocoDbApi: Send + Sync {
    /// Send a request. Non-2xx answers come back as `NocoMcpError::NocoDbError`.
    async fn send(&self, request: ApiRequest) -> NocoMcpResult<ApiResponse>;
}

/// Per-call connection overrides accepted by every tool
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionArgs {
    pub nocodb_url: Option<String>,
    pub api_token: Option<String>,
    pub base_id: Option<String>,
}

/// An authenticated API handle plus the base the call operates on
pub struct Connection {
    pub api: Box<dyn NocoDbApi>,
    base_id: Option<String>,
}

impl Connection {
    pub fn new(api: Box<dyn NocoDbApi>, base_id: Option<String>) -> Self {
        Self { api, base_id }
    }

    pub fn base_id(&self) -> NocoMcpResult<&str> {
        self.base_id.as_deref().ok_or_else(|| {
            NocoMcpError::missing(
                "NocoDB Base ID is not provided (param base_id or ENV NOCODB_BASE_ID).",
            )
        })
    }
}

/// Builds connections from tool arguments
pub trait Connector: Send + Sync {
    fn connect(&self, args: &ConnectionArgs) -> NocoMcpResult<Connection>;
}

/// Connects over HTTP, falling back to the configured defaults for anything
/// the call does not override
pub struct HttpConnector {
    defaults: NocoDbDefaults,
}

impl HttpConnector {
    pub fn new(defaults: NocoDbDefaults) -> Self {
        Self { defaults }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, args: &ConnectionArgs) -> NocoMcpResult<Connection> {
        let url = pick(&args.nocodb_url, &self.defaults.url).ok_or_else(|| {
            NocoMcpError::missing("NocoDB URL is not provided (param nocodb_url or ENV NOCODB_URL).")
        })?;
        let token = pick(&args.api_token, &self.defaults.api_token).ok_or_else(|| {
            NocoMcpError::missing(
                "NocoDB API token is not provided (param api_token or ENV NOCODB_API_TOKEN).",
            )
        })?;
        let base_id = pick(&args.base_id, &self.defaults.base_id);

        let client = NocoDbClient::new(&url, &token)?;
        Ok(Connection::new(Box::new(client), base_id))
    }
}

fn pick(value: &Option<String>, fallback: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .or(fallback.as_ref().filter(|v| !v.is_empty()))
        .cloned()
}

/// reqwest-backed NocoDB client
pub struct NocoDbClient {
    client: reqwest::Client,
    base_url: String,
}

impl NocoDbClient {
    pub fn new(base_url: &str, api_token: &str) -> NocoMcpResult<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(api_token).map_err(|e| {
            NocoMcpError::ConfigurationError {
                message: format!("Invalid NocoDB API token: {}", e),
            }
        })?;
        headers.insert(TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NocoDbApi for NocoDbClient {
    async fn send(&self, request: ApiRequest) -> NocoMcpResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!("NocoDB {} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("NocoDB {} {} failed with {}", request.method, url, status);
            return Err(NocoMcpError::NocoDbError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace(['_', ' '], "")
}

/// Fetch the table list of a base (`list` entries of the meta endpoint)
pub async fn fetch_tables(api: &dyn NocoDbApi, base_id: &str) -> NocoMcpResult<Value> {
    let response = api
        .send(ApiRequest::get(format!("/api/v2/meta/bases/{}/tables", base_id)))
        .await?;
    response.json()
}

/// Resolve a table id or name to the table id within a base.
///
/// An exact id match wins. Otherwise each table is checked in order against
/// its title and its table name, first verbatim and then ignoring case,
/// underscores and spaces.
pub async fn resolve_table_id(
    api: &dyn NocoDbApi,
    base_id: &str,
    table_name: &str,
) -> NocoMcpResult<String> {
    let payload = fetch_tables(api, base_id).await?;
    let tables = payload
        .get("list")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    find_table_id(&tables, table_name).ok_or_else(|| {
        let available: Vec<Value> = tables
            .iter()
            .map(|t| {
                json!({
                    "id": t.get("id"),
                    "title": t.get("title"),
                    "name": table_name_of(t),
                })
            })
            .collect();
        NocoMcpError::TableNotFound {
            message: format!(
                "Table '{}' not found in base '{}'. Available: {}",
                table_name,
                base_id,
                Value::Array(available)
            ),
        }
    })
}

fn table_name_of(table: &Value) -> Option<&str> {
    table
        .get("table_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| table.get("name").and_then(Value::as_str))
}

fn find_table_id(tables: &[Value], table_name: &str) -> Option<String> {
    let id_of = |t: &Value| t.get("id").and_then(Value::as_str).map(str::to_string);

    if let Some(id) = tables
        .iter()
        .filter_map(id_of)
        .find(|id| id == table_name)
    {
        return Some(id);
    }

    let needle = table_name.trim();
    let needle_norm = normalize(needle);
    tables.iter().find_map(|t| {
        let title = t.get("title").and_then(Value::as_str).unwrap_or("");
        let name = table_name_of(t).unwrap_or("");
        let hit = [title, name].iter().any(|candidate| {
            let candidate = candidate.trim();
            candidate == needle || normalize(candidate) == needle_norm
        });
        if hit {
            id_of(t)
        } else {
            None
        }
    })
}
