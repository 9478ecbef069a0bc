//! MCP tools backed by the NocoDB API
//!
//! Every tool accepts optional `nocodb_url`, `api_token` and `base_id`
//! arguments that override the server-wide defaults for that call. Tool
//! failures are reported in-band as `{"error": true, "message": ...}` objects
//! (plus `status_code` when NocoDB itself rejected the request) so the client
//! model can read and react to them.

pub mod records;
pub mod search;
pub mod tables;

use crate::error::{NocoMcpError, NocoMcpResult};
use crate::nocodb::{resolve_table_id, Connection, ConnectionArgs, Connector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Names of the exposed tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    ListTables,
    RetrieveRecords,
    CreateRecords,
    UpdateRecords,
    DeleteRecords,
    GetSchema,
    FindContactByName,
    FindByField,
    FindByFields,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::ListTables,
        ToolName::RetrieveRecords,
        ToolName::CreateRecords,
        ToolName::UpdateRecords,
        ToolName::DeleteRecords,
        ToolName::GetSchema,
        ToolName::FindContactByName,
        ToolName::FindByField,
        ToolName::FindByFields,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListTables => "list_tables",
            ToolName::RetrieveRecords => "retrieve_records",
            ToolName::CreateRecords => "create_records",
            ToolName::UpdateRecords => "update_records",
            ToolName::DeleteRecords => "delete_records",
            ToolName::GetSchema => "get_schema",
            ToolName::FindContactByName => "find_contact_by_name",
            ToolName::FindByField => "find_by_field",
            ToolName::FindByFields => "find_by_fields",
        }
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool metadata advertised through `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn connection_properties() -> Value {
    json!({
        "nocodb_url": {"type": "string", "description": "NocoDB instance URL (defaults to NOCODB_URL)"},
        "api_token": {"type": "string", "description": "NocoDB API token (defaults to NOCODB_API_TOKEN)"},
        "base_id": {"type": "string", "description": "NocoDB base id (defaults to NOCODB_BASE_ID)"}
    })
}

fn schema(properties: Value, required: &[&str]) -> Value {
    let mut merged = connection_properties();
    if let (Some(target), Value::Object(extra)) = (merged.as_object_mut(), properties) {
        target.extend(extra);
    }
    json!({
        "type": "object",
        "properties": merged,
        "required": required,
    })
}

const TABLE_NAME: &str = "Table title, table name or table id";

impl ToolName {
    pub fn definition(&self) -> ToolDefinition {
        let (description, input_schema) = match self {
            ToolName::ListTables => (
                "List the tables of a NocoDB base. Returns {\"tables\": [...], \"pageInfo\": {...}}.",
                schema(json!({}), &[]),
            ),
            ToolName::RetrieveRecords => (
                "Retrieve one record by row id, or a page of records with optional where filter, sort and field selection.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "row_id": {"type": ["string", "integer"], "description": "Fetch a single record by id"},
                        "filters": {"type": "string", "description": "NocoDB where expression, e.g. (Status,eq,'Active')"},
                        "limit": {"type": "integer", "default": 10},
                        "offset": {"type": "integer", "default": 0},
                        "sort": {"type": "string", "description": "Sort field, prefix with - for descending"},
                        "fields": {"type": "string", "description": "Comma separated list of fields to return"}
                    }),
                    &["table_name"],
                ),
            ),
            ToolName::CreateRecords => (
                "Create one record, or several at once when bulk is true.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "data": {"type": ["object", "array"], "description": "Record fields, or a list of records for bulk"},
                        "bulk": {"type": "boolean", "default": false}
                    }),
                    &["table_name", "data"],
                ),
            ),
            ToolName::UpdateRecords => (
                "Update one record by row id, or several records by id when bulk is true.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "row_id": {"type": ["string", "integer"]},
                        "data": {"type": "object", "description": "Fields to update"},
                        "bulk": {"type": "boolean", "default": false},
                        "bulk_ids": {"type": "array", "items": {"type": ["string", "integer"]}}
                    }),
                    &["table_name", "data"],
                ),
            ),
            ToolName::DeleteRecords => (
                "Delete one record by row id, or several records by id when bulk is true.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "row_id": {"type": ["string", "integer"]},
                        "bulk": {"type": "boolean", "default": false},
                        "bulk_ids": {"type": "array", "items": {"type": ["string", "integer"]}}
                    }),
                    &["table_name"],
                ),
            ),
            ToolName::GetSchema => (
                "Retrieve the schema (columns) of a table.",
                schema(
                    json!({"table_name": {"type": "string", "description": TABLE_NAME}}),
                    &["table_name"],
                ),
            ),
            ToolName::FindContactByName => (
                "Find contacts whose Contact_Name equals the given name.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "name": {"type": "string"},
                        "limit": {"type": "integer", "default": 5}
                    }),
                    &["table_name", "name"],
                ),
            ),
            ToolName::FindByField => (
                "Find records by a single field comparison. Operators: eq, neq, gt, gte, lt, lte, like, in, nin.",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "field": {"type": "string"},
                        "value": {"description": "Value to compare; a list for in/nin, % wildcards for like"},
                        "op": {"type": "string", "default": "eq"},
                        "limit": {"type": "integer", "default": 25}
                    }),
                    &["table_name", "field", "value"],
                ),
            ),
            ToolName::FindByFields => (
                "Find records matching several field conditions combined with and/or. Operators: eq, neq, gt, gte, lt, lte, like, in, nin, between ([min, max]).",
                schema(
                    json!({
                        "table_name": {"type": "string", "description": TABLE_NAME},
                        "conditions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "field": {"type": "string"},
                                    "op": {"type": "string", "default": "eq"},
                                    "value": {}
                                },
                                "required": ["field"]
                            }
                        },
                        "logic": {"type": "string", "enum": ["and", "or"], "default": "and"},
                        "limit": {"type": "integer", "default": 25},
                        "offset": {"type": "integer", "default": 0},
                        "sort": {"type": "string"},
                        "fields": {"type": "string"}
                    }),
                    &["table_name", "conditions"],
                ),
            ),
        };

        ToolDefinition {
            name: self.as_str(),
            description,
            input_schema,
        }
    }
}

/// In-band error object returned to the client
pub fn error_output(message: impl Into<String>) -> Value {
    json!({"error": true, "message": message.into()})
}

impl From<NocoMcpError> for Value {
    fn from(err: NocoMcpError) -> Self {
        match err {
            NocoMcpError::NocoDbError { status, body } => {
                json!({"error": true, "status_code": status, "message": body})
            }
            other => error_output(other.to_string()),
        }
    }
}

pub fn is_error(output: &Value) -> bool {
    output.get("error").and_then(Value::as_bool).unwrap_or(false)
}

/// Accepts ids sent either as strings or as numbers
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn records_path(table_id: &str) -> String {
    format!("/api/v2/tables/{}/records", table_id)
}

pub(crate) fn require(condition: bool, message: &str) -> NocoMcpResult<()> {
    if condition {
        Ok(())
    } else {
        Err(NocoMcpError::missing(message))
    }
}

pub(crate) fn require_table(table_name: &str) -> NocoMcpResult<()> {
    require(!table_name.is_empty(), "Table name is required")
}

/// Connect and resolve `table_name` to its id
pub(crate) async fn open_table(
    connector: &dyn Connector,
    args: &ConnectionArgs,
    table_name: &str,
) -> NocoMcpResult<(Connection, String)> {
    let connection = connector.connect(args)?;
    let table_id = {
        let base_id = connection.base_id()?;
        resolve_table_id(connection.api.as_ref(), base_id, table_name).await?
    };
    Ok((connection, table_id))
}

/// Dispatches tool calls to their implementations
#[derive(Clone)]
pub struct NocoDbTools {
    connector: Arc<dyn Connector>,
}

impl NocoDbTools {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL.iter().map(ToolName::definition).collect()
    }

    /// Run a tool; failures come back as error objects, never as `Err`
    pub async fn call(&self, tool: ToolName, arguments: Value) -> Value {
        tracing::info!("Calling tool '{}'", tool);
        let connector = self.connector.as_ref();

        let result = match tool {
            ToolName::ListTables => run(arguments, |a| tables::list_tables(connector, a)).await,
            ToolName::RetrieveRecords => {
                run(arguments, |a| records::retrieve_records(connector, a)).await
            }
            ToolName::CreateRecords => {
                run(arguments, |a| records::create_records(connector, a)).await
            }
            ToolName::UpdateRecords => {
                run(arguments, |a| records::update_records(connector, a)).await
            }
            ToolName::DeleteRecords => {
                run(arguments, |a| records::delete_records(connector, a)).await
            }
            ToolName::GetSchema => run(arguments, |a| tables::get_schema(connector, a)).await,
            ToolName::FindContactByName => {
                run(arguments, |a| search::find_contact_by_name(connector, a)).await
            }
            ToolName::FindByField => run(arguments, |a| search::find_by_field(connector, a)).await,
            ToolName::FindByFields => {
                run(arguments, |a| search::find_by_fields(connector, a)).await
            }
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Tool '{}' failed: {}", tool, e);
                e.into()
            }
        }
    }
}

async fn run<A, F, Fut>(arguments: Value, tool: F) -> NocoMcpResult<Value>
where
    A: DeserializeOwned,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = NocoMcpResult<Value>>,
{
    tool(parse(arguments)?).await
}

fn parse<T: DeserializeOwned>(arguments: Value) -> NocoMcpResult<T> {
    // Clients may omit `arguments` entirely for tools without required fields.
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| {
        NocoMcpError::missing(format!("Invalid arguments: {}", e))
    })
}
