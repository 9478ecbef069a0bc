//! Field search tools built on NocoDB `where` expressions

use super::{open_table, records_path, require, require_table};
use crate::error::{NocoMcpError, NocoMcpResult};
use crate::nocodb::filter::render_condition;
use crate::nocodb::{build_where, ApiRequest, Condition, ConnectionArgs, Connector, FilterOp};
use serde::Deserialize;
use serde_json::{json, Value};

/// Operators `find_by_field` accepts; ranges need `find_by_fields`
const SINGLE_FIELD_OPS: [FilterOp; 9] = [
    FilterOp::Eq,
    FilterOp::Neq,
    FilterOp::Gt,
    FilterOp::Gte,
    FilterOp::Lt,
    FilterOp::Lte,
    FilterOp::Like,
    FilterOp::In,
    FilterOp::Nin,
];

const CONTACT_NAME_FIELD: &str = "Contact_Name";

const DEFAULT_CONTACT_LIMIT: i64 = 5;
const DEFAULT_SEARCH_LIMIT: i64 = 25;
const DEFAULT_OFFSET: i64 = 0;

fn default_op() -> String {
    "eq".to_string()
}

fn default_logic() -> String {
    "and".to_string()
}

#[derive(Debug, Deserialize)]
pub struct FindContactArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Deserialize)]
pub struct FindByFieldArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_op")]
    pub op: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Deserialize)]
pub struct FindByFieldsArgs {
    #[serde(default)]
    pub table_name: String,
    /// Kept as raw JSON so a non-list gets the same message as an empty one
    #[serde(default)]
    pub conditions: Option<Value>,
    #[serde(default = "default_logic")]
    pub logic: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

async fn query_records(
    connector: &dyn Connector,
    connection_args: &ConnectionArgs,
    table_name: &str,
    build: impl FnOnce(ApiRequest) -> ApiRequest,
) -> NocoMcpResult<Value> {
    let (connection, table_id) = open_table(connector, connection_args, table_name).await?;
    let request = build(ApiRequest::get(records_path(&table_id)));
    tracing::debug!("Searching '{}' with {:?}", table_name, request.query);
    connection.api.send(request).await?.json()
}

/// Exact match on the `Contact_Name` column
pub async fn find_contact_by_name(
    connector: &dyn Connector,
    args: FindContactArgs,
) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    require(!args.name.is_empty(), "Name is required")?;

    let condition = render_condition(CONTACT_NAME_FIELD, FilterOp::Eq, &json!(args.name))?;
    query_records(connector, &args.connection, &args.table_name, |request| {
        request
            .query("limit", args.limit.unwrap_or(DEFAULT_CONTACT_LIMIT))
            .query("where", condition)
    })
    .await
}

pub async fn find_by_field(
    connector: &dyn Connector,
    args: FindByFieldArgs,
) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    require(!args.field.is_empty(), "Field is required")?;
    let op = FilterOp::parse_within(&args.op, &SINGLE_FIELD_OPS)?;
    let condition = render_condition(&args.field, op, &args.value)?;

    query_records(connector, &args.connection, &args.table_name, |request| {
        request
            .query("limit", args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .query("where", condition)
    })
    .await
}

pub async fn find_by_fields(
    connector: &dyn Connector,
    args: FindByFieldsArgs,
) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    let conditions = match args.conditions {
        Some(Value::Array(items)) if !items.is_empty() => {
            serde_json::from_value::<Vec<Condition>>(Value::Array(items))?
        }
        _ => {
            return Err(NocoMcpError::missing(
                "Parameter 'conditions' must be a non-empty list",
            ))
        }
    };
    let filter = build_where(&conditions, &args.logic)?;

    let sort = args.sort.filter(|s| !s.is_empty());
    let fields = args.fields.filter(|f| !f.is_empty());
    query_records(connector, &args.connection, &args.table_name, |request| {
        let mut request = request
            .query("limit", args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .query("offset", args.offset.unwrap_or(DEFAULT_OFFSET))
            .query("where", filter);
        if let Some(sort) = sort {
            request = request.query("sort", sort);
        }
        if let Some(fields) = fields {
            request = request.query("fields", fields);
        }
        request
    })
    .await
}
