//! Table metadata tools

use super::{open_table, require_table};
use crate::error::NocoMcpResult;
use crate::nocodb::client::fetch_tables;
use crate::nocodb::{ApiRequest, ConnectionArgs, Connector};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ListTablesArgs {
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetSchemaArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

/// Always returns an object: `{"tables": [...], "pageInfo": {...}}`
pub async fn list_tables(connector: &dyn Connector, args: ListTablesArgs) -> NocoMcpResult<Value> {
    let connection = connector.connect(&args.connection)?;
    let base_id = connection.base_id()?;
    let mut data = fetch_tables(connection.api.as_ref(), base_id).await?;

    let page_info = data.get("pageInfo").cloned().unwrap_or(Value::Null);
    let tables = if data.get("list").is_some() {
        data["list"].take()
    } else {
        data
    };
    Ok(json!({"tables": tables, "pageInfo": page_info}))
}

pub async fn get_schema(connector: &dyn Connector, args: GetSchemaArgs) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;

    let (connection, table_id) =
        open_table(connector, &args.connection, &args.table_name).await?;
    let response = connection
        .api
        .send(ApiRequest::get(format!("/api/v2/meta/tables/{}", table_id)))
        .await?;
    response.json()
}
