//! Record CRUD tools

use super::{deserialize_opt_id, open_table, records_path, require, require_table};
use crate::error::{NocoMcpError, NocoMcpResult};
use crate::nocodb::{ApiRequest, ApiResponse, ConnectionArgs, Connector};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LIMIT: i64 = 10;
const DEFAULT_OFFSET: i64 = 0;

#[derive(Debug, Default, Deserialize)]
pub struct RetrieveArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub row_id: Option<String>,
    #[serde(default)]
    pub filters: Option<String>,
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

#[derive(Debug, Default, Deserialize)]
pub struct CreateArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub bulk: bool,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub row_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub bulk: bool,
    #[serde(default)]
    pub bulk_ids: Option<Vec<Value>>,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteArgs {
    #[serde(default)]
    pub table_name: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub row_id: Option<String>,
    #[serde(default)]
    pub bulk: bool,
    #[serde(default)]
    pub bulk_ids: Option<Vec<Value>>,
    #[serde(flatten)]
    pub connection: ConnectionArgs,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn has_ids(ids: &Option<Vec<Value>>) -> bool {
    ids.as_ref().is_some_and(|ids| !ids.is_empty())
}

fn is_empty_payload(data: &Option<Value>) -> bool {
    match data {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

pub async fn retrieve_records(
    connector: &dyn Connector,
    args: RetrieveArgs,
) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;

    let (connection, table_id) =
        open_table(connector, &args.connection, &args.table_name).await?;

    let request = match present(&args.row_id) {
        Some(row_id) => ApiRequest::get(format!("{}/{}", records_path(&table_id), row_id)),
        None => {
            let mut request = ApiRequest::get(records_path(&table_id))
                .query("limit", args.limit.unwrap_or(DEFAULT_LIMIT))
                .query("offset", args.offset.unwrap_or(DEFAULT_OFFSET));
            if let Some(sort) = present(&args.sort) {
                request = request.query("sort", sort);
            }
            if let Some(fields) = present(&args.fields) {
                request = request.query("fields", fields);
            }
            if let Some(filters) = present(&args.filters) {
                request = request.query("where", filters);
            }
            request
        }
    };

    connection.api.send(request).await?.json()
}

pub async fn create_records(connector: &dyn Connector, args: CreateArgs) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    let data = match args.data {
        Some(data) if !data.is_null() => data,
        _ => return Err(NocoMcpError::missing("Data is required")),
    };

    // Bulk always posts a list, single always posts one object.
    let (path_suffix, payload) = match (args.bulk, data) {
        (true, Value::Array(items)) => ("/bulk", Value::Array(items)),
        (true, single) => ("/bulk", Value::Array(vec![single])),
        (false, Value::Array(items)) => (
            "",
            items.into_iter().next().unwrap_or_else(|| json!({})),
        ),
        (false, single) => ("", single),
    };

    let (connection, table_id) =
        open_table(connector, &args.connection, &args.table_name).await?;
    let request = ApiRequest::new(
        Method::POST,
        format!("{}{}", records_path(&table_id), path_suffix),
    )
    .json(payload);

    connection.api.send(request).await?.json()
}

pub async fn update_records(connector: &dyn Connector, args: UpdateArgs) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    require(
        !is_empty_payload(&args.data),
        "Data parameter is required for updates",
    )?;
    if args.bulk {
        require(has_ids(&args.bulk_ids), "Bulk IDs are required for bulk updates")?;
    } else {
        require(
            present(&args.row_id).is_some(),
            "Row ID is required for single record update",
        )?;
    }

    let (connection, table_id) =
        open_table(connector, &args.connection, &args.table_name).await?;
    let data = args.data.unwrap_or(Value::Null);

    let request = match (args.bulk, args.bulk_ids, present(&args.row_id)) {
        (true, Some(ids), _) => {
            ApiRequest::new(Method::PATCH, format!("{}/bulk", records_path(&table_id)))
                .json(json!({"ids": ids, "data": data}))
        }
        (_, _, row_id) => ApiRequest::new(
            Method::PATCH,
            format!("{}/{}", records_path(&table_id), row_id.unwrap_or_default()),
        )
        .json(data),
    };

    connection.api.send(request).await?.json()
}

pub async fn delete_records(connector: &dyn Connector, args: DeleteArgs) -> NocoMcpResult<Value> {
    require_table(&args.table_name)?;
    if args.bulk {
        require(has_ids(&args.bulk_ids), "Bulk IDs are required for bulk deletion")?;
    } else {
        require(
            present(&args.row_id).is_some(),
            "Row ID is required for single record deletion",
        )?;
    }

    let (connection, table_id) =
        open_table(connector, &args.connection, &args.table_name).await?;

    let request = match (args.bulk, args.bulk_ids, present(&args.row_id)) {
        (true, Some(ids), _) => {
            ApiRequest::new(Method::DELETE, format!("{}/bulk", records_path(&table_id)))
                .json(json!({"ids": ids}))
        }
        (_, _, row_id) => ApiRequest::new(
            Method::DELETE,
            format!("{}/{}", records_path(&table_id), row_id.unwrap_or_default()),
        ),
    };

    let response = connection.api.send(request).await?;
    Ok(deletion_summary(&response))
}

/// NocoDB answers deletions with nothing, a count, an id list or an object
fn deletion_summary(response: &ApiResponse) -> Value {
    const DELETED: &str = "Record(s) deleted successfully";

    if response.status == 204 {
        return json!({"success": true, "message": DELETED});
    }
    match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Number(count)) => {
            let count = count.as_f64().unwrap_or_default().trunc() as i64;
            json!({
                "success": true,
                "message": format!("{} record(s) deleted successfully", count),
            })
        }
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({"success": true, "message": DELETED, "response_data": other}),
        Err(_) => json!({
            "success": true,
            "message": format!("{} (non-JSON response)", DELETED),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nocodb::mock::MockNocoDb;

    fn retrieve(table: &str) -> RetrieveArgs {
        RetrieveArgs {
            table_name: table.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retrieve_page_with_defaults() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::GET, "/api/v2/tables/m1/records", 200, json!({"list": []}));

        let output = retrieve_records(&mock.connector(Some("p1")), retrieve("Contacts"))
            .await
            .unwrap();
        assert_eq!(output, json!({"list": []}));

        let request = mock.last_request();
        assert_eq!(
            request.query,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("offset".to_string(), "0".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_retrieve_passes_filters_sort_and_fields() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::GET, "/api/v2/tables/m1/records", 200, json!({"list": []}));

        let args = RetrieveArgs {
            filters: Some("(Status,eq,'Active')".to_string()),
            limit: Some(3),
            offset: Some(6),
            sort: Some("-Name".to_string()),
            fields: Some("".to_string()),
            ..retrieve("Contacts")
        };
        retrieve_records(&mock.connector(Some("p1")), args).await.unwrap();

        let query = mock.last_request().query;
        assert_eq!(
            query,
            vec![
                ("limit".to_string(), "3".to_string()),
                ("offset".to_string(), "6".to_string()),
                ("sort".to_string(), "-Name".to_string()),
                ("where".to_string(), "(Status,eq,'Active')".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_retrieve_single_row() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::GET, "/api/v2/tables/m1/records/7", 200, json!({"Id": 7}));

        let args = RetrieveArgs {
            row_id: Some("7".to_string()),
            ..retrieve("m1")
        };
        let output = retrieve_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(output["Id"], 7);
        assert!(mock.last_request().query.is_empty());
    }

    #[tokio::test]
    async fn test_create_single_takes_first_of_list() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::POST, "/api/v2/tables/m1/records", 200, json!({"Id": 1}));

        let args = CreateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!([{"Name": "A"}, {"Name": "B"}])),
            ..Default::default()
        };
        create_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(mock.last_request().body, Some(json!({"Name": "A"})));
    }

    #[tokio::test]
    async fn test_create_bulk_wraps_single_object() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::POST, "/api/v2/tables/m1/records/bulk", 200, json!([{"Id": 1}]));

        let args = CreateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!({"Name": "A"})),
            bulk: true,
            ..Default::default()
        };
        let output = create_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(output, json!([{"Id": 1}]));
        assert_eq!(mock.last_request().body, Some(json!([{"Name": "A"}])));
    }

    #[tokio::test]
    async fn test_create_requires_data() {
        let mock = MockNocoDb::with_contacts();
        let args = CreateArgs {
            table_name: "Contacts".to_string(),
            data: Some(Value::Null),
            ..Default::default()
        };
        let err = create_records(&mock.connector(Some("p1")), args).await.unwrap_err();
        assert_eq!(err.to_string(), "Data is required");
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_validation() {
        let mock = MockNocoDb::with_contacts();
        let connector = mock.connector(Some("p1"));

        let args = UpdateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!({})),
            row_id: Some("1".to_string()),
            ..Default::default()
        };
        let err = update_records(&connector, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Data parameter is required for updates");

        let args = UpdateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!({"Name": "B"})),
            bulk: true,
            ..Default::default()
        };
        let err = update_records(&connector, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Bulk IDs are required for bulk updates");

        let args = UpdateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!({"Name": "B"})),
            ..Default::default()
        };
        let err = update_records(&connector, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Row ID is required for single record update");
    }

    #[tokio::test]
    async fn test_update_bulk_sends_ids_and_data() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::PATCH, "/api/v2/tables/m1/records/bulk", 200, json!([{"Id": 1}]));

        let args = UpdateArgs {
            table_name: "Contacts".to_string(),
            data: Some(json!({"Status": "Won"})),
            bulk: true,
            bulk_ids: Some(vec![json!(1), json!("2")]),
            ..Default::default()
        };
        update_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(
            mock.last_request().body,
            Some(json!({"ids": [1, "2"], "data": {"Status": "Won"}}))
        );
    }

    #[tokio::test]
    async fn test_update_single_row() {
        let mock = MockNocoDb::with_contacts();
        mock.respond(Method::PATCH, "/api/v2/tables/m1/records/5", 200, json!({"Id": 5}));

        let args = UpdateArgs {
            table_name: "Contacts".to_string(),
            row_id: Some("5".to_string()),
            data: Some(json!({"Status": "Lost"})),
            ..Default::default()
        };
        let output = update_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(output["Id"], 5);
        assert_eq!(mock.last_request().body, Some(json!({"Status": "Lost"})));
    }

    #[tokio::test]
    async fn test_delete_validation() {
        let mock = MockNocoDb::with_contacts();
        let connector = mock.connector(Some("p1"));

        let args = DeleteArgs {
            table_name: "Contacts".to_string(),
            bulk: true,
            bulk_ids: Some(vec![]),
            ..Default::default()
        };
        let err = delete_records(&connector, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Bulk IDs are required for bulk deletion");

        let args = DeleteArgs {
            table_name: "Contacts".to_string(),
            ..Default::default()
        };
        let err = delete_records(&connector, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Row ID is required for single record deletion");
    }

    #[tokio::test]
    async fn test_delete_bulk_sends_ids_in_body() {
        let mock = MockNocoDb::with_contacts();
        mock.respond_raw(Method::DELETE, "/api/v2/tables/m1/records/bulk", 200, "2");

        let args = DeleteArgs {
            table_name: "Contacts".to_string(),
            bulk: true,
            bulk_ids: Some(vec![json!(1), json!(2)]),
            ..Default::default()
        };
        let output = delete_records(&mock.connector(Some("p1")), args).await.unwrap();
        assert_eq!(
            output,
            json!({"success": true, "message": "2 record(s) deleted successfully"})
        );
        assert_eq!(mock.last_request().body, Some(json!({"ids": [1, 2]})));
    }

    #[test]
    fn test_deletion_summary_shapes() {
        let summary = |status: u16, body: &str| {
            deletion_summary(&ApiResponse {
                status,
                body: body.to_string(),
            })
        };

        assert_eq!(
            summary(204, ""),
            json!({"success": true, "message": "Record(s) deleted successfully"})
        );
        assert_eq!(summary(200, "{\"Id\": 3}"), json!({"Id": 3}));
        assert_eq!(
            summary(200, "[{\"Id\": 3}]"),
            json!({
                "success": true,
                "message": "Record(s) deleted successfully",
                "response_data": [{"Id": 3}]
            })
        );
        assert_eq!(
            summary(200, "deleted"),
            json!({
                "success": true,
                "message": "Record(s) deleted successfully (non-JSON response)"
            })
        );
    }

    #[tokio::test]
    async fn test_nocodb_error_is_propagated() {
        let mock = MockNocoDb::with_contacts();
        mock.respond_raw(
            Method::DELETE,
            "/api/v2/tables/m1/records/9",
            404,
            "{\"msg\":\"Record not found\"}",
        );
        let args = DeleteArgs {
            table_name: "Contacts".to_string(),
            row_id: Some("9".to_string()),
            ..Default::default()
        };
        let err = delete_records(&mock.connector(Some("p1")), args).await.unwrap_err();
        let output: Value = err.into();
        assert_eq!(output["status_code"], 404);
        assert_eq!(output["message"], "{\"msg\":\"Record not found\"}");
    }
}
