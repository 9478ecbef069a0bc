//! In-memory NocoDB stand-in for unit tests

use super::client::{ApiRequest, ApiResponse, Connection, ConnectionArgs, Connector, NocoDbApi};
use crate::error::{NocoMcpError, NocoMcpResult};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), (u16, String)>,
    requests: Vec<ApiRequest>,
}

/// Replies with canned bodies keyed by method and path, and records every request
#[derive(Clone, Default)]
pub struct MockNocoDb {
    state: Arc<Mutex<MockState>>,
}

impl MockNocoDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose base `p1` holds a `Contacts` table with id `m1`
    pub fn with_contacts() -> Self {
        let mock = Self::new();
        mock.respond(
            Method::GET,
            "/api/v2/meta/bases/p1/tables",
            200,
            json!({"list": [{"id": "m1", "title": "Contacts", "table_name": "contacts"}]}),
        );
        mock
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .insert((method, path.to_string()), (status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request recorded")
    }

    pub fn connector(&self, base_id: Option<&str>) -> MockConnector {
        MockConnector {
            mock: self.clone(),
            base_id: base_id.map(str::to_string),
        }
    }
}

#[async_trait]
impl NocoDbApi for MockNocoDb {
    async fn send(&self, request: ApiRequest) -> NocoMcpResult<ApiResponse> {
        let mut state = self.state.lock().unwrap();
        let key = (request.method.clone(), request.path.clone());
        state.requests.push(request);
        let (status, body) = state
            .routes
            .get(&key)
            .cloned()
            .unwrap_or((404, "not found".to_string()));

        if !(200..300).contains(&status) {
            return Err(NocoMcpError::NocoDbError { status, body });
        }
        Ok(ApiResponse { status, body })
    }
}

pub struct MockConnector {
    mock: MockNocoDb,
    base_id: Option<String>,
}

impl Connector for MockConnector {
    fn connect(&self, args: &ConnectionArgs) -> NocoMcpResult<Connection> {
        let base_id = args.base_id.clone().or_else(|| self.base_id.clone());
        Ok(Connection::new(Box::new(self.mock.clone()), base_id))
    }
}
