//! NocoDB access: REST client, table resolution and `where` expressions

pub mod client;
pub mod filter;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{
    resolve_table_id, ApiRequest, ApiResponse, Connection, ConnectionArgs, Connector,
    HttpConnector, NocoDbApi, NocoDbClient,
};
pub use filter::{build_where, make_condition, Condition, FilterOp, Logic};
