//! Builder for NocoDB `where` expressions
//!
//! A single comparison renders as `(field,op,value)`; several are combined
//! with `and(...)` or `or(...)`. String values are single-quoted with
//! embedded quotes doubled, numbers are left bare.

use crate::error::{NocoMcpError, NocoMcpResult};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operators understood by NocoDB filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Nin,
    /// Expands to `gte` and `lte` on the same field
    Between,
}

impl FilterOp {
    pub const ALL: [FilterOp; 10] = [
        FilterOp::Eq,
        FilterOp::Neq,
        FilterOp::Gt,
        FilterOp::Gte,
        FilterOp::Lt,
        FilterOp::Lte,
        FilterOp::Like,
        FilterOp::In,
        FilterOp::Nin,
        FilterOp::Between,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::In => "in",
            FilterOp::Nin => "nin",
            FilterOp::Between => "between",
        }
    }

    /// Parse an operator name, accepting only the given set
    pub fn parse_within(op: &str, allowed: &[FilterOp]) -> NocoMcpResult<Self> {
        let wanted = op.trim().to_lowercase();
        allowed
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == wanted)
            .ok_or_else(|| {
                let mut names: Vec<&str> = allowed.iter().map(FilterOp::as_str).collect();
                names.sort_unstable();
                NocoMcpError::invalid_filter(format!(
                    "Unsupported op '{}'. Allowed: [{}]",
                    op,
                    names.join(", ")
                ))
            })
    }
}

impl FromStr for FilterOp {
    type Err = NocoMcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_within(s, &Self::ALL)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How multiple conditions are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl FromStr for Logic {
    type Err = NocoMcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(Logic::And),
            "or" => Ok(Logic::Or),
            _ => Err(NocoMcpError::invalid_filter("logic must be 'and' or 'or'")),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::And => f.write_str("and"),
            Logic::Or => f.write_str("or"),
        }
    }
}

/// One `field op value` comparison as sent by MCP clients
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Condition {
    #[serde(default)]
    pub field: String,
    #[serde(default = "default_op")]
    pub op: String,
    #[serde(default)]
    pub value: Value,
}

fn default_op() -> String {
    "eq".to_string()
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_list_item(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        other => quote(&text_of(other)),
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => quote(&text_of(other)),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// Numeric-looking bounds stay bare so dates and numbers both work.
fn format_between_bound(value: &Value) -> String {
    let numeric = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };
    match numeric {
        Some(n) => format_number(n),
        None => quote(&text_of(value)),
    }
}

/// Render the value part of a comparison for the given operator
pub fn format_value(value: &Value, op: FilterOp) -> NocoMcpResult<String> {
    match op {
        FilterOp::In | FilterOp::Nin => {
            if value.is_null() {
                return Ok("null".to_string());
            }
            let items = match value {
                Value::Array(items) => items.iter().map(format_list_item).collect::<Vec<_>>(),
                scalar => vec![format_list_item(scalar)],
            };
            Ok(format!("({})", items.join(",")))
        }
        FilterOp::Between => Err(NocoMcpError::invalid_filter(
            "Operator 'between' is rendered as a range, not a single value",
        )),
        _ => Ok(format_scalar(value)),
    }
}

/// Render a single parsed comparison
pub fn render_condition(field: &str, op: FilterOp, value: &Value) -> NocoMcpResult<String> {
    if op == FilterOp::Between {
        let bounds = match value {
            Value::Array(items) if items.len() == 2 => items,
            _ => {
                return Err(NocoMcpError::invalid_filter(
                    "Operator 'between' requires a two-element list/tuple: [min, max]",
                ))
            }
        };
        return Ok(format!(
            "and(({field},gte,{}),({field},lte,{}))",
            format_between_bound(&bounds[0]),
            format_between_bound(&bounds[1]),
        ));
    }
    Ok(format!("({},{},{})", field, op, format_value(value, op)?))
}

/// Render `(field,op,value)`; the operator name is case-insensitive
pub fn make_condition(field: &str, op: &str, value: &Value) -> NocoMcpResult<String> {
    let op: FilterOp = op.parse()?;
    render_condition(field, op, value)
}

/// Combine conditions into a single `where` expression
pub fn build_where(conditions: &[Condition], logic: &str) -> NocoMcpResult<String> {
    if conditions.is_empty() {
        return Err(NocoMcpError::invalid_filter(
            "At least one condition is required",
        ));
    }
    let logic: Logic = logic.parse()?;

    let parts = conditions
        .iter()
        .map(|c| {
            if c.field.is_empty() {
                return Err(NocoMcpError::invalid_filter(
                    "Each condition must include 'field'",
                ));
            }
            make_condition(&c.field, &c.op, &c.value)
        })
        .collect::<NocoMcpResult<Vec<_>>>()?;

    if parts.len() == 1 {
        return Ok(parts.into_iter().next().unwrap_or_default());
    }
    Ok(format!("{}({})", logic, parts.join(",")))
}
