//! Daemon reply shapes.
//!
//! The daemon answers every query with a JSON object whose fields vary with the
//! kind of statement: row-returning queries fill `results` (or `result`), the
//! `\dc` meta-command fills `databases`, and failures carry `message` or `error`.
//! [`QueryResponse`] mirrors that wire shape field for field; [`DaemonReply`] is
//! the discriminated form every consumer dispatches on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shown when a reply matches none of the known shapes.
pub const UNRECOGNISED_REPLY: &str = "unrecognised response from daemon";

/// Raw daemon response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub databases: Option<Vec<DatabaseDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One database and the tables it contains, as listed by `\dc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<String>,
}

/// A single entry of a tabular result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    /// Column name to value, in the daemon's column order.
    Record(Map<String, Value>),
    /// Pre-formatted text, e.g. a table name from `\dt`.
    Text(String),
    Scalar(Value),
}

impl Row {
    /// Column names of a record row, in order. Empty for text rows.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Row::Record(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn cell(&self, column: &str) -> Option<&Value> {
        match self {
            Row::Record(map) => map.get(column),
            _ => None,
        }
    }

    /// The row reduced to a single label: the text itself, or a record's first column.
    pub fn label(&self) -> Option<String> {
        match self {
            Row::Record(map) => map.values().next().map(display_value),
            Row::Text(text) => Some(text.clone()),
            Row::Scalar(Value::Null) => None,
            Row::Scalar(value) => Some(display_value(value)),
        }
    }
}

/// Text shown for a cell: strings verbatim, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A daemon response after discrimination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DaemonReply {
    Tabular(Vec<Row>),
    Listing(Vec<DatabaseDescriptor>),
    Failure(String),
}

impl DaemonReply {
    /// Discriminate an arbitrary JSON body. Never fails: bodies that do not
    /// decode fall back to whatever `message`/`error` text they carry.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<QueryResponse>(value.clone()) {
            Ok(response) => response.into(),
            Err(_) => {
                let text = ["message", "error"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(Value::as_str));
                DaemonReply::Failure(text.unwrap_or(UNRECOGNISED_REPLY).to_string())
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DaemonReply::Failure(_))
    }

    /// Turn a `Failure` into [`ConsoleError::Daemon`].
    pub fn into_result(self) -> crate::Result<Self> {
        match self {
            DaemonReply::Failure(message) => Err(crate::ConsoleError::Daemon(message)),
            other => Ok(other),
        }
    }
}

impl From<QueryResponse> for DaemonReply {
    fn from(response: QueryResponse) -> Self {
        let failed = response.status.as_deref() == Some("error") || response.error.is_some();
        if failed {
            let message = response
                .error
                .or(response.message)
                .unwrap_or_else(|| "query failed".to_string());
            return DaemonReply::Failure(message);
        }
        if let Some(databases) = response.databases {
            return DaemonReply::Listing(databases);
        }
        if let Some(rows) = response.results.or(response.result) {
            return DaemonReply::Tabular(rows);
        }
        match response.status.as_deref() {
            Some("success") => DaemonReply::Tabular(Vec::new()),
            _ => DaemonReply::Failure(
                response.message.unwrap_or_else(|| UNRECOGNISED_REPLY.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_error_status_wins_over_rows() {
        let reply = DaemonReply::from_value(json!({
            "status": "error",
            "message": "table missing_table does not exist",
            "results": [{"id": 1}]
        }));
        assert_eq!(reply, DaemonReply::Failure("table missing_table does not exist".into()));
    }

    #[test]
    fn test_error_field_preferred_over_message() {
        let reply = DaemonReply::from_value(json!({"error": "bad syntax", "message": "ignored"}));
        assert_eq!(reply, DaemonReply::Failure("bad syntax".into()));
    }

    #[test]
    fn test_databases_become_listing() {
        let reply = DaemonReply::from_value(json!({
            "status": "success",
            "databases": [{"name": "shop", "tables": []}, {"name": "hr", "tables": ["staff"]}]
        }));
        assert_eq!(
            reply,
            DaemonReply::Listing(vec![
                DatabaseDescriptor { name: "shop".into(), tables: vec![] },
                DatabaseDescriptor { name: "hr".into(), tables: vec!["staff".into()] },
            ])
        );
    }

    #[test]
    fn test_results_and_result_are_both_tabular() {
        let rows = DaemonReply::from_value(json!({"status": "success", "results": [{"a": 1}]}));
        assert!(matches!(rows, DaemonReply::Tabular(ref r) if r.len() == 1));

        let text = DaemonReply::from_value(json!({"status": "success", "result": ["users", "orders"]}));
        assert_eq!(
            text,
            DaemonReply::Tabular(vec![Row::Text("users".into()), Row::Text("orders".into())])
        );
    }

    #[test]
    fn test_bare_success_is_empty_table() {
        assert_eq!(
            DaemonReply::from_value(json!({"status": "success"})),
            DaemonReply::Tabular(vec![])
        );
    }

    #[test]
    fn test_unknown_shapes_fall_back_to_notice() {
        assert_eq!(
            DaemonReply::from_value(json!({"hello": "world"})),
            DaemonReply::Failure(UNRECOGNISED_REPLY.into())
        );
        assert_eq!(
            DaemonReply::from_value(json!({"databases": 3, "message": "odd"})),
            DaemonReply::Failure("odd".into())
        );
        assert_eq!(
            DaemonReply::from_value(json!([1, 2, 3])),
            DaemonReply::Failure(UNRECOGNISED_REPLY.into())
        );
    }

    #[test]
    fn test_record_columns_keep_daemon_order() {
        let reply = DaemonReply::from_value(json!({
            "status": "success",
            "results": [{"zeta": 1, "alpha": "x", "mid": null}]
        }));
        let DaemonReply::Tabular(rows) = reply else { panic!("expected tabular") };
        assert_eq!(rows[0].columns(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(rows[0].label().as_deref(), Some("1"));
    }

    #[test]
    fn test_failure_into_result() {
        let err = DaemonReply::Failure("nope".into()).into_result().unwrap_err();
        assert!(matches!(err, crate::ConsoleError::Daemon(ref m) if m == "nope"));
        assert!(!err.is_transport());
    }
}
