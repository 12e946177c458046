//! Values handed back by successful runner invocations.

use crate::error::DbFailure;
use serde::{Deserialize, Serialize};

/// A SQL scalar, used both for bind parameters and for result columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// One result row: column names and values, in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbRow {
    columns: Vec<(String, SqlValue)>,
}

impl DbRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Look up a column by name. The first match wins on duplicate names.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate over `(name, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rows returned by a [`crate::DbQuery`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbRows(pub Vec<DbRow>);

impl DbRows {
    /// No rows.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first row, if any.
    pub fn first(&self) -> Option<&DbRow> {
        self.0.first()
    }

    /// Result of a `QueryMode::One` query: zero rows is
    /// [`DbFailure::NotFound`], more than one is [`DbFailure::Unknown`].
    pub fn exactly_one(rows: Vec<DbRow>) -> Result<Self, DbFailure> {
        match rows.len() {
            0 => Err(DbFailure::NotFound),
            1 => Ok(Self(rows)),
            n => Err(DbFailure::Unknown(format!("expected one row, got {n}"))),
        }
    }
}

/// Response from an HTTP exchange. Any status code is a successful
/// exchange; interpreting 4xx/5xx is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers, in received order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Raw body.
    #[serde(default)]
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The closed union of every kind's success value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EffectOutput {
    /// From a DB query.
    DbRows(DbRows),
    /// From an HTTP exchange.
    Http(HttpResponse),
    /// From a KV get; `None` when the key is absent.
    KvValue(Option<serde_json::Value>),
    /// From a KV set.
    KvStored,
    /// From a clock read.
    NowMs(u64),
    /// From a random draw.
    Bytes(Vec<u8>),
    /// From a log emission.
    Logged,
}

impl EffectOutput {
    /// Take the DB rows, if this is a DB output.
    pub fn into_db_rows(self) -> Option<DbRows> {
        match self {
            EffectOutput::DbRows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Take the HTTP response, if this is an HTTP output.
    pub fn into_http_response(self) -> Option<HttpResponse> {
        match self {
            EffectOutput::Http(resp) => Some(resp),
            _ => None,
        }
    }

    /// Take the looked-up value, if this is a KV get output.
    pub fn into_kv_value(self) -> Option<Option<serde_json::Value>> {
        match self {
            EffectOutput::KvValue(v) => Some(v),
            _ => None,
        }
    }

    /// The clock reading, if this is a clock output.
    pub fn as_now_ms(&self) -> Option<u64> {
        match self {
            EffectOutput::NowMs(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Take the random bytes, if this is a random output.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            EffectOutput::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_rejects_zero_and_many() {
        assert_eq!(DbRows::exactly_one(vec![]), Err(DbFailure::NotFound));
        let one = DbRows::exactly_one(vec![DbRow::new().with("id", 1i64)]).unwrap();
        assert_eq!(one.len(), 1);
        let many = vec![DbRow::new(), DbRow::new(), DbRow::new()];
        assert_eq!(
            DbRows::exactly_one(many),
            Err(DbFailure::Unknown("expected one row, got 3".into()))
        );
    }

    #[test]
    fn row_lookup_by_name() {
        let row = DbRow::new().with("id", 7i64).with("name", "ada");
        assert_eq!(row.get("id"), Some(&SqlValue::Integer(7)));
        assert_eq!(row.get("name"), Some(&SqlValue::Text("ada".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn none_maps_to_null() {
        let v: SqlValue = Option::<i64>::None.into();
        assert_eq!(v, SqlValue::Null);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let resp = HttpResponse {
            status: 204,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: vec![],
        };
        assert!(resp.is_success());
        assert_eq!(resp.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn accessors_reject_other_kinds() {
        assert_eq!(EffectOutput::Logged.into_db_rows(), None);
        assert_eq!(EffectOutput::NowMs(5).as_now_ms(), Some(5));
        assert_eq!(EffectOutput::KvStored.as_now_ms(), None);
    }
}
