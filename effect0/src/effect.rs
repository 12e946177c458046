//! Effects: inert descriptions of side-effects, executed later by a runner.

use crate::error::{DbFailure, HttpFailure, KvFailure};
use crate::output::SqlValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A side-effect declared by pure code. NOT executed on construction;
/// the interpreter decides when and on which runner to execute it.
///
/// Constructing an effect never validates its parameters: an empty SQL
/// string or a malformed URL is representable. Validation happens in the
/// runner, at execution time, and surfaces as the kind's typed failure.
///
/// The variant set is closed. Dispatch is an exhaustive `match`, so a new
/// effect kind is a compile error everywhere it is not handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Run one SQL statement.
    DbQuery(DbQuery),

    /// Perform one HTTP exchange.
    HttpRequest(HttpRequest),

    /// Read a key from the key-value store.
    KvGet {
        /// The key to read.
        key: String,
    },

    /// Write a key to the key-value store.
    KvSet {
        /// The key to write.
        key: String,
        /// The value to store.
        value: serde_json::Value,
    },

    /// Read the wall clock, in milliseconds since the Unix epoch.
    NowMs,

    /// Draw `len` random bytes.
    RandomBytes {
        /// Number of bytes requested.
        len: usize,
    },

    /// Emit a log line.
    Log {
        /// Severity level.
        level: LogLevel,
        /// Log message.
        message: String,
    },
}

impl Effect {
    /// The dispatch tag of this effect.
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::DbQuery(_) => EffectKind::Db,
            Effect::HttpRequest(_) => EffectKind::Http,
            Effect::KvGet { .. } => EffectKind::KvGet,
            Effect::KvSet { .. } => EffectKind::KvSet,
            Effect::NowMs => EffectKind::Clock,
            Effect::RandomBytes { .. } => EffectKind::Random,
            Effect::Log { .. } => EffectKind::Log,
        }
    }

    /// Build a [`Effect::DbQuery`].
    pub fn query(sql: impl Into<String>, params: Vec<SqlValue>, mode: QueryMode) -> Self {
        Effect::DbQuery(DbQuery::new(sql, params, mode))
    }

    /// Build a [`Effect::HttpRequest`].
    pub fn http(request: HttpRequest) -> Self {
        Effect::HttpRequest(request)
    }

    /// Build a [`Effect::KvGet`].
    pub fn kv_get(key: impl Into<String>) -> Self {
        Effect::KvGet { key: key.into() }
    }

    /// Build a [`Effect::KvSet`].
    pub fn kv_set(key: impl Into<String>, value: serde_json::Value) -> Self {
        Effect::KvSet {
            key: key.into(),
            value,
        }
    }

    /// Build a [`Effect::NowMs`].
    pub fn now_ms() -> Self {
        Effect::NowMs
    }

    /// Build a [`Effect::RandomBytes`].
    pub fn random_bytes(len: usize) -> Self {
        Effect::RandomBytes { len }
    }

    /// Build a [`Effect::Log`].
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Effect::Log {
            level,
            message: message.into(),
        }
    }
}

/// The closed set of effect kinds. Each kind is bound to exactly one runner.
///
/// `KvGet` and `KvSet` are distinct tags served by the same KV runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// [`Effect::DbQuery`].
    Db,
    /// [`Effect::HttpRequest`].
    Http,
    /// [`Effect::KvGet`].
    KvGet,
    /// [`Effect::KvSet`].
    KvSet,
    /// [`Effect::NowMs`].
    Clock,
    /// [`Effect::RandomBytes`].
    Random,
    /// [`Effect::Log`].
    Log,
}

impl EffectKind {
    /// Every kind, in declaration order.
    pub const ALL: [EffectKind; 7] = [
        EffectKind::Db,
        EffectKind::Http,
        EffectKind::KvGet,
        EffectKind::KvSet,
        EffectKind::Clock,
        EffectKind::Random,
        EffectKind::Log,
    ];

    /// Stable lowercase name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Db => "db",
            EffectKind::Http => "http",
            EffectKind::KvGet => "kv_get",
            EffectKind::KvSet => "kv_set",
            EffectKind::Clock => "clock",
            EffectKind::Random => "random",
            EffectKind::Log => "log",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many rows a [`DbQuery`] expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Exactly one row; zero rows is [`DbFailure::NotFound`], more than
    /// one is [`DbFailure::Unknown`].
    One,
    /// Any number of rows.
    Many,
    /// A statement run for its side-effect; no rows are returned.
    Execute,
}

/// One SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbQuery {
    /// SQL text.
    pub sql: String,
    /// Positional bind parameters.
    #[serde(default)]
    pub params: Vec<SqlValue>,
    /// Expected result shape.
    pub mode: QueryMode,
}

impl DbQuery {
    /// Create a new query.
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>, mode: QueryMode) -> Self {
        Self {
            sql: sql.into(),
            params,
            mode,
        }
    }

    /// Runner-side validation, performed before any I/O.
    pub fn check(&self) -> Result<(), DbFailure> {
        if self.sql.trim().is_empty() {
            return Err(DbFailure::InvalidQuery("empty sql".into()));
        }
        Ok(())
    }
}

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// The method token as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

/// One HTTP exchange to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute `http://` or `https://` URL.
    pub url: String,
    /// Header name/value pairs, sent in order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request with no headers and no body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Shorthand for a POST request with a body.
    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Runner-side validation, performed before any I/O.
    pub fn check(&self) -> Result<(), HttpFailure> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(HttpFailure::InvalidRequest(format!(
                "unsupported url: {:?}",
                self.url
            )));
        }
        if matches!(self.method, HttpMethod::Get | HttpMethod::Head) && self.body.is_some() {
            return Err(HttpFailure::InvalidRequest(format!(
                "{} request must not carry a body",
                self.method.as_str()
            )));
        }
        Ok(())
    }
}

/// Runner-side key validation shared by KV implementations.
pub fn check_kv_key(key: &str) -> Result<(), KvFailure> {
    if key.is_empty() {
        return Err(KvFailure::InvalidKey("empty key".into()));
    }
    if key.chars().any(char::is_control) {
        return Err(KvFailure::InvalidKey(format!(
            "key contains control characters: {key:?}"
        )));
    }
    Ok(())
}

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Finest-grained tracing.
    Trace,
    /// Debug-level detail.
    Debug,
    /// Informational messages.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_covers_every_variant() {
        let effects = [
            Effect::query("SELECT 1", vec![], QueryMode::One),
            Effect::http(HttpRequest::get("http://localhost")),
            Effect::kv_get("a"),
            Effect::kv_set("a", json!(1)),
            Effect::now_ms(),
            Effect::random_bytes(4),
            Effect::log(LogLevel::Info, "hi"),
        ];
        let kinds: Vec<_> = effects.iter().map(Effect::kind).collect();
        assert_eq!(kinds, EffectKind::ALL);
    }

    #[test]
    fn empty_sql_is_constructible_but_fails_check() {
        let q = DbQuery::new("  ", vec![], QueryMode::Many);
        assert!(matches!(q.check(), Err(DbFailure::InvalidQuery(_))));
    }

    #[test]
    fn get_with_body_fails_check() {
        let req = HttpRequest::get("https://example.com").with_body("x");
        assert!(matches!(req.check(), Err(HttpFailure::InvalidRequest(_))));
    }

    #[test]
    fn non_http_url_fails_check() {
        let req = HttpRequest::get("ftp://example.com");
        assert!(matches!(req.check(), Err(HttpFailure::InvalidRequest(_))));
    }

    #[test]
    fn kv_key_rules() {
        assert!(check_kv_key("user:1").is_ok());
        assert!(check_kv_key("").is_err());
        assert!(check_kv_key("a\nb").is_err());
    }

    #[test]
    fn effect_serializes_with_type_tag() {
        let e = Effect::kv_set("k", json!({"n": 1}));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "kv_set");
        assert_eq!(v["key"], "k");

        let now = serde_json::to_value(Effect::NowMs).unwrap();
        assert_eq!(now, json!({"type": "now_ms"}));
    }

    #[test]
    fn db_query_deserializes_with_default_params() {
        let e: Effect = serde_json::from_value(json!({
            "type": "db_query",
            "sql": "SELECT 1",
            "mode": "one"
        }))
        .unwrap();
        assert_eq!(e, Effect::query("SELECT 1", vec![], QueryMode::One));
    }
}
