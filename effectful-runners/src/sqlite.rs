//! SQLite runner backed by an `sqlx` pool.

use async_trait::async_trait;
use effect0::{DbFailure, DbQuery, DbRow, DbRows, DbRunner, QueryMode, SqlValue};
use sqlx::error::ErrorKind;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Database, Row, TypeInfo, ValueRef};

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;

/// A [`DbRunner`] executing statements on a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url` (e.g. `sqlite://app.db?mode=rwc` or
    /// `sqlite::memory:`).
    pub async fn connect(url: &str) -> Result<Self, DbFailure> {
        let pool = SqlitePoolOptions::new()
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// The underlying pool, for migrations and teardown.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DbRunner for SqliteDb {
    async fn query(&self, query: DbQuery) -> Result<DbRows, DbFailure> {
        query.check()?;
        let mut q = sqlx::query(&query.sql);
        for param in &query.params {
            q = bind(q, param);
        }

        match query.mode {
            QueryMode::One => {
                let rows = q.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
                let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
                DbRows::exactly_one(rows)
            }
            QueryMode::Many => {
                let rows = q.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
                rows.iter()
                    .map(decode_row)
                    .collect::<Result<Vec<_>, _>>()
                    .map(DbRows)
            }
            QueryMode::Execute => {
                let done = q.execute(&self.pool).await.map_err(map_sqlx_error)?;
                tracing::trace!(rows_affected = done.rows_affected(), "effectful.db.execute");
                Ok(DbRows::empty())
            }
        }
    }
}

fn bind<'q>(q: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => q.bind(None::<i64>),
        SqlValue::Bool(b) => q.bind(*b),
        SqlValue::Integer(i) => q.bind(*i),
        SqlValue::Real(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Blob(b) => q.bind(b.clone()),
    }
}

/// Decode by the value's storage class, not the declared column type.
fn decode_row(row: &SqliteRow) -> Result<DbRow, DbFailure> {
    let mut out = DbRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx).map_err(map_sqlx_error)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let class = raw.type_info().name().to_string();
            match class.as_str() {
                "INTEGER" => SqlValue::Integer(row.try_get_unchecked(idx).map_err(map_sqlx_error)?),
                "REAL" => SqlValue::Real(row.try_get_unchecked(idx).map_err(map_sqlx_error)?),
                "BLOB" => SqlValue::Blob(row.try_get_unchecked(idx).map_err(map_sqlx_error)?),
                _ => SqlValue::Text(row.try_get_unchecked(idx).map_err(map_sqlx_error)?),
            }
        };
        out.push(column.name(), value);
    }
    Ok(out)
}

fn map_sqlx_error(err: sqlx::Error) -> DbFailure {
    match &err {
        sqlx::Error::RowNotFound => DbFailure::NotFound,
        sqlx::Error::Database(db) => {
            if db.code().as_deref().is_some_and(is_busy_or_locked) {
                return DbFailure::Conflict;
            }
            match db.kind() {
                ErrorKind::UniqueViolation => DbFailure::Conflict,
                ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => DbFailure::Constraint(db.message().to_string()),
                _ => DbFailure::Unknown(db.message().to_string()),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => DbFailure::Connection(err.to_string()),
        _ => DbFailure::Unknown(err.to_string()),
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including their extended codes
/// such as SQLITE_BUSY_SNAPSHOT (517): another writer holds the database.
fn is_busy_or_locked(code: &str) -> bool {
    code.parse::<i64>()
        .is_ok_and(|code| matches!(code & 0xff, 5 | 6))
}
