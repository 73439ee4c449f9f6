//! Abstract execution capability consumed by the builder.
//!
//! The builder never owns a connection. A terminal call borrows an
//! implementation of [`GenericClient`] for exactly one round-trip and
//! releases it when the call returns, so resource acquisition and
//! release stay with the driver layer. Implementations exist outside
//! this crate, one per physical driver; tests use a scripted client.

use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::row::Row;
use crate::value::Value;

/// A connection-like resource that can execute parameterized SQL.
///
/// One implementation per driver. `query` returns rows, `execute`
/// returns the affected-row count; driver failures are reported as
/// [`QueryError::Connection`] or [`QueryError::Execution`] and are
/// propagated unchanged by the builder, which never retries.
pub trait GenericClient: Send + Sync {
    /// The SQL dialect this client speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Execute a query and return the first row.
    ///
    /// Returns [`QueryError::NotFound`] if no rows are returned.
    fn query_one(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Row>> + Send {
        async move {
            self.query_opt(sql, params)
                .await?
                .ok_or_else(|| QueryError::not_found("Expected one row, got none"))
        }
    }

    /// Execute a query and return the first column of the first row.
    fn query_scalar(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Option<Value>>> + Send {
        async move {
            Ok(self
                .query_opt(sql, params)
                .await?
                .and_then(|row| row.into_values().into_iter().next()))
        }
    }
}

impl<C: GenericClient> GenericClient for &C {
    fn dialect(&self) -> Dialect {
        (*self).dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Vec<Row>>> + Send {
        (*self).query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send {
        (*self).execute(sql, params)
    }
}

/// An execution context owning a client and handing out builders scoped
/// to its dialect.
///
/// This is the explicit-injection replacement for a process-wide
/// manager: construct one `Db` per logical database and pass it where
/// queries are made.
///
/// ```ignore
/// let db = Db::new(client);
/// let users = db.table("users").where_eq("status", "active").get(&db).await?;
/// ```
pub struct Db<C> {
    client: C,
}

impl<C: GenericClient> Db<C> {
    /// Wrap a client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Create a builder scoped to one table and this context's dialect.
    pub fn table(&self, name: &str) -> crate::qb::Builder {
        crate::qb::Builder::new(name, self.client.dialect())
    }

    /// Access the wrapped client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Unwrap the client.
    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: GenericClient> GenericClient for Db<C> {
    fn dialect(&self) -> Dialect {
        self.client.dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Vec<Row>>> + Send {
        self.client.query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send {
        self.client.execute(sql, params)
    }
}
