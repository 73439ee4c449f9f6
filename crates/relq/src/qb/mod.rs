//! Fluent query builder core.
//!
//! A [`Builder`] accumulates clause state through chained calls and
//! renders one parameterized statement per terminal operation. The same
//! builder drives reads (`get`, `first`, aggregates, chunked iteration)
//! and writes (`insert`, `update`, `delete`, ...), always against the
//! dialect it was created with.
//!
//! # Usage
//!
//! ```ignore
//! use relq::{Dialect, Record, qb};
//!
//! // SELECT
//! let active = qb::table("users", Dialect::Postgres)
//!     .where_eq("status", "active")
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .get(&client)
//!     .await?;
//!
//! // INSERT
//! qb::table("users", Dialect::Postgres)
//!     .insert(&client, Record::new().set("name", "alice"))
//!     .await?;
//!
//! // UPDATE
//! qb::table("users", Dialect::Postgres)
//!     .where_eq("id", user_id)
//!     .update(&client, Record::new().set("status", "inactive"))
//!     .await?;
//! ```

mod builder;
mod chunk;
mod expr;
mod param;
mod read;
mod where_clause;
mod write;

pub use builder::Builder;
pub use chunk::ChunkControl;
pub use expr::{Expr, ExprGroup};
pub use param::ParamList;

use crate::value::Value;

/// Create a builder scoped to `table` for the given dialect.
///
/// When an execution context is at hand, prefer
/// [`Db::table`](crate::Db::table), which picks the dialect up from its
/// client.
pub fn table(name: &str, dialect: crate::dialect::Dialect) -> Builder {
    Builder::new(name, dialect)
}

/// Emit the statement about to be executed, before the round-trip, so
/// failed executions still leave a trace.
pub(crate) fn trace_sql(op: &'static str, sql: &str, params: &[Value]) {
    tracing::debug!(target: "relq::sql", %op, %sql, params = params.len(), "executing");
}

#[cfg(test)]
mod tests;
