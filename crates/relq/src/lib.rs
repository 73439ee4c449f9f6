//! # relq
//!
//! A fluent, dialect-aware SQL query builder and execution layer for
//! Postgres, MySQL, MariaDB and SQLite.
//!
//! ## Features
//!
//! - **Chainable statement assembly**: SELECT/INSERT/UPDATE/DELETE built
//!   from composable calls, rendered deterministically per dialect
//! - **Strict parameter separation**: every literal travels through an
//!   ordered parameter ledger; SQL text never embeds values
//! - **One API, four dialects**: conflict handling, generated ids,
//!   locking, truncation, JSON and full-text predicates resolved by a
//!   per-driver lookup table
//! - **Safe defaults**: WHERE-less UPDATE/DELETE must be confirmed with
//!   `allow_full_table(true)`; existence checks never inspect an empty
//!   predicate list
//! - **Abstract execution**: the builder borrows any
//!   [`GenericClient`] for one call; drivers and pooling live outside
//!
//! ## Quick start
//!
//! ```ignore
//! use relq::{Db, Record};
//!
//! let db = Db::new(client);
//!
//! let admins = db
//!     .table("users")
//!     .where_eq("role", "admin")
//!     .order_by_desc("created_at")
//!     .get(&db)
//!     .await?;
//!
//! let id = db
//!     .table("users")
//!     .insert_get_id(&db, Record::new().set("name", "alice"))
//!     .await?;
//! ```

pub mod client;
pub mod dialect;
pub mod error;
pub mod qb;
pub mod row;
pub mod value;

pub use client::{Db, GenericClient};
pub use dialect::{DatePart, Dialect, LockMode};
pub use error::{QueryError, QueryResult};
pub use qb::{Builder, ChunkControl, Expr, ExprGroup, ParamList, table};
pub use row::{FromValue, Row};
pub use value::{Record, Value};
