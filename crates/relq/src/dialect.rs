//! Per-driver SQL lookup table.
//!
//! Everything that differs between the supported engines lives here:
//! placeholder style, conflict handling, generated-id retrieval, row
//! locking, truncation, and the JSON / temporal / full-text expression
//! templates used by the predicate layer. The rest of the crate renders
//! against one canonical shape (`$n` placeholders) and asks this module
//! to translate.

use crate::error::{QueryError, QueryResult};

/// The SQL engine variant a builder is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    MariaDb,
    Sqlite,
}

/// Row-locking strength for SELECT statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// `FOR SHARE` / `LOCK IN SHARE MODE`
    Share,
    /// `FOR UPDATE`
    Update,
}

/// Temporal component extracted by the `where_date`-family predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Month,
    Day,
    Year,
    Time,
}

impl Dialect {
    /// Driver name as it appears in connection configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Postgres => "pgsql",
            Dialect::MySql => "mysql",
            Dialect::MariaDb => "mariadb",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Rewrite canonical `$n` placeholders into the engine's wire form.
    ///
    /// Postgres binds by index and keeps `$n`; the other engines bind
    /// positionally with `?`. The ledger guarantees `$n` appears in
    /// increasing order, so a plain scan is enough.
    pub(crate) fn finalize_placeholders(self, sql: &str) -> String {
        if self == Dialect::Postgres {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len());
        let mut chars = sql.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '$' && chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
                out.push('?');
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Whether `INSERT ... RETURNING col` can fetch a generated id.
    pub(crate) fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::MariaDb)
    }

    /// Follow-up query retrieving the last generated id, for engines
    /// without RETURNING.
    pub(crate) fn last_insert_id_sql(self) -> Option<&'static str> {
        match self {
            Dialect::Postgres | Dialect::MariaDb => None,
            Dialect::MySql => Some("SELECT LAST_INSERT_ID()"),
            Dialect::Sqlite => Some("SELECT last_insert_rowid()"),
        }
    }

    /// INSERT verb and statement suffix for conflict-ignoring inserts.
    pub(crate) fn insert_ignore(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Postgres => ("INSERT INTO", " ON CONFLICT DO NOTHING"),
            Dialect::MySql | Dialect::MariaDb => ("INSERT IGNORE INTO", ""),
            Dialect::Sqlite => ("INSERT OR IGNORE INTO", ""),
        }
    }

    /// Whether the engine has a native upsert clause.
    pub(crate) fn supports_upsert(self) -> bool {
        true
    }

    /// Reference to the incoming (conflicting) row's value for `column`
    /// inside an upsert update list.
    pub(crate) fn upsert_value_reference(self, column: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => format!("excluded.{column}"),
            Dialect::MySql | Dialect::MariaDb => format!("VALUES({column})"),
        }
    }

    /// Upsert clause head. `ON DUPLICATE KEY UPDATE` cannot name its
    /// conflict target, so `unique_by` is only emitted where the engine
    /// takes one.
    pub(crate) fn upsert_clause(self, unique_by: &[&str]) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!(" ON CONFLICT ({}) DO UPDATE SET ", unique_by.join(", "))
            }
            Dialect::MySql | Dialect::MariaDb => " ON DUPLICATE KEY UPDATE ".to_string(),
        }
    }

    /// Table truncation statement. SQLite has no TRUNCATE; DELETE is the
    /// engine's documented equivalent.
    pub(crate) fn truncate_sql(self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("TRUNCATE TABLE {table} CASCADE"),
            Dialect::MySql | Dialect::MariaDb => format!("TRUNCATE TABLE {table}"),
            Dialect::Sqlite => format!("DELETE FROM {table}"),
        }
    }

    /// Locking suffix for a SELECT, or an error where the engine has no
    /// row locks.
    pub(crate) fn lock_clause(self, mode: LockMode) -> QueryResult<&'static str> {
        match (self, mode) {
            (Dialect::Sqlite, _) => Err(QueryError::unsupported(self, "row locking")),
            (_, LockMode::Update) => Ok("FOR UPDATE"),
            (Dialect::MariaDb, LockMode::Share) => Ok("LOCK IN SHARE MODE"),
            (_, LockMode::Share) => Ok("FOR SHARE"),
        }
    }

    /// Random-ordering function for `in_random_order`.
    pub(crate) fn random_function(self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::MariaDb => "RAND()",
            _ => "RANDOM()",
        }
    }

    /// Text extraction of a JSON path, comparable against a bound value.
    pub(crate) fn json_path_expr(self, column: &str, path: &str) -> String {
        match self {
            Dialect::Postgres => format!("{column}->>'{path}'"),
            Dialect::MySql | Dialect::MariaDb => format!("{column}->>'$.{path}'"),
            Dialect::Sqlite => format!("json_extract({column}, '$.{path}')"),
        }
    }

    /// JSON containment test with one bound document, where supported.
    pub(crate) fn json_contains_expr(self, column: &str, placeholder: &str) -> QueryResult<String> {
        match self {
            Dialect::Postgres => Ok(format!("{column} @> {placeholder}")),
            Dialect::MySql | Dialect::MariaDb => {
                Ok(format!("JSON_CONTAINS({column}, {placeholder})"))
            }
            Dialect::Sqlite => Err(QueryError::unsupported(self, "JSON containment")),
        }
    }

    /// JSON array length wrapper.
    pub(crate) fn json_length_expr(self, column: &str) -> String {
        match self {
            Dialect::MySql | Dialect::MariaDb => format!("JSON_LENGTH({column})"),
            _ => format!("json_array_length({column})"),
        }
    }

    /// Wrap a column in the engine's extraction function for a temporal
    /// component.
    pub(crate) fn date_part_expr(self, part: DatePart, column: &str) -> String {
        match (self, part) {
            (Dialect::Sqlite, DatePart::Date) => format!("DATE({column})"),
            (Dialect::Sqlite, DatePart::Month) => {
                format!("CAST(strftime('%m', {column}) AS INTEGER)")
            }
            (Dialect::Sqlite, DatePart::Day) => {
                format!("CAST(strftime('%d', {column}) AS INTEGER)")
            }
            (Dialect::Sqlite, DatePart::Year) => {
                format!("CAST(strftime('%Y', {column}) AS INTEGER)")
            }
            (Dialect::Sqlite, DatePart::Time) => format!("strftime('%H:%M:%S', {column})"),
            (Dialect::Postgres, DatePart::Date) => format!("CAST({column} AS DATE)"),
            (Dialect::Postgres, DatePart::Time) => format!("CAST({column} AS TIME)"),
            (_, DatePart::Date) => format!("DATE({column})"),
            (_, DatePart::Time) => format!("TIME({column})"),
            (_, DatePart::Month) => format!("EXTRACT(MONTH FROM {column})"),
            (_, DatePart::Day) => format!("EXTRACT(DAY FROM {column})"),
            (_, DatePart::Year) => format!("EXTRACT(YEAR FROM {column})"),
        }
    }

    /// Full-text match expression with one bound search term.
    pub(crate) fn full_text_expr(self, column: &str, placeholder: &str) -> String {
        match self {
            Dialect::Postgres => {
                format!("to_tsvector({column}) @@ plainto_tsquery({placeholder})")
            }
            Dialect::MySql | Dialect::MariaDb => {
                format!("MATCH ({column}) AGAINST ({placeholder})")
            }
            Dialect::Sqlite => format!("{column} MATCH {placeholder}"),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
