//! The per-query builder: clause state and statement rendering.

use crate::dialect::{Dialect, LockMode};
use crate::error::{QueryError, QueryResult};
use crate::qb::expr::ExprGroup;
use crate::qb::param::{ParamList, bind_markers};
use crate::value::Value;

/// One projection entry in the SELECT list.
#[derive(Clone, Debug)]
pub(crate) enum SelectItem {
    /// A plain column or expression fragment.
    Column(String),
    /// A raw fragment with `?` markers and forwarded bindings.
    Raw { sql: String, bindings: Vec<Value> },
}

/// A fluent, single-owner query builder scoped to one table and one
/// dialect.
///
/// Chained calls mutate clause state only; nothing executes until a
/// terminal call (`get`, `first`, `insert`, `update`, ...) renders the
/// statement and hands it to a [`GenericClient`](crate::GenericClient).
/// Builders are plain data: cloning one forks the accumulated state,
/// which is how sub-queries and chunked iteration stay isolated.
///
/// A builder must not be shared across concurrent tasks; create one per
/// logical query.
#[derive(Clone, Debug)]
pub struct Builder {
    pub(crate) dialect: Dialect,
    pub(crate) table: String,
    pub(crate) distinct: bool,
    pub(crate) select_items: Vec<SelectItem>,
    pub(crate) join_clauses: Vec<String>,
    pub(crate) wheres: ExprGroup,
    pub(crate) group_by: Vec<String>,
    pub(crate) havings: ExprGroup,
    pub(crate) order_clauses: Vec<String>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
    pub(crate) lock_mode: Option<LockMode>,
    pub(crate) allow_full_table: bool,
    pub(crate) build_error: Option<QueryError>,
}

impl Builder {
    /// Create a builder for `table` speaking `dialect`.
    pub fn new(table: &str, dialect: Dialect) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            distinct: false,
            select_items: Vec::new(),
            join_clauses: Vec::new(),
            wheres: ExprGroup::new(),
            group_by: Vec::new(),
            havings: ExprGroup::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            lock_mode: None,
            allow_full_table: false,
            build_error: None,
        }
    }

    /// The dialect this builder renders for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The base table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Retarget the FROM table. Intended for sub-queries, which start on
    /// their parent's table.
    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Record the first usage error raised by a chained call; rendering
    /// and every terminal operation will report it before executing.
    pub(crate) fn record_error(&mut self, err: QueryError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    /// Fail fast on a previously recorded usage error.
    pub(crate) fn ensure_valid(&self) -> QueryResult<()> {
        match &self.build_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ==================== SELECT list ====================

    /// Replace the SELECT list.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select_items = columns
            .iter()
            .map(|c| SelectItem::Column(c.to_string()))
            .collect();
        self
    }

    /// Append SELECT columns.
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        self.select_items
            .extend(columns.iter().map(|c| SelectItem::Column(c.to_string())));
        self
    }

    /// Append a raw SELECT fragment with `?` markers; bindings are
    /// forwarded as parameters.
    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.select_items.push(SelectItem::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Mark the projection DISTINCT. Idempotent.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== JOINs ====================

    /// Add INNER JOIN.
    pub fn join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses.push(format!("INNER JOIN {table} ON {on}"));
        self
    }

    /// Add LEFT JOIN.
    pub fn left_join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses.push(format!("LEFT JOIN {table} ON {on}"));
        self
    }

    /// Add RIGHT JOIN.
    pub fn right_join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses.push(format!("RIGHT JOIN {table} ON {on}"));
        self
    }

    /// Add FULL OUTER JOIN.
    pub fn full_join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses
            .push(format!("FULL OUTER JOIN {table} ON {on}"));
        self
    }

    /// Add CROSS JOIN.
    pub fn cross_join(mut self, table: &str) -> Self {
        self.join_clauses.push(format!("CROSS JOIN {table}"));
        self
    }

    // ==================== Grouping & ordering ====================

    /// Append GROUP BY columns.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Append a raw ORDER BY clause.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_clauses.push(clause.to_string());
        self
    }

    /// Append ORDER BY column ASC.
    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order_clauses.push(format!("{column} ASC"));
        self
    }

    /// Append ORDER BY column DESC.
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_clauses.push(format!("{column} DESC"));
        self
    }

    /// Order by newest `created_at` first.
    pub fn latest(self) -> Self {
        self.order_by_desc("created_at")
    }

    /// Order by oldest `created_at` first.
    pub fn oldest(self) -> Self {
        self.order_by_asc("created_at")
    }

    /// Drop all accumulated ordering.
    pub fn reorder(mut self) -> Self {
        self.order_clauses.clear();
        self
    }

    /// Order randomly using the dialect's random function.
    pub fn in_random_order(mut self) -> Self {
        self.order_clauses
            .push(self.dialect.random_function().to_string());
        self
    }

    // ==================== Pagination & locking ====================

    /// Set LIMIT. Negative values are a usage error.
    pub fn limit(mut self, n: i64) -> Self {
        if n < 0 {
            self.record_error(QueryError::validation(format!("negative LIMIT: {n}")));
        } else {
            self.limit = Some(n);
        }
        self
    }

    /// Alias for [`Builder::limit`].
    pub fn take(self, n: i64) -> Self {
        self.limit(n)
    }

    /// Set OFFSET. Negative values are a usage error.
    pub fn offset(mut self, n: i64) -> Self {
        if n < 0 {
            self.record_error(QueryError::validation(format!("negative OFFSET: {n}")));
        } else {
            self.offset = Some(n);
        }
        self
    }

    /// Alias for [`Builder::offset`].
    pub fn skip(self, n: i64) -> Self {
        self.offset(n)
    }

    /// Lock matched rows for update.
    pub fn lock_for_update(mut self) -> Self {
        self.lock_mode = Some(LockMode::Update);
        self
    }

    /// Take a shared lock on matched rows.
    pub fn shared_lock(mut self) -> Self {
        self.lock_mode = Some(LockMode::Share);
        self
    }

    /// Permit `update`/`delete`/`increment` without any WHERE predicate.
    /// Off by default; a WHERE-less mutation is otherwise rejected.
    pub fn allow_full_table(mut self, allow: bool) -> Self {
        self.allow_full_table = allow;
        self
    }

    // ==================== Rendering ====================

    /// Render the SELECT statement into a shared ledger, emitting
    /// canonical `$n` placeholders. Sub-queries call this with their
    /// parent's ledger so binding order follows textual order.
    pub(crate) fn render_select_into(&self, params: &mut ParamList) -> QueryResult<String> {
        self.ensure_valid()?;

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.select_items.is_empty() {
            sql.push('*');
        } else {
            let mut parts = Vec::with_capacity(self.select_items.len());
            for item in &self.select_items {
                match item {
                    SelectItem::Column(c) => parts.push(c.clone()),
                    SelectItem::Raw { sql, bindings } => {
                        parts.push(bind_markers(sql, bindings, params));
                    }
                }
            }
            sql.push_str(&parts.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.join_clauses {
            sql.push(' ');
            sql.push_str(join);
        }

        let where_sql = self.wheres.build_into(self.dialect, params)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        let having_sql = self.havings.build_into(self.dialect, params)?;
        if !having_sql.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having_sql);
        }

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if let Some(mode) = self.lock_mode {
            sql.push(' ');
            sql.push_str(self.dialect.lock_clause(mode)?);
        }

        Ok(sql)
    }

    /// Render the SELECT statement and its ordered parameter list in the
    /// dialect's wire form. Pure: rendering twice yields identical
    /// output.
    pub fn render(&self) -> QueryResult<(String, Vec<Value>)> {
        let mut params = ParamList::new();
        let sql = self.render_select_into(&mut params)?;
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    /// The rendered SELECT SQL, for inspection.
    pub fn to_sql(&self) -> QueryResult<String> {
        Ok(self.render()?.0)
    }

    /// Log the rendered statement and its bindings at debug level,
    /// returning the builder for further chaining.
    pub fn dump(self) -> Self {
        match self.render() {
            Ok((sql, params)) => {
                let bindings =
                    serde_json::to_string(&params).unwrap_or_else(|_| format!("{params:?}"));
                tracing::debug!(target: "relq::sql", sql = %sql, %bindings, "query dump");
            }
            Err(err) => {
                tracing::debug!(target: "relq::sql", error = %err, "query dump failed");
            }
        }
        self
    }
}
