//! Read projections: executing the rendered SELECT and mapping results.

use crate::client::GenericClient;
use crate::error::{QueryError, QueryResult};
use crate::qb::builder::Builder;
use crate::qb::param::ParamList;
use crate::qb::trace_sql;
use crate::row::{FromValue, Row};
use crate::value::{Record, Value};

impl Builder {
    /// A builder only executes against a client speaking its own
    /// dialect; a mismatch is caller misuse.
    pub(crate) fn check_client(&self, client: &impl GenericClient) -> QueryResult<()> {
        if client.dialect() != self.dialect {
            return Err(QueryError::validation(format!(
                "builder renders {} but client speaks {}",
                self.dialect,
                client.dialect()
            )));
        }
        Ok(())
    }

    /// Render a scalar query over the current FROM/JOIN/WHERE state,
    /// dropping grouping, ordering and pagination.
    fn render_scalar(&self, select_expr: &str, suffix: &str) -> QueryResult<(String, Vec<Value>)> {
        self.ensure_valid()?;
        let mut params = ParamList::new();
        let mut sql = format!("SELECT {select_expr} FROM {}", self.table);
        for join in &self.join_clauses {
            sql.push(' ');
            sql.push_str(join);
        }
        let where_sql = self.wheres.build_into(self.dialect, &mut params)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        sql.push_str(suffix);
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    /// Render a COUNT query. Grouped queries are wrapped in a derived
    /// table so the count reflects the number of groups.
    fn render_count(&self) -> QueryResult<(String, Vec<Value>)> {
        if self.group_by.is_empty() && self.havings.is_empty() {
            return self.render_scalar("COUNT(*)", "");
        }
        self.ensure_valid()?;
        let mut params = ParamList::new();
        let mut inner = format!("SELECT 1 FROM {}", self.table);
        for join in &self.join_clauses {
            inner.push(' ');
            inner.push_str(join);
        }
        let where_sql = self.wheres.build_into(self.dialect, &mut params)?;
        if !where_sql.is_empty() {
            inner.push_str(" WHERE ");
            inner.push_str(&where_sql);
        }
        if !self.group_by.is_empty() {
            inner.push_str(" GROUP BY ");
            inner.push_str(&self.group_by.join(", "));
        }
        let having_sql = self.havings.build_into(self.dialect, &mut params)?;
        if !having_sql.is_empty() {
            inner.push_str(" HAVING ");
            inner.push_str(&having_sql);
        }
        let sql = format!("SELECT COUNT(*) FROM ({inner}) AS grouped");
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    /// Execute the SELECT and return all rows.
    pub async fn get(&self, client: &impl GenericClient) -> QueryResult<Vec<Row>> {
        self.check_client(client)?;
        let (sql, params) = self.render()?;
        trace_sql("select", &sql, &params);
        client.query(&sql, &params).await
    }

    /// Execute the SELECT with an implicit `LIMIT 1` and return the
    /// first row, if any.
    pub async fn first(&self, client: &impl GenericClient) -> QueryResult<Option<Row>> {
        self.check_client(client)?;
        let (sql, params) = self.clone().limit(1).render()?;
        trace_sql("select", &sql, &params);
        client.query_opt(&sql, &params).await
    }

    /// Look up one row by its `id` column.
    pub async fn find(
        &self,
        client: &impl GenericClient,
        id: impl Into<Value>,
    ) -> QueryResult<Option<Row>> {
        self.clone().where_eq("id", id).first(client).await
    }

    /// Project a single field from the first matching row. Absence of a
    /// matching row is `None`, not an error.
    pub async fn value<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Option<T>> {
        match self.first(client).await? {
            Some(row) => row.try_get(column).map(Some),
            None => Ok(None),
        }
    }

    /// Project one column from every matching row into a flat sequence.
    pub async fn pluck<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Vec<T>> {
        let rows = self.get(client).await?;
        rows.iter().map(|row| row.try_get(column)).collect()
    }

    /// Project several columns from every matching row into a sequence
    /// of records.
    pub async fn pluck_many(
        &self,
        client: &impl GenericClient,
        columns: &[&str],
    ) -> QueryResult<Vec<Record>> {
        let rows = self.get(client).await?;
        rows.iter().map(|row| row.project(columns)).collect()
    }

    // ==================== Aggregates ====================

    async fn scalar_aggregate<T: FromValue>(
        &self,
        client: &impl GenericClient,
        select_expr: &str,
        column: &str,
    ) -> QueryResult<Option<T>> {
        self.check_client(client)?;
        let (sql, params) = self.render_scalar(select_expr, "")?;
        trace_sql("aggregate", &sql, &params);
        match client.query_scalar(&sql, &params).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(&value)
                .map(Some)
                .map_err(|message| QueryError::decode(column, message)),
        }
    }

    /// Count matching rows (groups, when grouped).
    pub async fn count(&self, client: &impl GenericClient) -> QueryResult<i64> {
        self.check_client(client)?;
        let (sql, params) = self.render_count()?;
        trace_sql("aggregate", &sql, &params);
        match client.query_scalar(&sql, &params).await? {
            Some(Value::Int(n)) => Ok(n),
            Some(other) => Err(QueryError::decode(
                "count",
                format!("expected integer, got {other:?}"),
            )),
            None => Ok(0),
        }
    }

    /// Maximum of a column over matching rows; `None` on an empty set.
    pub async fn max<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Option<T>> {
        self.scalar_aggregate(client, &format!("MAX({column})"), column)
            .await
    }

    /// Minimum of a column over matching rows; `None` on an empty set.
    pub async fn min<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Option<T>> {
        self.scalar_aggregate(client, &format!("MIN({column})"), column)
            .await
    }

    /// Average of a column over matching rows; `None` on an empty set.
    pub async fn avg<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Option<T>> {
        self.scalar_aggregate(client, &format!("AVG({column})"), column)
            .await
    }

    /// Sum of a column over matching rows; `None` on an empty set.
    pub async fn sum<T: FromValue>(
        &self,
        client: &impl GenericClient,
        column: &str,
    ) -> QueryResult<Option<T>> {
        self.scalar_aggregate(client, &format!("SUM({column})"), column)
            .await
    }

    /// Whether any row matches the current predicates. Short-circuits
    /// with `LIMIT 1`; a builder without predicates checks table
    /// non-emptiness.
    pub async fn exists(&self, client: &impl GenericClient) -> QueryResult<bool> {
        self.check_client(client)?;
        let (sql, params) = self.render_scalar("1", " LIMIT 1")?;
        trace_sql("exists", &sql, &params);
        Ok(client.query_opt(&sql, &params).await?.is_some())
    }

    /// Negation of [`Builder::exists`].
    pub async fn doesnt_exist(&self, client: &impl GenericClient) -> QueryResult<bool> {
        Ok(!self.exists(client).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;
    use crate::qb::table;

    #[test]
    fn test_count_sql_uses_where_state() {
        let qb = table("users", Dialect::Postgres).where_eq("status", "active");
        let (sql, params) = qb.render_count().unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM users WHERE status = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_count_sql_without_predicates_has_no_where() {
        let qb = table("users", Dialect::Postgres);
        let (sql, params) = qb.render_count().unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_grouped_count_wraps_in_derived_table() {
        let qb = table("orders", Dialect::Postgres)
            .group_by(&["user_id"])
            .having("COUNT(*)", ">", 5i64);
        let (sql, _) = qb.render_count().unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM \
             (SELECT 1 FROM orders GROUP BY user_id HAVING COUNT(*) > $1) AS grouped"
        );
    }

    #[test]
    fn test_exists_sql_without_predicates() {
        let qb = table("users", Dialect::Postgres);
        let (sql, params) = qb.render_scalar("1", " LIMIT 1").unwrap();
        assert_eq!(sql, "SELECT 1 FROM users LIMIT 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_exists_sql_ignores_pagination_state() {
        let qb = table("users", Dialect::Postgres)
            .where_eq("status", "active")
            .offset(40)
            .limit(20);
        let (sql, _) = qb.render_scalar("1", " LIMIT 1").unwrap();
        assert_eq!(sql, "SELECT 1 FROM users WHERE status = $1 LIMIT 1");
    }
}
