//! Statement verbs: the mutating terminal operations.
//!
//! Each verb renders its own SQL template, threads every value through
//! the parameter ledger (SET/VALUES sections first, then the builder's
//! WHERE state) and executes exactly one statement, except where the
//! dialect requires a follow-up query for the generated id.

use crate::client::GenericClient;
use crate::error::{QueryError, QueryResult};
use crate::qb::builder::Builder;
use crate::qb::param::ParamList;
use crate::qb::trace_sql;
use crate::value::{Record, Value};

/// Shared column-set validation for multi-row inserts: every record must
/// carry the same columns (order-independent). Returns the first
/// record's column order, which fixes the rendered column list.
fn insert_columns(records: &[Record]) -> QueryResult<Vec<String>> {
    let first = match records.first() {
        Some(first) => first,
        None => return Err(QueryError::validation("insert requires at least one row")),
    };
    if first.is_empty() {
        return Err(QueryError::validation(
            "insert requires at least one column",
        ));
    }
    let columns: Vec<String> = first.columns().map(str::to_string).collect();
    let mut reference: Vec<&str> = first.columns().collect();
    reference.sort_unstable();
    for record in &records[1..] {
        let mut other: Vec<&str> = record.columns().collect();
        other.sort_unstable();
        if other != reference {
            return Err(QueryError::validation(
                "insert rows have mismatched column sets",
            ));
        }
    }
    Ok(columns)
}

impl Builder {
    /// Reject WHERE-less mutations unless the caller opted in.
    fn guard_full_table(&self, verb: &str) -> QueryResult<()> {
        if self.wheres.is_empty() && !self.allow_full_table {
            return Err(QueryError::validation(format!(
                "{verb} without WHERE affects every row; call allow_full_table(true) to confirm"
            )));
        }
        Ok(())
    }

    /// Assemble `verb table (cols) VALUES (...), (...)` with canonical
    /// placeholders, leaving room for dialect suffixes.
    fn insert_parts(&self, records: &[Record], verb: &str) -> QueryResult<(String, ParamList)> {
        self.ensure_valid()?;
        let columns = insert_columns(records)?;
        let mut params = ParamList::new();
        let mut groups = Vec::with_capacity(records.len());
        for record in records {
            let mut placeholders = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = record
                    .get(column)
                    .cloned()
                    .ok_or_else(|| QueryError::validation("insert rows have mismatched column sets"))?;
                placeholders.push(format!("${}", params.push_value(value)));
            }
            groups.push(format!("({})", placeholders.join(", ")));
        }
        let sql = format!(
            "{verb} {} ({}) VALUES {}",
            self.table,
            columns.join(", "),
            groups.join(", ")
        );
        Ok((sql, params))
    }

    pub(crate) fn build_insert(&self, records: &[Record]) -> QueryResult<(String, Vec<Value>)> {
        let (sql, params) = self.insert_parts(records, "INSERT INTO")?;
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    pub(crate) fn build_insert_or_ignore(
        &self,
        records: &[Record],
    ) -> QueryResult<(String, Vec<Value>)> {
        let (verb, suffix) = self.dialect.insert_ignore();
        let (mut sql, params) = self.insert_parts(records, verb)?;
        sql.push_str(suffix);
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    pub(crate) fn build_upsert(
        &self,
        records: &[Record],
        unique_by: &[&str],
        update_columns: &[&str],
    ) -> QueryResult<(String, Vec<Value>)> {
        if !self.dialect.supports_upsert() {
            return Err(QueryError::unsupported(self.dialect, "upsert"));
        }
        if unique_by.is_empty() {
            return Err(QueryError::validation(
                "upsert requires at least one conflict column",
            ));
        }
        if update_columns.is_empty() {
            return Err(QueryError::validation(
                "upsert requires at least one column to update on conflict",
            ));
        }
        let (mut sql, params) = self.insert_parts(records, "INSERT INTO")?;
        sql.push_str(&self.dialect.upsert_clause(unique_by));
        let assignments: Vec<String> = update_columns
            .iter()
            .map(|column| format!("{column} = {}", self.dialect.upsert_value_reference(column)))
            .collect();
        sql.push_str(&assignments.join(", "));
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    pub(crate) fn build_update(&self, values: &Record) -> QueryResult<(String, Vec<Value>)> {
        self.ensure_valid()?;
        if values.is_empty() {
            return Err(QueryError::validation("update requires at least one column"));
        }
        self.guard_full_table("update")?;
        let mut params = ParamList::new();
        let assignments: Vec<String> = values
            .entries()
            .map(|(column, value)| format!("{column} = ${}", params.push_value(value.clone())))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        let where_sql = self.wheres.build_into(self.dialect, &mut params)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    pub(crate) fn build_increment(
        &self,
        steps: &[(&str, i64)],
        extra: &Record,
    ) -> QueryResult<(String, Vec<Value>)> {
        self.ensure_valid()?;
        if steps.is_empty() {
            return Err(QueryError::validation(
                "increment requires at least one column",
            ));
        }
        self.guard_full_table("increment")?;
        let mut params = ParamList::new();
        let mut assignments: Vec<String> = steps
            .iter()
            .map(|(column, amount)| {
                format!("{column} = {column} + ${}", params.push(*amount))
            })
            .collect();
        assignments.extend(
            extra
                .entries()
                .map(|(column, value)| format!("{column} = ${}", params.push_value(value.clone()))),
        );
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        let where_sql = self.wheres.build_into(self.dialect, &mut params)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    pub(crate) fn build_delete(&self) -> QueryResult<(String, Vec<Value>)> {
        self.ensure_valid()?;
        self.guard_full_table("delete")?;
        let mut params = ParamList::new();
        let mut sql = format!("DELETE FROM {}", self.table);
        let where_sql = self.wheres.build_into(self.dialect, &mut params)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((
            self.dialect.finalize_placeholders(&sql),
            params.into_values(),
        ))
    }

    // ==================== Execution ====================

    /// Insert a single row.
    pub async fn insert(&self, client: &impl GenericClient, record: Record) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_insert(std::slice::from_ref(&record))?;
        trace_sql("insert", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Insert several rows in one statement. All rows must share one
    /// column set.
    pub async fn insert_many(
        &self,
        client: &impl GenericClient,
        records: Vec<Record>,
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_insert(&records)?;
        trace_sql("insert", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Insert rows, silently skipping conflicting ones.
    pub async fn insert_or_ignore(
        &self,
        client: &impl GenericClient,
        records: Vec<Record>,
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_insert_or_ignore(&records)?;
        trace_sql("insert", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// `INSERT INTO ... SELECT ...` from a sub-query.
    pub async fn insert_using(
        &self,
        client: &impl GenericClient,
        columns: &[&str],
        query: Builder,
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        self.ensure_valid()?;
        if columns.is_empty() {
            return Err(QueryError::validation(
                "insert_using requires at least one column",
            ));
        }
        if query.dialect != self.dialect {
            return Err(QueryError::validation(format!(
                "sub-query dialect {} does not match parent dialect {}",
                query.dialect, self.dialect
            )));
        }
        let mut params = ParamList::new();
        let select_sql = query.render_select_into(&mut params)?;
        let sql = format!(
            "INSERT INTO {} ({}) {select_sql}",
            self.table,
            columns.join(", ")
        );
        let sql = self.dialect.finalize_placeholders(&sql);
        let params = params.into_values();
        trace_sql("insert", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Insert a row and return the generated `id`.
    pub async fn insert_get_id(
        &self,
        client: &impl GenericClient,
        record: Record,
    ) -> QueryResult<Value> {
        self.insert_get_id_as(client, record, "id").await
    }

    /// Insert a row and return the generated identifier column.
    ///
    /// Dialects with RETURNING fetch the id in the insert itself; the
    /// others issue the engine's last-insert-id query immediately after.
    pub async fn insert_get_id_as(
        &self,
        client: &impl GenericClient,
        record: Record,
        id_column: &str,
    ) -> QueryResult<Value> {
        self.check_client(client)?;
        let (mut sql, params) = self.insert_parts(std::slice::from_ref(&record), "INSERT INTO")?;
        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(id_column);
            let sql = self.dialect.finalize_placeholders(&sql);
            let params = params.into_values();
            trace_sql("insert", &sql, &params);
            let row = client.query_one(&sql, &params).await?;
            match row.get(id_column) {
                Ok(value) => Ok(value.clone()),
                Err(_) => row
                    .value_at(0)
                    .cloned()
                    .ok_or_else(|| QueryError::not_found("no generated id returned")),
            }
        } else {
            let sql = self.dialect.finalize_placeholders(&sql);
            let params = params.into_values();
            trace_sql("insert", &sql, &params);
            client.execute(&sql, &params).await?;
            let follow_up = self
                .dialect
                .last_insert_id_sql()
                .ok_or_else(|| QueryError::unsupported(self.dialect, "generated id retrieval"))?;
            trace_sql("insert", follow_up, &[]);
            client
                .query_scalar(follow_up, &[])
                .await?
                .ok_or_else(|| QueryError::not_found("no generated id available"))
        }
    }

    /// Insert rows, updating `update_columns` from the incoming row when
    /// a `unique_by` conflict occurs.
    pub async fn upsert(
        &self,
        client: &impl GenericClient,
        records: Vec<Record>,
        unique_by: &[&str],
        update_columns: &[&str],
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_upsert(&records, unique_by, update_columns)?;
        trace_sql("upsert", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Update matching rows and return the affected count. Requires a
    /// WHERE predicate unless `allow_full_table(true)` was called.
    pub async fn update(&self, client: &impl GenericClient, values: Record) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_update(&values)?;
        trace_sql("update", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Update the row matching `conditions`, inserting a merged record
    /// when none exists.
    pub async fn update_or_insert(
        &self,
        client: &impl GenericClient,
        conditions: Record,
        values: Record,
    ) -> QueryResult<u64> {
        let mut scoped = self.clone();
        for (column, value) in conditions.entries() {
            scoped = scoped.where_eq(column, value.clone());
        }
        if scoped.exists(client).await? {
            scoped.update(client, values).await
        } else {
            self.insert(client, conditions.merge(values)).await
        }
    }

    /// Add `amount` to a column on matching rows.
    pub async fn increment(
        &self,
        client: &impl GenericClient,
        column: &str,
        amount: i64,
    ) -> QueryResult<u64> {
        self.increment_with(client, column, amount, Record::new())
            .await
    }

    /// Add `amount` to a column, also applying extra SET assignments.
    pub async fn increment_with(
        &self,
        client: &impl GenericClient,
        column: &str,
        amount: i64,
        extra: Record,
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_increment(&[(column, amount)], &extra)?;
        trace_sql("update", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Subtract `amount` from a column on matching rows.
    pub async fn decrement(
        &self,
        client: &impl GenericClient,
        column: &str,
        amount: i64,
    ) -> QueryResult<u64> {
        self.increment_with(client, column, -amount, Record::new())
            .await
    }

    /// Subtract `amount` from a column, also applying extra SET
    /// assignments.
    pub async fn decrement_with(
        &self,
        client: &impl GenericClient,
        column: &str,
        amount: i64,
        extra: Record,
    ) -> QueryResult<u64> {
        self.increment_with(client, column, -amount, extra).await
    }

    /// Add per-column amounts on matching rows.
    pub async fn increment_each(
        &self,
        client: &impl GenericClient,
        columns: &[(&str, i64)],
    ) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_increment(columns, &Record::new())?;
        trace_sql("update", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Subtract per-column amounts on matching rows.
    pub async fn decrement_each(
        &self,
        client: &impl GenericClient,
        columns: &[(&str, i64)],
    ) -> QueryResult<u64> {
        let negated: Vec<(&str, i64)> = columns.iter().map(|(c, n)| (*c, -n)).collect();
        self.increment_each(client, &negated).await
    }

    /// Delete matching rows and return the affected count. Requires a
    /// WHERE predicate unless `allow_full_table(true)` was called.
    pub async fn delete(&self, client: &impl GenericClient) -> QueryResult<u64> {
        self.check_client(client)?;
        let (sql, params) = self.build_delete()?;
        trace_sql("delete", &sql, &params);
        client.execute(&sql, &params).await
    }

    /// Empty the table. Uses the dialect's truncation statement; the
    /// engine decides whether identity counters reset.
    pub async fn truncate(&self, client: &impl GenericClient) -> QueryResult<u64> {
        self.check_client(client)?;
        self.ensure_valid()?;
        let sql = self.dialect.truncate_sql(&self.table);
        trace_sql("truncate", &sql, &[]);
        client.execute(&sql, &[]).await
    }
}
