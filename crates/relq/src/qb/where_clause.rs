//! Predicate methods: everything that feeds the WHERE and HAVING state.
//!
//! Each method appends exactly one expression node (and its values, in
//! left-to-right textual order) and returns the builder for chaining.
//! Operator strings are validated at call time; a bad one is recorded
//! as a usage error and surfaces before any execution attempt.

use crate::dialect::DatePart;
use crate::error::QueryError;
use crate::qb::builder::Builder;
use crate::qb::expr::{Expr, normalize_operator};
use crate::value::Value;

impl Builder {
    /// Fresh sub-builder sharing this builder's table and dialect.
    fn sub_builder(&self) -> Builder {
        Builder::new(&self.table, self.dialect)
    }

    /// Fold a predicate-group sub-builder into this one, returning its
    /// conditions. Predicate groups must not retarget the table.
    fn take_group(&mut self, sub: Builder) -> Option<Vec<Expr>> {
        if sub.table != self.table {
            self.record_error(QueryError::validation(format!(
                "predicate group targets table '{}' but parent queries '{}'",
                sub.table, self.table
            )));
            return None;
        }
        if let Some(err) = sub.build_error {
            self.record_error(err);
            return None;
        }
        let exprs = sub.wheres.into_exprs();
        if exprs.is_empty() { None } else { Some(exprs) }
    }

    /// OR-combine an expression with the most recent top-level predicate.
    fn or_combine(&mut self, expr: Expr) {
        match self.wheres.pop() {
            Some(prev) => self.wheres.push(Expr::Or(vec![prev, expr])),
            None => self.wheres.push(expr),
        }
    }

    /// Build a sub-select from a closure. The sub-builder starts on this
    /// builder's table and may retarget itself with [`Builder::from`].
    fn sub_query(&mut self, f: impl FnOnce(Builder) -> Builder) -> Box<Builder> {
        Box::new(f(self.sub_builder()))
    }

    // ==================== Comparisons ====================

    /// Add WHERE: `column op value`. The operator must be one of the
    /// supported comparison operators.
    pub fn where_operator(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        match normalize_operator(op) {
            Ok(op) => self.wheres.push(Expr::compare(column, op, value)),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Add WHERE: `column = value`.
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, "=", value)
    }

    /// Add WHERE: `column != value`.
    pub fn where_ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, "!=", value)
    }

    /// Add WHERE: `column > value`.
    pub fn where_gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, ">", value)
    }

    /// Add WHERE: `column >= value`.
    pub fn where_gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, ">=", value)
    }

    /// Add WHERE: `column < value`.
    pub fn where_lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, "<", value)
    }

    /// Add WHERE: `column <= value`.
    pub fn where_lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_operator(column, "<=", value)
    }

    /// Add WHERE: `column LIKE pattern`.
    pub fn where_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_operator(column, "LIKE", pattern)
    }

    /// Add WHERE comparing two columns; binds nothing.
    pub fn where_column(mut self, left: &str, op: &str, right: &str) -> Self {
        match normalize_operator(op) {
            Ok(op) => self.wheres.push(Expr::ColumnCompare {
                left: left.to_string(),
                op,
                right: right.to_string(),
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    // ==================== Boolean grouping ====================

    /// OR-combine a parenthesized group with the previous predicate:
    /// `(<previous> OR (<group AND-joined>))`. With no previous
    /// predicate the group is simply appended.
    pub fn or_where(mut self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = f(self.sub_builder());
        if let Some(exprs) = self.take_group(sub) {
            self.or_combine(Expr::And(exprs));
        }
        self
    }

    /// Append a parenthesized AND group: `(<group AND-joined>)`.
    pub fn where_group(mut self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = f(self.sub_builder());
        if let Some(exprs) = self.take_group(sub) {
            self.wheres.push(Expr::And(exprs));
        }
        self
    }

    /// Append a negated group: `NOT (<group OR-joined>)`.
    pub fn where_not(mut self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = f(self.sub_builder());
        if let Some(exprs) = self.take_group(sub) {
            self.wheres.push(Expr::Not(Box::new(Expr::Or(exprs))));
        }
        self
    }

    /// OR-join one comparison per column against the same value; the
    /// value is rebound per column.
    pub fn where_any(mut self, columns: &[&str], op: &str, value: impl Into<Value>) -> Self {
        self.multi_column(columns, op, value.into(), false);
        self
    }

    /// AND-join one comparison per column against the same value; the
    /// value is rebound per column.
    pub fn where_all(mut self, columns: &[&str], op: &str, value: impl Into<Value>) -> Self {
        self.multi_column(columns, op, value.into(), true);
        self
    }

    fn multi_column(&mut self, columns: &[&str], op: &str, value: Value, all: bool) {
        if columns.is_empty() {
            return;
        }
        match normalize_operator(op) {
            Ok(op) => {
                let exprs: Vec<Expr> = columns
                    .iter()
                    .map(|column| Expr::compare(*column, op, value.clone()))
                    .collect();
                self.wheres
                    .push(if all { Expr::And(exprs) } else { Expr::Or(exprs) });
            }
            Err(err) => self.record_error(err),
        }
    }

    // ==================== Ranges & sets ====================

    /// Add WHERE: `column BETWEEN low AND high`.
    pub fn where_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.wheres.push(Expr::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: false,
        });
        self
    }

    /// Add WHERE: `column NOT BETWEEN low AND high`.
    pub fn where_not_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.wheres.push(Expr::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: true,
        });
        self
    }

    /// Add WHERE: `column BETWEEN low_column AND high_column`.
    pub fn where_between_columns(mut self, column: &str, low: &str, high: &str) -> Self {
        self.wheres.push(Expr::BetweenColumns {
            column: column.to_string(),
            low: low.to_string(),
            high: high.to_string(),
            negated: false,
        });
        self
    }

    /// Add WHERE: `column NOT BETWEEN low_column AND high_column`.
    pub fn where_not_between_columns(mut self, column: &str, low: &str, high: &str) -> Self {
        self.wheres.push(Expr::BetweenColumns {
            column: column.to_string(),
            low: low.to_string(),
            high: high.to_string(),
            negated: true,
        });
        self
    }

    /// Add WHERE: `column IN (values...)`. An empty set renders a
    /// predicate that matches no rows.
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.wheres.push(Expr::in_list(
            column,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Add WHERE: `column NOT IN (values...)`. An empty set matches all
    /// rows.
    pub fn where_not_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.wheres.push(Expr::not_in(
            column,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Add WHERE: `column IN (SELECT ...)` over a sub-query.
    pub fn where_in_query(mut self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        let query = self.sub_query(f);
        self.wheres.push(Expr::InSubquery {
            column: column.to_string(),
            query,
            negated: false,
        });
        self
    }

    /// Add WHERE: `column NOT IN (SELECT ...)` over a sub-query.
    pub fn where_not_in_query(mut self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        let query = self.sub_query(f);
        self.wheres.push(Expr::InSubquery {
            column: column.to_string(),
            query,
            negated: true,
        });
        self
    }

    // ==================== Null checks ====================

    /// Add WHERE: `column IS NULL`.
    pub fn where_null(mut self, column: &str) -> Self {
        self.wheres.push(Expr::NullCheck {
            column: column.to_string(),
            is_null: true,
        });
        self
    }

    /// Add WHERE: `column IS NOT NULL`.
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.wheres.push(Expr::NullCheck {
            column: column.to_string(),
            is_null: false,
        });
        self
    }

    // ==================== Sub-query predicates ====================

    /// Add WHERE: `EXISTS (SELECT ...)`.
    pub fn where_exists(mut self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let query = self.sub_query(f);
        self.wheres.push(Expr::Exists {
            query,
            negated: false,
        });
        self
    }

    /// Add WHERE: `NOT EXISTS (SELECT ...)`.
    pub fn where_not_exists(mut self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let query = self.sub_query(f);
        self.wheres.push(Expr::Exists {
            query,
            negated: true,
        });
        self
    }

    /// Add WHERE: `EXISTS (...)` from an already-built query. The
    /// sub-query must speak the same dialect.
    pub fn where_exists_builder(mut self, query: Builder) -> Self {
        if query.dialect != self.dialect {
            self.record_error(QueryError::validation(format!(
                "sub-query dialect {} does not match parent dialect {}",
                query.dialect, self.dialect
            )));
            return self;
        }
        self.wheres.push(Expr::Exists {
            query: Box::new(query),
            negated: false,
        });
        self
    }

    /// Add WHERE comparing a column against a scalar sub-select:
    /// `column op (SELECT ...)`.
    pub fn where_subquery(
        mut self,
        column: &str,
        op: &str,
        f: impl FnOnce(Builder) -> Builder,
    ) -> Self {
        let op = match normalize_operator(op) {
            Ok(op) => op,
            Err(err) => {
                self.record_error(err);
                return self;
            }
        };
        let query = self.sub_query(f);
        self.wheres.push(Expr::CompareSubquery {
            column: column.to_string(),
            op,
            query,
        });
        self
    }

    // ==================== JSON predicates ====================

    /// Add WHERE on a JSON path extraction: `column->>'path' = value`.
    pub fn where_json(mut self, column: &str, path: &str, value: impl Into<Value>) -> Self {
        self.wheres.push(Expr::JsonPath {
            column: column.to_string(),
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add WHERE testing JSON containment. Non-string values are
    /// serialized to their canonical JSON text before binding.
    pub fn where_json_contains(mut self, column: &str, value: impl Into<Value>) -> Self {
        match value.into().to_json_text() {
            Ok(text) => self.wheres.push(Expr::JsonContains {
                column: column.to_string(),
                value: Value::Text(text),
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Add WHERE on a JSON array's length.
    pub fn where_json_length(mut self, column: &str, op: &str, length: i64) -> Self {
        match normalize_operator(op) {
            Ok(op) => self.wheres.push(Expr::JsonLength {
                column: column.to_string(),
                op,
                value: Value::Int(length),
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    // ==================== Temporal predicates ====================

    fn where_date_part(
        mut self,
        part: DatePart,
        column: &str,
        op: &str,
        value: Value,
    ) -> Self {
        match normalize_operator(op) {
            Ok(op) => self.wheres.push(Expr::DateComponent {
                part,
                column: column.to_string(),
                op,
                value,
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Compare the date component of a column.
    pub fn where_date(self, column: &str, op: &str, date: impl Into<Value>) -> Self {
        self.where_date_part(DatePart::Date, column, op, date.into())
    }

    /// Compare the month component of a column.
    pub fn where_month(self, column: &str, op: &str, month: u32) -> Self {
        self.where_date_part(DatePart::Month, column, op, Value::Int(month.into()))
    }

    /// Compare the day component of a column.
    pub fn where_day(self, column: &str, op: &str, day: u32) -> Self {
        self.where_date_part(DatePart::Day, column, op, Value::Int(day.into()))
    }

    /// Compare the year component of a column.
    pub fn where_year(self, column: &str, op: &str, year: i32) -> Self {
        self.where_date_part(DatePart::Year, column, op, Value::Int(year.into()))
    }

    /// Compare the time component of a column.
    pub fn where_time(self, column: &str, op: &str, time: impl Into<Value>) -> Self {
        self.where_date_part(DatePart::Time, column, op, time.into())
    }

    // ==================== Full text & raw ====================

    /// Add a dialect-specific full-text match with one bound term.
    pub fn where_full_text(mut self, column: &str, term: &str) -> Self {
        self.wheres.push(Expr::FullText {
            column: column.to_string(),
            value: Value::Text(term.to_string()),
        });
        self
    }

    /// OR-combine a full-text match with the previous predicate.
    pub fn or_where_full_text(mut self, column: &str, term: &str) -> Self {
        self.or_combine(Expr::FullText {
            column: column.to_string(),
            value: Value::Text(term.to_string()),
        });
        self
    }

    /// Add a raw WHERE fragment with `?` markers. Each marker consumes
    /// one binding, in order; bindings travel through the parameter
    /// ledger. The fragment itself is the caller's responsibility.
    pub fn where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.wheres.push(Expr::template(sql, bindings));
        self
    }

    /// OR-combine a raw WHERE fragment with the previous predicate.
    pub fn or_where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.or_combine(Expr::template(sql, bindings));
        self
    }

    // ==================== HAVING ====================

    /// Add HAVING: `column op value`.
    pub fn having(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        match normalize_operator(op) {
            Ok(op) => self.havings.push(Expr::compare(column, op, value)),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Add a raw HAVING fragment with `?` markers and forwarded
    /// bindings.
    pub fn having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.havings.push(Expr::template(sql, bindings));
        self
    }
}

/// Count `$n` placeholders and check they form a contiguous increasing
/// run starting at `$1`. Test support for the binding invariants.
#[cfg(test)]
pub(crate) fn placeholder_run(sql: &str) -> crate::error::QueryResult<usize> {
    let mut expected = 0usize;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            continue;
        }
        let mut digits = String::new();
        while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push(chars.next().unwrap());
        }
        if digits.is_empty() {
            continue;
        }
        expected += 1;
        let idx: usize = digits.parse().unwrap();
        if idx != expected {
            return Err(QueryError::validation(format!(
                "placeholder ${idx} out of sequence, expected ${expected}"
            )));
        }
    }
    Ok(expected)
}
