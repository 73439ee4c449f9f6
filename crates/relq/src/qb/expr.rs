//! Predicate expression tree for WHERE/HAVING clauses.
//!
//! Every predicate a builder accumulates is an [`Expr`] node. Rendering
//! walks the tree once, pushing each bound value onto the shared
//! parameter ledger and emitting the matching `$n` placeholder, so
//! placeholder indices are computed at build time and never by string
//! replacement of already-rendered SQL.

use crate::dialect::{DatePart, Dialect};
use crate::error::{QueryError, QueryResult};
use crate::qb::builder::Builder;
use crate::qb::param::{ParamList, bind_markers};
use crate::value::Value;

/// Comparison operators accepted by the generic predicate methods.
const OPERATORS: &[&str] = &[
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "ILIKE", "NOT ILIKE",
];

/// Validate an operator string against the supported set.
///
/// Word operators are matched case-insensitively. An unknown operator is
/// a usage error raised by the calling builder method.
pub(crate) fn normalize_operator(op: &str) -> QueryResult<&'static str> {
    let canonical = op.trim().to_uppercase();
    OPERATORS
        .iter()
        .find(|candidate| **candidate == canonical)
        .copied()
        .ok_or_else(|| QueryError::validation(format!("unsupported operator: {op:?}")))
}

/// One node of a predicate expression.
#[derive(Clone, Debug)]
pub enum Expr {
    /// AND group: all conditions must hold.
    And(Vec<Expr>),

    /// OR group: at least one condition must hold.
    Or(Vec<Expr>),

    /// Negation of the inner expression.
    Not(Box<Expr>),

    /// column op $n
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },

    /// left op right, both identifiers; binds nothing.
    ColumnCompare {
        left: String,
        op: &'static str,
        right: String,
    },

    /// column IS NULL / column IS NOT NULL
    NullCheck { column: String, is_null: bool },

    /// column IN ($1, $2, ...) over a literal sequence.
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// column IN (SELECT ...) over a sub-builder.
    InSubquery {
        column: String,
        query: Box<Builder>,
        negated: bool,
    },

    /// column op (SELECT ...) scalar sub-select comparison.
    CompareSubquery {
        column: String,
        op: &'static str,
        query: Box<Builder>,
    },

    /// EXISTS (SELECT ...) / NOT EXISTS (SELECT ...)
    Exists { query: Box<Builder>, negated: bool },

    /// column BETWEEN $n AND $m
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },

    /// column BETWEEN low_col AND high_col; binds nothing.
    BetweenColumns {
        column: String,
        low: String,
        high: String,
        negated: bool,
    },

    /// JSON path extraction equality.
    JsonPath {
        column: String,
        path: String,
        value: Value,
    },

    /// JSON containment; the value is already canonical JSON text.
    JsonContains { column: String, value: Value },

    /// JSON array length comparison.
    JsonLength {
        column: String,
        op: &'static str,
        value: Value,
    },

    /// Temporal component comparison wrapping the column in the
    /// dialect's extraction function.
    DateComponent {
        part: DatePart,
        column: String,
        op: &'static str,
        value: Value,
    },

    /// Dialect-specific full-text match with one bound term.
    FullText { column: String, value: Value },

    /// Raw fragment with `?` markers; bindings forwarded as parameters.
    Template { sql: String, bindings: Vec<Value> },

    /// Raw fragment without parameters.
    Raw(String),

    /// Always true; stands in for empty NOT IN lists.
    True,

    /// Always false; stands in for empty IN lists.
    False,
}

impl Expr {
    /// column op value
    pub fn compare(column: impl Into<String>, op: &'static str, value: impl Into<Value>) -> Self {
        Expr::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// column IN (values...); an empty set matches nothing.
    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Expr::False;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: false,
        }
    }

    /// column NOT IN (values...); an empty set matches everything.
    pub fn not_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Expr::True;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: true,
        }
    }

    /// Raw fragment with `?` markers and forwarded bindings.
    pub fn template(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Expr::Template {
            sql: sql.into(),
            bindings,
        }
    }

    /// Whether this node contributes no SQL.
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => {
                exprs.is_empty() || exprs.iter().all(Expr::is_empty)
            }
            Expr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// Render this node, pushing bound values onto `params`.
    pub fn build(&self, dialect: Dialect, params: &mut ParamList) -> QueryResult<String> {
        match self {
            Expr::And(exprs) => Self::build_group(exprs, " AND ", dialect, params),
            Expr::Or(exprs) => Self::build_group(exprs, " OR ", dialect, params),
            Expr::Not(inner) => {
                let sql = inner.build(dialect, params)?;
                if sql.is_empty() {
                    Ok(String::new())
                } else {
                    Ok(format!("NOT ({sql})"))
                }
            }
            Expr::Compare { column, op, value } => {
                let idx = params.push_value(value.clone());
                Ok(format!("{column} {op} ${idx}"))
            }
            Expr::ColumnCompare { left, op, right } => Ok(format!("{left} {op} {right}")),
            Expr::NullCheck { column, is_null } => {
                if *is_null {
                    Ok(format!("{column} IS NULL"))
                } else {
                    Ok(format!("{column} IS NOT NULL"))
                }
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // The constructors fold empty sets into True/False;
                    // a hand-built node must still render valid SQL.
                    return Ok(if *negated { "1=1" } else { "1=0" }.to_string());
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| format!("${}", params.push_value(v.clone())))
                    .collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{column} {op} ({})", placeholders.join(", ")))
            }
            Expr::InSubquery {
                column,
                query,
                negated,
            } => {
                let sub = query.render_select_into(params)?;
                let op = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{column} {op} ({sub})"))
            }
            Expr::CompareSubquery { column, op, query } => {
                let sub = query.render_select_into(params)?;
                Ok(format!("{column} {op} ({sub})"))
            }
            Expr::Exists { query, negated } => {
                let sub = query.render_select_into(params)?;
                if *negated {
                    Ok(format!("NOT EXISTS ({sub})"))
                } else {
                    Ok(format!("EXISTS ({sub})"))
                }
            }
            Expr::Between {
                column,
                low,
                high,
                negated,
            } => {
                let low_idx = params.push_value(low.clone());
                let high_idx = params.push_value(high.clone());
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                Ok(format!("{column} {op} ${low_idx} AND ${high_idx}"))
            }
            Expr::BetweenColumns {
                column,
                low,
                high,
                negated,
            } => {
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                Ok(format!("{column} {op} {low} AND {high}"))
            }
            Expr::JsonPath {
                column,
                path,
                value,
            } => {
                let expr = dialect.json_path_expr(column, path);
                let idx = params.push_value(value.clone());
                Ok(format!("{expr} = ${idx}"))
            }
            Expr::JsonContains { column, value } => {
                let idx = params.push_value(value.clone());
                dialect.json_contains_expr(column, &format!("${idx}"))
            }
            Expr::JsonLength { column, op, value } => {
                let expr = dialect.json_length_expr(column);
                let idx = params.push_value(value.clone());
                Ok(format!("{expr} {op} ${idx}"))
            }
            Expr::DateComponent {
                part,
                column,
                op,
                value,
            } => {
                let expr = dialect.date_part_expr(*part, column);
                let idx = params.push_value(value.clone());
                Ok(format!("{expr} {op} ${idx}"))
            }
            Expr::FullText { column, value } => {
                let idx = params.push_value(value.clone());
                Ok(dialect.full_text_expr(column, &format!("${idx}")))
            }
            Expr::Template { sql, bindings } => Ok(bind_markers(sql, bindings, params)),
            Expr::Raw(sql) => Ok(sql.clone()),
            Expr::True => Ok("1=1".to_string()),
            Expr::False => Ok("1=0".to_string()),
        }
    }

    fn build_group(
        exprs: &[Expr],
        joiner: &str,
        dialect: Dialect,
        params: &mut ParamList,
    ) -> QueryResult<String> {
        let mut parts = Vec::with_capacity(exprs.len());
        for expr in exprs {
            if expr.is_empty() {
                continue;
            }
            let sql = expr.build(dialect, params)?;
            if sql.is_empty() {
                continue;
            }
            // Nested multi-member groups keep their parentheses so the
            // boolean structure survives the join.
            let grouped = matches!(expr, Expr::And(v) | Expr::Or(v) if v.len() > 1);
            parts.push(if grouped { format!("({sql})") } else { sql });
        }
        Ok(parts.join(joiner))
    }
}

/// An ordered collection of predicates, AND-joined at render time.
///
/// Both the WHERE and HAVING clauses of a builder are one of these.
#[derive(Clone, Debug, Default)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self { exprs: Vec::new() }
    }

    /// Whether the group holds no predicates.
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Append a predicate.
    pub fn push(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    /// Remove and return the most recently added predicate.
    pub fn pop(&mut self) -> Option<Expr> {
        self.exprs.pop()
    }

    /// Borrow the predicates in insertion order.
    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Consume the group into its predicates.
    pub fn into_exprs(self) -> Vec<Expr> {
        self.exprs
    }

    /// Render the clause body (without the WHERE/HAVING keyword) into a
    /// shared ledger. Returns an empty string when no predicates exist,
    /// so callers omit the keyword entirely.
    pub fn build_into(&self, dialect: Dialect, params: &mut ParamList) -> QueryResult<String> {
        if self.exprs.is_empty() {
            return Ok(String::new());
        }
        Expr::And(self.exprs.clone()).build(dialect, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(expr: &Expr) -> (String, usize) {
        let mut params = ParamList::new();
        let sql = expr.build(Dialect::Postgres, &mut params).unwrap();
        (sql, params.len())
    }

    #[test]
    fn test_simple_compare() {
        let (sql, n) = build(&Expr::compare("name", "=", "alice"));
        assert_eq!(sql, "name = $1");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_and_group() {
        let expr = Expr::And(vec![
            Expr::compare("status", "=", "active"),
            Expr::compare("age", ">", 18i64),
        ]);
        let (sql, n) = build(&expr);
        assert_eq!(sql, "status = $1 AND age > $2");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_nested_or_is_parenthesized() {
        let expr = Expr::And(vec![
            Expr::compare("status", "=", "active"),
            Expr::Or(vec![
                Expr::compare("role", "=", "admin"),
                Expr::compare("role", "=", "superuser"),
            ]),
        ]);
        let (sql, n) = build(&expr);
        assert_eq!(sql, "status = $1 AND (role = $2 OR role = $3)");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_not_wraps_or_joined_members() {
        let expr = Expr::Not(Box::new(Expr::Or(vec![
            Expr::compare("banned", "=", true),
            Expr::compare("muted", "=", true),
        ])));
        let (sql, n) = build(&expr);
        assert_eq!(sql, "NOT (banned = $1 OR muted = $2)");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_in_list() {
        let expr = Expr::in_list("id", vec![1i64.into(), 2i64.into(), 3i64.into()]);
        let (sql, n) = build(&expr);
        assert_eq!(sql, "id IN ($1, $2, $3)");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let (sql, n) = build(&Expr::in_list("id", vec![]));
        assert_eq!(sql, "1=0");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_empty_not_in_matches_everything() {
        let (sql, n) = build(&Expr::not_in("id", vec![]));
        assert_eq!(sql, "1=1");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_between_binds_in_order() {
        let expr = Expr::Between {
            column: "age".to_string(),
            low: 18i64.into(),
            high: 65i64.into(),
            negated: false,
        };
        let (sql, n) = build(&expr);
        assert_eq!(sql, "age BETWEEN $1 AND $2");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_column_compare_binds_nothing() {
        let expr = Expr::ColumnCompare {
            left: "updated_at".to_string(),
            op: ">",
            right: "created_at".to_string(),
        };
        let (sql, n) = build(&expr);
        assert_eq!(sql, "updated_at > created_at");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_template_forwards_bindings() {
        let expr = Expr::template("a = ? OR b = ?", vec![1i64.into(), 2i64.into()]);
        let (sql, n) = build(&expr);
        assert_eq!(sql, "a = $1 OR b = $2");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_full_text_per_dialect() {
        let expr = Expr::FullText {
            column: "body".to_string(),
            value: "needle".into(),
        };
        let mut params = ParamList::new();
        assert_eq!(
            expr.build(Dialect::Postgres, &mut params).unwrap(),
            "to_tsvector(body) @@ plainto_tsquery($1)"
        );
        let mut params = ParamList::new();
        assert_eq!(
            expr.build(Dialect::MySql, &mut params).unwrap(),
            "MATCH (body) AGAINST ($1)"
        );
    }

    #[test]
    fn test_json_contains_unsupported_on_sqlite() {
        let expr = Expr::JsonContains {
            column: "tags".to_string(),
            value: "[1]".into(),
        };
        let mut params = ParamList::new();
        let err = expr.build(Dialect::Sqlite, &mut params).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_normalize_operator() {
        assert_eq!(normalize_operator("=").unwrap(), "=");
        assert_eq!(normalize_operator("not like").unwrap(), "NOT LIKE");
        assert!(normalize_operator("; DROP TABLE").is_err());
    }

    #[test]
    fn test_group_build_into_empty_is_blank() {
        let group = ExprGroup::new();
        let mut params = ParamList::new();
        assert_eq!(
            group.build_into(Dialect::Postgres, &mut params).unwrap(),
            ""
        );
    }
}
