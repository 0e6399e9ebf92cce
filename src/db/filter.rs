//! Equality/membership filters rendered into SQL `WHERE` clauses.
//!
//! Column names come from a fixed whitelist (see
//! [`crate::services::document`]), so only values are bound.

use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::QueryAs;
use sqlx::sqlite::{Sqlite, SqliteArguments};

/// A typed filter value
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
}

/// A predicate over one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    /// `column = value`
    Equals {
        column: &'static str,
        value: FilterValue,
    },
    /// `column IN (values...)`; an empty set matches nothing
    OneOf {
        column: &'static str,
        values: Vec<FilterValue>,
    },
}

impl ColumnFilter {
    pub fn equals(column: &'static str, value: FilterValue) -> Self {
        Self::Equals { column, value }
    }

    pub fn one_of(column: &'static str, values: Vec<FilterValue>) -> Self {
        Self::OneOf { column, values }
    }
}

/// Rendered `WHERE` clause with its bind values in placeholder order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub binds: Vec<FilterValue>,
}

/// Render filters as ` WHERE a = ? AND b IN (?, ?)`; empty when no filters.
pub fn build_where(filters: &[ColumnFilter]) -> WhereClause {
    let mut clause = WhereClause::default();
    let mut parts = Vec::with_capacity(filters.len());

    for filter in filters {
        match filter {
            ColumnFilter::Equals { column, value } => {
                parts.push(format!("{} = ?", column));
                clause.binds.push(value.clone());
            }
            ColumnFilter::OneOf { values, .. } if values.is_empty() => {
                parts.push("1 = 0".to_string());
            }
            ColumnFilter::OneOf { column, values } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                parts.push(format!("{} IN ({})", column, placeholders));
                clause.binds.extend(values.iter().cloned());
            }
        }
    }

    if !parts.is_empty() {
        clause.sql = format!(" WHERE {}", parts.join(" AND "));
    }
    clause
}

/// Bind filter values onto a SQLite query
pub fn bind_sqlite<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    values: &[FilterValue],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    values.iter().fold(query, |query, value| match value {
        FilterValue::Integer(v) => query.bind(*v),
        FilterValue::Text(v) => query.bind(v.clone()),
        FilterValue::Boolean(v) => query.bind(*v),
    })
}

/// Bind filter values onto a MySQL query
pub fn bind_mysql<'q, O>(
    query: QueryAs<'q, MySql, O, MySqlArguments>,
    values: &[FilterValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    values.iter().fold(query, |query, value| match value {
        FilterValue::Integer(v) => query.bind(*v),
        FilterValue::Text(v) => query.bind(v.clone()),
        FilterValue::Boolean(v) => query.bind(*v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters_renders_nothing() {
        assert_eq!(build_where(&[]), WhereClause::default());
    }

    #[test]
    fn test_equality_and_membership() {
        let clause = build_where(&[
            ColumnFilter::equals("course_id", FilterValue::Integer(7)),
            ColumnFilter::one_of(
                "mime_type",
                vec![
                    FilterValue::Text("video/mp4".into()),
                    FilterValue::Text("video/webm".into()),
                ],
            ),
            ColumnFilter::equals("is_active", FilterValue::Boolean(true)),
        ]);

        assert_eq!(
            clause.sql,
            " WHERE course_id = ? AND mime_type IN (?, ?) AND is_active = ?"
        );
        assert_eq!(clause.binds.len(), 4);
        assert_eq!(clause.binds[3], FilterValue::Boolean(true));
    }

    #[test]
    fn test_empty_membership_matches_nothing() {
        let clause = build_where(&[ColumnFilter::one_of("id", vec![])]);
        assert_eq!(clause.sql, " WHERE 1 = 0");
        assert!(clause.binds.is_empty());
    }
}
