use crate::value::{ColumnType, Value};

/// SQL flavour a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders with backtick quoting.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    /// Whether `INSERT ... RETURNING` hands back generated keys.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Sqlite | Dialect::Postgres)
    }

    /// DDL type of a column. `key` columns need a bounded type on MySQL.
    /// SQLite stores booleans as integers; the `Any` driver cannot read a
    /// column declared `BOOLEAN` there.
    pub fn column_type(self, column_type: ColumnType, key: bool) -> &'static str {
        match (self, column_type) {
            (Dialect::Sqlite, ColumnType::Boolean) => "INTEGER",
            (_, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (_, ColumnType::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnType::Real) => "REAL",
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION",
            (Dialect::MySql, ColumnType::Real) => "DOUBLE",
            (Dialect::MySql, ColumnType::Text) if key => "VARCHAR(255)",
            (_, ColumnType::Text) => "TEXT",
            (Dialect::Postgres, ColumnType::Blob) => "BYTEA",
            (Dialect::MySql, ColumnType::Blob) => "LONGBLOB",
            (Dialect::Sqlite, ColumnType::Blob) => "BLOB",
        }
    }

    /// Validate and quote an identifier (optionally `schema.table`).
    pub fn quote(self, ident: &str, kind: &'static str) -> Result<String, QueryError> {
        if !is_valid_identifier(ident, false) {
            return Err(QueryError::InvalidIdentifier {
                kind,
                ident: ident.to_string(),
            });
        }
        Ok(quote_identifier(ident, self, false))
    }
}

/// A fluent builder for SELECT queries over one table.
///
/// Identifiers are always validated and quoted; values are always bound.
///
/// ```ignore
/// let (sql, params) = QueryBuilder::new("users", Dialect::Postgres)
///     .where_eq("email", "a@b.com")
///     .order_by("id", true)
///     .limit(1)
///     .build_select(&["id", "email"])?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit_val: Option<u64>,
    dialect: Dialect,
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(String, Value),
    IsNull(String),
}

impl QueryBuilder {
    pub fn new(table: &str, dialect: Dialect) -> Self {
        Self {
            table: table.to_string(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            dialect,
        }
    }

    /// Equality constraint. A `Null` value renders as `IS NULL`.
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let condition = if value.is_null() {
            Condition::IsNull(column.to_string())
        } else {
            Condition::Eq(column.to_string(), value)
        };
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    /// Build a SELECT query returning `(sql, bind_values)`.
    pub fn build_select(&self, columns: &[&str]) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.dialect.quote(&self.table, "table")?;
        let columns = self.format_column_list(columns)?;

        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        self.append_order(&mut sql)?;
        self.append_limit(&mut sql);
        Ok((sql, params))
    }

    /// Build a COUNT query returning `(sql, bind_values)`.
    pub fn build_count(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.dialect.quote(&self.table, "table")?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    fn append_where(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<(), QueryError> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        let mut clauses = Vec::with_capacity(self.conditions.len());
        for cond in &self.conditions {
            match cond {
                Condition::Eq(col, val) => {
                    let col = self.dialect.quote(col, "column")?;
                    params.push(val.clone());
                    let placeholder = self.dialect.placeholder(params.len());
                    clauses.push(format!("{col} = {placeholder}"));
                }
                Condition::IsNull(col) => {
                    let col = self.dialect.quote(col, "column")?;
                    clauses.push(format!("{col} IS NULL"));
                }
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        Ok(())
    }

    fn append_order(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for (col, asc) in &self.order {
            let col = self.dialect.quote(col, "column")?;
            if *asc {
                clauses.push(format!("{col} ASC"));
            } else {
                clauses.push(format!("{col} DESC"));
            }
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit(&self, sql: &mut String) {
        if let Some(limit) = self.limit_val {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
    }

    fn format_column_list(&self, columns: &[&str]) -> Result<String, QueryError> {
        let mut out = Vec::with_capacity(columns.len());
        for col in columns {
            if !is_valid_identifier(col, true) {
                return Err(QueryError::InvalidIdentifier {
                    kind: "column",
                    ident: col.to_string(),
                });
            }
            out.push(quote_identifier(col, self.dialect, true));
        }
        Ok(out.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid {kind} identifier: {ident}")]
    InvalidIdentifier { kind: &'static str, ident: String },
}

fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(ident: &str, dialect: Dialect, allow_star: bool) -> String {
    let quote = dialect.quote_char();
    let parts: Vec<&str> = ident.split('.').collect();
    let last_idx = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            if allow_star && part == "*" && idx == last_idx {
                part.to_string()
            } else {
                format!("{quote}{part}{quote}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select() {
        let (sql, params) = QueryBuilder::new("users", Dialect::Sqlite)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_eq() {
        let (sql, params) = QueryBuilder::new("users", Dialect::Sqlite)
            .where_eq("email", "a@b.com")
            .build_select(&["id", "email"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"email\" FROM \"users\" WHERE \"email\" = ?"
        );
        assert_eq!(params, vec![Value::from("a@b.com")]);
    }

    #[test]
    fn test_null_becomes_is_null() {
        let (sql, params) = QueryBuilder::new("users", Dialect::Postgres)
            .where_eq("email", Value::Null)
            .where_eq("name", "bob")
            .build_select(&["id"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\" FROM \"users\" WHERE \"email\" IS NULL AND \"name\" = $1"
        );
        assert_eq!(params, vec![Value::from("bob")]);
    }

    #[test]
    fn test_first_row_query() {
        let (sql, params) = QueryBuilder::new("users", Dialect::Postgres)
            .where_eq("status", "active")
            .where_eq("age", 30)
            .order_by("id", true)
            .limit(1)
            .build_select(&["id", "status", "age"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"status\", \"age\" FROM \"users\" WHERE \"status\" = $1 AND \"age\" = $2 ORDER BY \"id\" ASC LIMIT 1"
        );
        assert_eq!(params, vec![Value::from("active"), Value::Int(30)]);
    }

    #[test]
    fn test_count_query() {
        let (sql, params) = QueryBuilder::new("users", Dialect::MySql)
            .where_eq("active", true)
            .build_count()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM `users` WHERE `active` = ?");
        assert_eq!(params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_invalid_identifier() {
        let err = QueryBuilder::new("users;drop", Dialect::Sqlite)
            .build_select(&["*"])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "table", .. }));

        let err = QueryBuilder::new("users", Dialect::Sqlite)
            .where_eq("name = '' OR 1=1 --", "x")
            .build_select(&["*"])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "column", .. }));
    }

    #[test]
    fn test_column_types() {
        assert_eq!(Dialect::Sqlite.column_type(ColumnType::Integer, true), "INTEGER");
        assert_eq!(Dialect::Postgres.column_type(ColumnType::Real, false), "DOUBLE PRECISION");
        assert_eq!(Dialect::MySql.column_type(ColumnType::Text, true), "VARCHAR(255)");
        assert_eq!(Dialect::MySql.column_type(ColumnType::Text, false), "TEXT");
        assert_eq!(Dialect::Sqlite.column_type(ColumnType::Boolean, false), "INTEGER");
        assert_eq!(Dialect::Postgres.column_type(ColumnType::Boolean, false), "BOOLEAN");
        assert_eq!(Dialect::MySql.column_type(ColumnType::Boolean, false), "BOOLEAN");
    }
}
