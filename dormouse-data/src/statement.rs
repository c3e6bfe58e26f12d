//! Statement rendering for entity writes and schema management.

use crate::entity::{ColumnDescriptor, EntityDescriptor};
use crate::error::DataError;
use crate::query::{Dialect, QueryBuilder, QueryError};
use crate::value::{ColumnType, Value};

/// A value to bind, with the column type used to type a `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub value: Value,
    pub column_type: Option<ColumnType>,
}

impl Bind {
    pub fn untyped(value: Value) -> Self {
        Self {
            value,
            column_type: None,
        }
    }
}

/// Rendered SQL plus its positional binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.binds.push(Bind::untyped(value.into()));
        self
    }

    fn bind_typed(&mut self, value: Value, column_type: ColumnType) {
        self.binds.push(Bind {
            value,
            column_type: Some(column_type),
        });
    }
}

impl From<(String, Vec<Value>)> for Statement {
    fn from((sql, params): (String, Vec<Value>)) -> Self {
        Self {
            sql,
            binds: params.into_iter().map(Bind::untyped).collect(),
        }
    }
}

fn id_column(descriptor: &EntityDescriptor) -> Result<&ColumnDescriptor, DataError> {
    descriptor.id_column().ok_or_else(|| {
        DataError::configuration(format!("`{}` has no identity column", descriptor.name()))
    })
}

/// `SELECT <columns> FROM <table> WHERE <id> = ?`
pub fn select_by_id(
    descriptor: &EntityDescriptor,
    dialect: Dialect,
    id: Value,
) -> Result<Statement, DataError> {
    let id_col = id_column(descriptor)?;
    let query = QueryBuilder::new(descriptor.table(), dialect)
        .where_eq(id_col.column, id)
        .limit(1)
        .build_select(&descriptor.column_names())?;
    Ok(query.into())
}

/// `SELECT <columns> FROM <table>`, ordered by identity when there is one.
pub fn select_all(descriptor: &EntityDescriptor, dialect: Dialect) -> Result<Statement, DataError> {
    let mut builder = QueryBuilder::new(descriptor.table(), dialect);
    if let Some(id_col) = descriptor.id_column() {
        builder = builder.order_by(id_col.column, true);
    }
    Ok(builder.build_select(&descriptor.column_names())?.into())
}

/// INSERT of one entity.
///
/// With `include_id == false` the identity column is left to the database
/// and, where the dialect supports it, returned with `RETURNING`.
pub fn insert(
    descriptor: &EntityDescriptor,
    dialect: Dialect,
    values: &[Value],
    include_id: bool,
) -> Result<Statement, DataError> {
    let table = dialect.quote(descriptor.table(), "table")?;
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut statement = Statement::new(String::new());
    for (column, value) in descriptor.columns().iter().zip(values) {
        if column.id && !include_id {
            continue;
        }
        columns.push(dialect.quote(column.column, "column")?);
        statement.bind_typed(value.clone(), column.column_type);
        placeholders.push(dialect.placeholder(statement.binds.len()));
    }

    statement.sql = if columns.is_empty() {
        match dialect {
            Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
            Dialect::Sqlite | Dialect::Postgres => format!("INSERT INTO {table} DEFAULT VALUES"),
        }
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    if !include_id && dialect.supports_returning() {
        let id_col = dialect.quote(id_column(descriptor)?.column, "column")?;
        statement.sql.push_str(&format!(" RETURNING {id_col}"));
    }
    Ok(statement)
}

/// UPDATE of every non-identity column, keyed by identity.
pub fn update(
    descriptor: &EntityDescriptor,
    dialect: Dialect,
    values: &[Value],
) -> Result<Statement, DataError> {
    let table = dialect.quote(descriptor.table(), "table")?;
    let id_col = id_column(descriptor)?;
    let mut assignments = Vec::new();
    let mut statement = Statement::new(String::new());
    let mut id_value = Value::Null;
    for (column, value) in descriptor.columns().iter().zip(values) {
        if column.id {
            id_value = value.clone();
            continue;
        }
        let quoted = dialect.quote(column.column, "column")?;
        statement.bind_typed(value.clone(), column.column_type);
        assignments.push(format!("{quoted} = {}", dialect.placeholder(statement.binds.len())));
    }
    let id_quoted = dialect.quote(id_col.column, "column")?;
    if assignments.is_empty() {
        // Nothing to set; a no-op assignment still reports whether the row exists.
        assignments.push(format!("{id_quoted} = {id_quoted}"));
    }
    statement.bind_typed(id_value, id_col.column_type);
    statement.sql = format!(
        "UPDATE {table} SET {} WHERE {id_quoted} = {}",
        assignments.join(", "),
        dialect.placeholder(statement.binds.len())
    );
    Ok(statement)
}

/// `DELETE FROM <table> WHERE <id> = ?`
pub fn delete(descriptor: &EntityDescriptor, dialect: Dialect, id: Value) -> Result<Statement, DataError> {
    let table = dialect.quote(descriptor.table(), "table")?;
    let id_col = id_column(descriptor)?;
    let id_quoted = dialect.quote(id_col.column, "column")?;
    let mut statement = Statement::new(format!(
        "DELETE FROM {table} WHERE {id_quoted} = {}",
        dialect.placeholder(1)
    ));
    statement.bind_typed(id, id_col.column_type);
    Ok(statement)
}

fn column_definition(column: &ColumnDescriptor, dialect: Dialect) -> Result<String, QueryError> {
    let name = dialect.quote(column.column, "column")?;
    let sql_type = dialect.column_type(column.column_type, column.id);
    if column.id {
        let auto = column.generated && column.column_type == ColumnType::Integer;
        return Ok(match (dialect, auto) {
            (Dialect::Sqlite, true) => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
            (Dialect::Postgres, true) => format!("{name} BIGSERIAL PRIMARY KEY"),
            (Dialect::MySql, true) => format!("{name} BIGINT AUTO_INCREMENT PRIMARY KEY"),
            (_, false) => format!("{name} {sql_type} PRIMARY KEY"),
        });
    }
    if column.nullable {
        Ok(format!("{name} {sql_type}"))
    } else {
        Ok(format!("{name} {sql_type} NOT NULL"))
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a persistable type.
pub fn create_table(descriptor: &EntityDescriptor, dialect: Dialect) -> Result<String, DataError> {
    let table = dialect.quote(descriptor.table(), "table")?;
    let columns = descriptor
        .columns()
        .iter()
        .map(|c| column_definition(c, dialect))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    ))
}

/// `ALTER TABLE ... ADD COLUMN` for a column missing from an existing table.
///
/// Added columns are always nullable so existing rows stay valid.
pub fn add_column(
    descriptor: &EntityDescriptor,
    column: &ColumnDescriptor,
    dialect: Dialect,
) -> Result<String, DataError> {
    let table = dialect.quote(descriptor.table(), "table")?;
    let name = dialect.quote(column.column, "column")?;
    let sql_type = dialect.column_type(column.column_type, false);
    Ok(format!("ALTER TABLE {table} ADD COLUMN {name} {sql_type}"))
}

/// Query listing the column names of an existing table.
pub fn table_columns(table: &str, dialect: Dialect) -> Statement {
    let sql = match dialect {
        Dialect::Sqlite => "SELECT name FROM pragma_table_info(?)",
        Dialect::Postgres => {
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1"
        }
        Dialect::MySql => {
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
    };
    Statement::new(sql).bind(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Marker;

    fn user() -> EntityDescriptor {
        let col = |field, column_type, nullable, id| ColumnDescriptor {
            field,
            column: field,
            column_type,
            nullable,
            id,
            generated: id,
        };
        EntityDescriptor::new("app::entity::User", "users", Marker::Persistable)
            .column(col("id", ColumnType::Integer, false, true))
            .column(col("name", ColumnType::Text, false, false))
            .column(col("email", ColumnType::Text, true, false))
    }

    fn values() -> Vec<Value> {
        vec![Value::Int(0), Value::from("alice"), Value::Null]
    }

    #[test]
    fn insert_with_generated_id() {
        let st = insert(&user(), Dialect::Postgres, &values(), false).unwrap();
        assert_eq!(
            st.sql,
            "INSERT INTO \"users\" (\"name\", \"email\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(st.binds.len(), 2);
        assert_eq!(st.binds[1].value, Value::Null);
        assert_eq!(st.binds[1].column_type, Some(ColumnType::Text));

        let st = insert(&user(), Dialect::MySql, &values(), false).unwrap();
        assert_eq!(
            st.sql,
            "INSERT INTO `users` (`name`, `email`) VALUES (?, ?)"
        );
    }

    #[test]
    fn insert_with_explicit_id() {
        let mut vals = values();
        vals[0] = Value::Int(9);
        let st = insert(&user(), Dialect::Sqlite, &vals, true).unwrap();
        assert_eq!(
            st.sql,
            "INSERT INTO \"users\" (\"id\", \"name\", \"email\") VALUES (?, ?, ?)"
        );
        assert_eq!(st.binds[0].value, Value::Int(9));
    }

    #[test]
    fn update_binds_id_last() {
        let mut vals = values();
        vals[0] = Value::Int(4);
        let st = update(&user(), Dialect::Postgres, &vals).unwrap();
        assert_eq!(
            st.sql,
            "UPDATE \"users\" SET \"name\" = $1, \"email\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(st.binds[2].value, Value::Int(4));
    }

    #[test]
    fn delete_by_id() {
        let st = delete(&user(), Dialect::MySql, Value::Int(4)).unwrap();
        assert_eq!(st.sql, "DELETE FROM `users` WHERE `id` = ?");
    }

    #[test]
    fn select_by_id_limits_to_one() {
        let st = select_by_id(&user(), Dialect::Sqlite, Value::Int(1)).unwrap();
        assert_eq!(
            st.sql,
            "SELECT \"id\", \"name\", \"email\" FROM \"users\" WHERE \"id\" = ? LIMIT 1"
        );
    }

    #[test]
    fn ddl() {
        assert_eq!(
            create_table(&user(), Dialect::Sqlite).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL, \"email\" TEXT)"
        );
        assert_eq!(
            create_table(&user(), Dialect::Postgres).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" BIGSERIAL PRIMARY KEY, \"name\" TEXT NOT NULL, \"email\" TEXT)"
        );
        let d = user();
        let email = d.resolve("email").unwrap();
        assert_eq!(
            add_column(&d, email, Dialect::MySql).unwrap(),
            "ALTER TABLE `users` ADD COLUMN `email` TEXT"
        );
    }

    #[test]
    fn missing_identity_is_configuration_error() {
        let d = EntityDescriptor::new("app::entity::Address", "address", Marker::Embeddable);
        let err = delete(&d, Dialect::Sqlite, Value::Int(1)).unwrap_err();
        assert!(err.is_configuration());
    }
}
