//! Schema policy: create missing tables and add missing columns.

use std::collections::HashSet;

use dormouse_data::statement::{self, Statement};
use dormouse_data::{DataError, Dialect, EntityDescriptor};
use sqlx::AnyConnection;
use tracing::{debug, info};

use crate::error::SqlxErrorExt;
use crate::factory::Metadata;
use crate::row::{bind_all, decode_name};

async fn existing_columns(
    conn: &mut AnyConnection,
    descriptor: &EntityDescriptor,
    dialect: Dialect,
) -> Result<HashSet<String>, DataError> {
    let Statement { sql, binds } = statement::table_columns(descriptor.table(), dialect);
    let rows = bind_all(sqlx::query(&sql), binds)
        .fetch_all(&mut *conn)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    rows.iter()
        .map(|row| decode_name(row).map(|name| name.to_ascii_lowercase()))
        .collect()
}

async fn update_table(
    conn: &mut AnyConnection,
    descriptor: &EntityDescriptor,
    dialect: Dialect,
) -> Result<(), DataError> {
    let create = statement::create_table(descriptor, dialect)?;
    sqlx::query(&create)
        .execute(&mut *conn)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

    let existing = existing_columns(conn, descriptor, dialect).await?;
    for column in descriptor.columns() {
        if existing.contains(&column.column.to_ascii_lowercase()) {
            continue;
        }
        let alter = statement::add_column(descriptor, column, dialect)?;
        info!(table = descriptor.table(), column = column.column, "Adding missing column");
        sqlx::query(&alter)
            .execute(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
    }
    Ok(())
}

/// Create the table of every persistable type and add the columns it is
/// missing. Nothing is ever dropped.
pub(crate) async fn update(
    conn: &mut AnyConnection,
    metadata: &Metadata,
    dialect: Dialect,
) -> Result<(), DataError> {
    for descriptor in metadata.persistable() {
        debug!(entity = descriptor.name(), table = descriptor.table(), "Updating table");
        update_table(conn, descriptor, dialect).await?;
    }
    Ok(())
}
