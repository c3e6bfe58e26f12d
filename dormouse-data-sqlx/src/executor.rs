//! Generic query and command execution against a [`SessionFactory`].
//!
//! Every operation runs in its own [`UnitOfWork`](crate::UnitOfWork): it is
//! committed when the operation succeeds and rolled back when it is dropped
//! on any other exit path.

use dormouse_data::statement::{self, Statement};
use dormouse_data::{
    ColumnDescriptor, ColumnType, DataError, Entity, EntityDescriptor, PredicateMap, QueryBuilder,
    Value,
};
use tracing::debug;

use crate::error::SqlxErrorExt;
use crate::factory::SessionFactory;
use crate::row::{bind_all, decode_entity, decode_scalar};
use crate::uow::UnitOfWork;

fn identity(descriptor: &'static EntityDescriptor) -> Result<&'static ColumnDescriptor, DataError> {
    descriptor.id_column().ok_or_else(|| {
        DataError::configuration(format!("`{}` has no identity column", descriptor.name()))
    })
}

fn resolve_field(
    descriptor: &'static EntityDescriptor,
    field: &str,
) -> Result<&'static ColumnDescriptor, DataError> {
    descriptor.resolve(field).ok_or_else(|| DataError::UnknownField {
        entity: descriptor.name().to_string(),
        field: field.to_string(),
    })
}

fn require_sql(sql: &str) -> Result<(), DataError> {
    if sql.trim().is_empty() {
        return Err(DataError::configuration("native SQL must not be blank"));
    }
    Ok(())
}

fn native(sql: &str, params: Vec<Value>) -> Statement {
    params
        .into_iter()
        .fold(Statement::new(sql), |statement, value| statement.bind(value))
}

/// Lowest identity first, at most one row.
fn first_row(
    builder: QueryBuilder,
    descriptor: &'static EntityDescriptor,
) -> Result<Statement, DataError> {
    let id = identity(descriptor)?;
    let query = builder
        .order_by(id.column, true)
        .limit(1)
        .build_select(&descriptor.column_names())?;
    Ok(query.into())
}

fn every_row(
    builder: QueryBuilder,
    descriptor: &'static EntityDescriptor,
) -> Result<Statement, DataError> {
    let id = identity(descriptor)?;
    let query = builder
        .order_by(id.column, true)
        .build_select(&descriptor.column_names())?;
    Ok(query.into())
}

impl SessionFactory {
    async fn fetch_optional<T: Entity>(&self, statement: Statement) -> Result<Option<T>, DataError> {
        let Statement { sql, binds } = statement;
        let mut uow = self.begin().await?;
        debug!(sql = %sql, binds = binds.len(), "Executing query");
        self.statistics().record_statement();
        let row = bind_all(sqlx::query(&sql), binds)
            .fetch_optional(uow.as_mut())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        let entity = row.as_ref().map(decode_entity::<T>).transpose()?;
        uow.commit().await?;
        Ok(entity)
    }

    async fn fetch_all<T: Entity>(&self, statement: Statement) -> Result<Vec<T>, DataError> {
        let Statement { sql, binds } = statement;
        let mut uow = self.begin().await?;
        debug!(sql = %sql, binds = binds.len(), "Executing query");
        self.statistics().record_statement();
        let rows = bind_all(sqlx::query(&sql), binds)
            .fetch_all(uow.as_mut())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        let entities = rows
            .iter()
            .map(decode_entity::<T>)
            .collect::<Result<Vec<_>, _>>()?;
        uow.commit().await?;
        Ok(entities)
    }

    async fn execute_in(&self, uow: &mut UnitOfWork, statement: Statement) -> Result<u64, DataError> {
        let Statement { sql, binds } = statement;
        debug!(sql = %sql, binds = binds.len(), "Executing statement");
        self.statistics().record_statement();
        let result = bind_all(sqlx::query(&sql), binds)
            .execute(uow.as_mut())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }

    /// Row of `T` whose identity equals `key`, or `None`.
    pub async fn find_by_key<T: Entity>(&self, key: impl Into<Value>) -> Result<Option<T>, DataError> {
        let descriptor = self.mapping_of::<T>()?;
        let statement = statement::select_by_id(descriptor, self.dialect(), key.into())?;
        self.fetch_optional(statement).await
    }

    /// First row of `T` whose `field` equals `value`.
    ///
    /// A blank field name or a `NULL` value returns `None` without touching
    /// the database. `field` is a field name or a column name.
    pub async fn find_one_by_field<T: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<T>, DataError> {
        let value = value.into();
        if field.trim().is_empty() || value.is_null() {
            return Ok(None);
        }
        let descriptor = self.mapping_of::<T>()?;
        let column = resolve_field(descriptor, field)?;
        let builder = QueryBuilder::new(descriptor.table(), self.dialect()).where_eq(column.column, value);
        self.fetch_optional(first_row(builder, descriptor)?).await
    }

    /// First row of `T` matching every predicate, lowest identity first.
    ///
    /// An empty map returns `None` without querying.
    pub async fn find_one_by_predicates<T: Entity>(
        &self,
        predicates: &PredicateMap,
    ) -> Result<Option<T>, DataError> {
        if predicates.is_empty() {
            return Ok(None);
        }
        let descriptor = self.mapping_of::<T>()?;
        let builder = predicates.to_query(descriptor, self.dialect())?;
        self.fetch_optional(first_row(builder, descriptor)?).await
    }

    /// Every row of `T`, ordered by identity.
    pub async fn find_all<T: Entity>(&self) -> Result<Vec<T>, DataError> {
        let descriptor = self.mapping_of::<T>()?;
        let statement = statement::select_all(descriptor, self.dialect())?;
        self.fetch_all(statement).await
    }

    /// Every row of `T` whose `field` equals `value`.
    ///
    /// A blank field name or a `NULL` value yields an empty list without
    /// querying.
    pub async fn find_list_by_field<T: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<T>, DataError> {
        let value = value.into();
        if field.trim().is_empty() || value.is_null() {
            return Ok(Vec::new());
        }
        let descriptor = self.mapping_of::<T>()?;
        let column = resolve_field(descriptor, field)?;
        let builder = QueryBuilder::new(descriptor.table(), self.dialect()).where_eq(column.column, value);
        self.fetch_all(every_row(builder, descriptor)?).await
    }

    /// Every row of `T` matching every predicate. An empty map returns all
    /// rows, unlike [`find_one_by_predicates`](Self::find_one_by_predicates).
    pub async fn find_list_by_predicates<T: Entity>(
        &self,
        predicates: &PredicateMap,
    ) -> Result<Vec<T>, DataError> {
        if predicates.is_empty() {
            return self.find_all::<T>().await;
        }
        let descriptor = self.mapping_of::<T>()?;
        let builder = predicates.to_query(descriptor, self.dialect())?;
        self.fetch_all(every_row(builder, descriptor)?).await
    }

    /// Insert `entity` when its identity is unset, update it otherwise.
    ///
    /// A generated identity is written back into the returned entity. An
    /// update that touches no row inserts the entity with its identity.
    pub async fn upsert<T: Entity>(&self, mut entity: T) -> Result<T, DataError> {
        let descriptor = self.mapping_of::<T>()?;
        let id_column = identity(descriptor)?;
        let dialect = self.dialect();
        let id = entity.id();
        let values = entity.to_values();

        if id.is_unset_identity() {
            if !id_column.generated {
                return Err(DataError::configuration(format!(
                    "`{}` has no identity value and `{}` is not generated",
                    descriptor.name(),
                    id_column.column
                )));
            }
            let Statement { sql, binds } = statement::insert(descriptor, dialect, &values, false)?;
            let mut uow = self.begin().await?;
            debug!(entity = descriptor.name(), sql = %sql, "Inserting");
            self.statistics().record_statement();
            let query = bind_all(sqlx::query(&sql), binds);
            let generated = if dialect.supports_returning() {
                let row = query
                    .fetch_one(uow.as_mut())
                    .await
                    .map_err(SqlxErrorExt::into_data_error)?;
                decode_scalar(&row, id_column.column_type)?
            } else {
                let result = query
                    .execute(uow.as_mut())
                    .await
                    .map_err(SqlxErrorExt::into_data_error)?;
                result.last_insert_id().map(Value::Int).ok_or_else(|| {
                    DataError::configuration("the driver did not report the generated identity")
                })?
            };
            entity.set_id(generated)?;
            uow.commit().await?;
            return Ok(entity);
        }

        let update = statement::update(descriptor, dialect, &values)?;
        let mut uow = self.begin().await?;
        debug!(entity = descriptor.name(), id = %id, "Updating");
        if self.execute_in(&mut uow, update).await? == 0 {
            // Some engines report zero for an update that changed nothing,
            // so check the row is really absent before inserting.
            let count: Statement = QueryBuilder::new(descriptor.table(), dialect)
                .where_eq(id_column.column, id.clone())
                .build_count()?
                .into();
            let Statement { sql, binds } = count;
            self.statistics().record_statement();
            let row = bind_all(sqlx::query(&sql), binds)
                .fetch_one(uow.as_mut())
                .await
                .map_err(SqlxErrorExt::into_data_error)?;
            let present = !matches!(decode_scalar(&row, ColumnType::Integer)?, Value::Int(0));
            if !present {
                debug!(entity = descriptor.name(), id = %id, "No row to update, inserting");
                let insert = statement::insert(descriptor, dialect, &values, true)?;
                self.execute_in(&mut uow, insert).await?;
            }
        }
        uow.commit().await?;
        Ok(entity)
    }

    /// Delete the row of `entity`.
    ///
    /// Returns `true` only when a row was removed. Failures are logged at
    /// debug level and reported as `false`.
    pub async fn delete<T: Entity>(&self, entity: &T) -> bool {
        let name = T::descriptor().name();
        match self.try_delete(entity).await {
            Ok(0) => {
                debug!(entity = name, id = %entity.id(), "Delete removed no row");
                false
            }
            Ok(_) => true,
            Err(err) => {
                debug!(entity = name, error = %err, "Delete failed");
                false
            }
        }
    }

    async fn try_delete<T: Entity>(&self, entity: &T) -> Result<u64, DataError> {
        let descriptor = self.mapping_of::<T>()?;
        let id = entity.id();
        if id.is_unset_identity() {
            return Ok(0);
        }
        let statement = statement::delete(descriptor, self.dialect(), id)?;
        let mut uow = self.begin().await?;
        let removed = self.execute_in(&mut uow, statement).await?;
        uow.commit().await?;
        Ok(removed)
    }

    /// First row of a native query, decoded as `T`.
    ///
    /// Placeholders follow the driver (`?` or `$n`). Columns are matched to
    /// fields by column name.
    pub async fn find_one_by_sql<T: Entity>(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>, DataError> {
        require_sql(sql)?;
        self.mapping_of::<T>()?;
        self.fetch_optional(native(sql, params)).await
    }

    /// Every row of a native query, decoded as `T`.
    pub async fn find_list_by_sql<T: Entity>(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<T>, DataError> {
        require_sql(sql)?;
        self.mapping_of::<T>()?;
        self.fetch_all(native(sql, params)).await
    }

    /// Run a native statement and return the number of rows it affected.
    pub async fn execute_sql(&self, sql: &str, params: Vec<Value>) -> Result<u64, DataError> {
        require_sql(sql)?;
        let mut uow = self.begin().await?;
        let affected = self.execute_in(&mut uow, native(sql, params)).await?;
        uow.commit().await?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_native_sql_is_rejected() {
        assert!(require_sql("  ").unwrap_err().is_configuration());
        assert!(require_sql("SELECT 1").is_ok());
    }

    #[test]
    fn native_statement_binds_in_order() {
        let st = native("SELECT * FROM t WHERE a = ? AND b = ?", vec![Value::Int(1), Value::from("x")]);
        assert_eq!(st.binds.len(), 2);
        assert_eq!(st.binds[0].value, Value::Int(1));
        assert_eq!(st.binds[1].value, Value::from("x"));
    }
}
