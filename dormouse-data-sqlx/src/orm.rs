//! Process-wide session factory and the executor operations bound to it.
//!
//! ```ignore
//! dormouse_data_sqlx::bootstrap(profile).await?;
//!
//! let user: Option<User> = orm::find_by_key(7).await?;
//! let admins: Vec<User> = orm::find_list_by_field("role", "admin").await?;
//! ```

use std::sync::{PoisonError, RwLock};

use dormouse_data::{DataError, Entity, PredicateMap, Value};
use tracing::{debug, warn};

use crate::factory::SessionFactory;

static FACTORY: RwLock<Option<SessionFactory>> = RwLock::new(None);

/// Install `factory` as the process-wide factory and return the one it
/// replaces. The replaced pool is left open for its remaining holders.
pub fn install(factory: SessionFactory) -> Option<SessionFactory> {
    let mut slot = FACTORY.write().unwrap_or_else(PoisonError::into_inner);
    let previous = slot.replace(factory);
    if previous.is_some() {
        warn!("Replacing the installed session factory");
    } else {
        debug!("Session factory installed");
    }
    previous
}

/// Remove the installed factory, if any.
pub fn uninstall() -> Option<SessionFactory> {
    FACTORY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

pub fn is_installed() -> bool {
    FACTORY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Handle to the installed factory.
pub fn current() -> Result<SessionFactory, DataError> {
    FACTORY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| DataError::configuration("no session factory installed; call bootstrap first"))
}

pub async fn find_by_key<T: Entity>(key: impl Into<Value>) -> Result<Option<T>, DataError> {
    current()?.find_by_key(key).await
}

pub async fn find_one_by_field<T: Entity>(
    field: &str,
    value: impl Into<Value>,
) -> Result<Option<T>, DataError> {
    current()?.find_one_by_field(field, value).await
}

pub async fn find_one_by_predicates<T: Entity>(
    predicates: &PredicateMap,
) -> Result<Option<T>, DataError> {
    current()?.find_one_by_predicates(predicates).await
}

pub async fn find_all<T: Entity>() -> Result<Vec<T>, DataError> {
    current()?.find_all().await
}

pub async fn find_list_by_field<T: Entity>(
    field: &str,
    value: impl Into<Value>,
) -> Result<Vec<T>, DataError> {
    current()?.find_list_by_field(field, value).await
}

pub async fn find_list_by_predicates<T: Entity>(
    predicates: &PredicateMap,
) -> Result<Vec<T>, DataError> {
    current()?.find_list_by_predicates(predicates).await
}

pub async fn upsert<T: Entity>(entity: T) -> Result<T, DataError> {
    current()?.upsert(entity).await
}

/// `false` as well when no factory is installed.
pub async fn delete<T: Entity>(entity: &T) -> bool {
    match current() {
        Ok(factory) => factory.delete(entity).await,
        Err(err) => {
            debug!(error = %err, "Delete skipped");
            false
        }
    }
}

pub async fn find_one_by_sql<T: Entity>(sql: &str, params: Vec<Value>) -> Result<Option<T>, DataError> {
    current()?.find_one_by_sql(sql, params).await
}

pub async fn find_list_by_sql<T: Entity>(sql: &str, params: Vec<Value>) -> Result<Vec<T>, DataError> {
    current()?.find_list_by_sql(sql, params).await
}

pub async fn execute_sql(sql: &str, params: Vec<Value>) -> Result<u64, DataError> {
    current()?.execute_sql(sql, params).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_installed_is_a_configuration_error() {
        assert!(!is_installed());
        assert!(current().unwrap_err().is_configuration());
        assert!(uninstall().is_none());
    }
}
