use crate::entity::Entity;
use crate::error::DataError;
use crate::predicate::PredicateMap;
use crate::value::Value;
use std::future::Future;

/// Generic async repository over one entity type.
///
/// Uses RPITIT (return-position `impl Trait` in traits), so no `async-trait` is needed.
pub trait Repository<T>: Send + Sync
where
    T: Entity,
{
    fn find_by_key(&self, key: Value) -> impl Future<Output = Result<Option<T>, DataError>> + Send;
    fn find_all(&self) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;
    fn find_one_by(&self, predicates: &PredicateMap) -> impl Future<Output = Result<Option<T>, DataError>> + Send;
    fn find_list_by(&self, predicates: &PredicateMap) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;
    fn save(&self, entity: T) -> impl Future<Output = Result<T, DataError>> + Send;
    /// `false` when nothing was deleted, for whatever reason.
    fn delete(&self, entity: &T) -> impl Future<Output = bool> + Send;
}
