use std::marker::PhantomData;

use dormouse_data::{DataError, Entity, PredicateMap, Repository, Value};

use crate::factory::SessionFactory;

/// A typed repository over one entity type.
///
/// Wraps a [`SessionFactory`] handle; every call is its own unit of work.
///
/// # Example
///
/// ```ignore
/// let users = SqlxRepository::<User>::new(factory.clone());
/// let alice = users.save(User { id: 0, name: "alice".into() }).await?;
/// ```
pub struct SqlxRepository<T> {
    factory: SessionFactory,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> SqlxRepository<T> {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            _marker: PhantomData,
        }
    }

    /// Repository bound to the installed process-wide factory.
    pub fn installed() -> Result<Self, DataError> {
        crate::orm::current().map(Self::new)
    }

    /// Get the underlying factory reference.
    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }
}

impl<T> Clone for SqlxRepository<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> for SqlxRepository<T> {
    async fn find_by_key(&self, key: Value) -> Result<Option<T>, DataError> {
        self.factory.find_by_key(key).await
    }

    async fn find_all(&self) -> Result<Vec<T>, DataError> {
        self.factory.find_all().await
    }

    async fn find_one_by(&self, predicates: &PredicateMap) -> Result<Option<T>, DataError> {
        self.factory.find_one_by_predicates(predicates).await
    }

    async fn find_list_by(&self, predicates: &PredicateMap) -> Result<Vec<T>, DataError> {
        self.factory.find_list_by_predicates(predicates).await
    }

    async fn save(&self, entity: T) -> Result<T, DataError> {
        self.factory.upsert(entity).await
    }

    async fn delete(&self, entity: &T) -> bool {
        self.factory.delete(entity).await
    }
}
