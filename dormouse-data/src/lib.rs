pub mod discovery;
pub mod entity;
pub mod error;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod repository;
pub mod statement;
pub mod value;

pub use discovery::{
    discover, resolve_root_package, ClassPath, DiscoveredTypes, DiscoveryError, LoadingContext,
    ResourceRoot,
};
pub use entity::{ColumnDescriptor, Entity, EntityDescriptor, Mapped, Marker, Record};
pub use error::DataError;
pub use predicate::PredicateMap;
pub use query::{Dialect, QueryBuilder, QueryError};
pub use registry::{TypeDescriptor, TypeRegistry};
pub use repository::Repository;
pub use statement::{Bind, Statement};
pub use value::{ColumnType, FieldType, FromValue, Value, ValueError};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        ClassPath, DataError, Entity, LoadingContext, Mapped, PredicateMap, Repository,
        TypeRegistry, Value,
    };
}
