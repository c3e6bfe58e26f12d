//! Dormouse: a lightweight data-access layer over SQLx.
//!
//! This facade crate re-exports the Dormouse sub-crates through a single
//! dependency. Import everything you need with:
//!
//! ```ignore
//! use dormouse::prelude::*;
//! ```
//!
//! # Overview
//!
//! 1. Mark persistable types with `#[derive(Entity)]` (fragments with
//!    `#[derive(Mapped)]`) and register them in a [`TypeRegistry`].
//! 2. Describe the connection with a [`ConnectionProfile`] and hand it a
//!    [`LoadingContext`] (usually a [`ClassPath`]) to discover types from.
//! 3. [`bootstrap`] builds the [`SessionFactory`] and installs it
//!    process-wide; the [`orm`] functions run against it.
//!
//! ```ignore
//! #[derive(Debug, Clone, Entity)]
//! #[entity(table = "users")]
//! pub struct User {
//!     pub id: i64,
//!     pub name: String,
//!     pub email: Option<String>,
//! }
//!
//! let class_path = ClassPath::new(TypeRegistry::new().with::<User>()).directory("target/units");
//! bootstrap(
//!     ConnectionProfile::new()
//!         .driver(DriverKind::Sqlite)
//!         .address("app.db")
//!         .loading_context(Arc::new(class_path)),
//! )
//! .await?;
//!
//! let alice = orm::upsert(User { id: 0, name: "alice".into(), email: None }).await?;
//! let same: Option<User> = orm::find_one_by_predicates(&predicates! { "name" => "alice" }).await?;
//! assert!(orm::delete(&alice).await);
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Driver                            |
//! |------------|---------|-----------------------------------|
//! | `sqlite`   | **yes** | `dormouse-data-sqlx/sqlite`       |
//! | `postgres` | no      | `dormouse-data-sqlx/postgres`     |
//! | `mysql`    | no      | `dormouse-data-sqlx/mysql`        |

// The derive macros use `proc-macro-crate` to detect whether the user depends
// on `dormouse` (facade) or `dormouse-data`, and generate paths to the
// `entity` and `value` modules of whichever they find.
pub extern crate dormouse_core;
pub extern crate dormouse_data;
pub extern crate dormouse_data_sqlx;
pub extern crate dormouse_macros;

pub use dormouse_core::{init_tracing, ConfigError, ConfigValue, DormouseConfig, FromConfigValue};
pub use dormouse_data::{
    discover, discovery, entity, predicate, predicates, query, registry, resolve_root_package,
    statement, value, ClassPath, Dialect, ColumnDescriptor, ColumnType, DataError, DiscoveredTypes,
    DiscoveryError, Entity, EntityDescriptor, FieldType, FromValue, LoadingContext, Mapped, Marker,
    PredicateMap, QueryBuilder, Record, Repository, ResourceRoot, TypeDescriptor, TypeRegistry, Value,
    ValueError,
};
pub use dormouse_data_sqlx::{
    bootstrap, build_session_factory, orm, ConnectionProfile, DriverKind, Metadata, SchemaPolicy,
    SessionFactory, Settings, SqlxErrorExt, SqlxRepository, Statistics, UnitOfWork,
};
pub use dormouse_macros::{Entity, Mapped};

pub mod prelude {
    //! Re-exports of the most commonly used types and macros.
    pub use crate::{
        bootstrap, build_session_factory, orm, predicates, ClassPath, ConnectionProfile,
        DataError, DriverKind, Entity, LoadingContext, Mapped, PredicateMap, Repository,
        SessionFactory, SqlxRepository, TypeRegistry, Value,
    };
}
