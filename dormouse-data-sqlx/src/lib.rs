//! # dormouse-data-sqlx: SQLx backend for the Dormouse data layer
//!
//! This crate connects the engine-independent types of [`dormouse-data`]
//! to a real database through the [SQLx](https://github.com/launchbadge/sqlx)
//! `Any` driver, so the database is chosen at runtime from the profile.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionProfile`] | Typed connection options rendered to engine [`Settings`] |
//! | [`build_session_factory`] / [`bootstrap`] | Discovery + pool + schema policy, optionally installed process-wide |
//! | [`SessionFactory`] | Pool handle with mapping metadata and the query/command operations |
//! | [`orm`] | The process-wide factory slot and free functions bound to it |
//! | [`UnitOfWork`] | Transaction wrapper: commit explicitly, roll back on drop |
//! | [`SqlxRepository`] | `Repository<T>` implementation over a factory |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` into `DataError` (`.into_data_error()`) |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//! | `mysql`    | MySQL and MariaDB via `sqlx/mysql` |
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dormouse_data::{ClassPath, TypeRegistry};
//! use dormouse_data_sqlx::{bootstrap, orm, ConnectionProfile, DriverKind};
//!
//! let class_path = ClassPath::new(TypeRegistry::new().with::<User>()).directory("target/units");
//! let profile = ConnectionProfile::new()
//!     .driver(DriverKind::Sqlite)
//!     .address("app.db")
//!     .loading_context(Arc::new(class_path));
//! bootstrap(profile).await?;
//!
//! let saved = orm::upsert(User { id: 0, name: "alice".into() }).await?;
//! let found: Option<User> = orm::find_one_by_field("name", "alice").await?;
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead.

pub mod bootstrap;
pub mod error;
pub mod executor;
pub mod factory;
pub mod orm;
pub mod profile;
pub mod repository;
pub mod uow;

mod row;
mod schema;

pub use bootstrap::{bootstrap, build_session_factory};
pub use error::{SqlxErrorExt, SqlxResult};
pub use factory::{Metadata, SessionFactory, Statistics};
pub use profile::{ConnectionProfile, DriverKind, SchemaPolicy, Settings};
pub use repository::SqlxRepository;
pub use uow::UnitOfWork;

/// Re-exports of the most commonly used types from both `dormouse-data` and this crate.
pub mod prelude {
    pub use crate::{
        bootstrap, build_session_factory, orm, ConnectionProfile, DriverKind, SessionFactory,
        SqlxErrorExt, SqlxRepository, UnitOfWork,
    };
    pub use dormouse_data::prelude::*;
}
