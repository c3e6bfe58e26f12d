//! Turning a [`ConnectionProfile`] into a ready [`SessionFactory`].

use std::sync::Arc;

use dormouse_data::{discover, resolve_root_package, DataError, Dialect, DiscoveryError, LoadingContext};
use sqlx::{AnyPool, Connection};
use tracing::{debug, info};

use crate::error::SqlxErrorExt;
use crate::factory::{connect, connect_one, is_in_memory, Metadata, SessionFactory};
use crate::profile::{keys, ConnectionProfile, SchemaPolicy, Settings};
use crate::{orm, schema};

/// Root package to scan: the explicit one, else the entity sub-package of
/// the base package, else `None` for heuristic scanning.
fn root_package(
    context: &dyn LoadingContext,
    root: Option<&str>,
    base: Option<&str>,
) -> Result<Option<String>, DiscoveryError> {
    if let Some(root) = root.map(str::trim).filter(|r| !r.is_empty()) {
        return Ok(Some(root.to_string()));
    }
    match base.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => resolve_root_package(context, base).map(Some),
        None => Ok(None),
    }
}

fn scan(
    context: Arc<dyn LoadingContext>,
    root: Option<String>,
    base: Option<String>,
) -> Result<Metadata, DiscoveryError> {
    let root = root_package(context.as_ref(), root.as_deref(), base.as_deref())?;
    let discovered = discover(Some(context.as_ref()), root.as_deref())?;
    Ok(Metadata::from_discovered(&discovered))
}

/// Apply `policy`, then open the pool the factory keeps.
///
/// A SQLite connection keeps the schema it read when it was opened, so
/// tables are altered on a connection of their own that is closed before
/// any pooled connection exists. An in-memory database has a single pooled
/// connection and is updated through it.
async fn open_pool(
    settings: &Settings,
    metadata: &Metadata,
    dialect: Dialect,
    policy: SchemaPolicy,
) -> Result<AnyPool, DataError> {
    if policy == SchemaPolicy::None {
        debug!("Schema policy is `none`, leaving tables untouched");
        return connect(settings).await;
    }
    if is_in_memory(settings) {
        let pool = connect(settings).await?;
        let mut conn = pool.acquire().await.map_err(SqlxErrorExt::into_data_error)?;
        schema::update(&mut conn, metadata, dialect).await?;
        drop(conn);
        return Ok(pool);
    }
    let mut conn = connect_one(settings).await?;
    schema::update(&mut conn, metadata, dialect).await?;
    conn.close().await.map_err(SqlxErrorExt::into_data_error)?;
    connect(settings).await
}

/// Build a session factory without installing it.
///
/// 1. validate the profile and render its settings;
/// 2. discover mapped types through the profile's loading context (on a
///    blocking thread, the scan touches the filesystem);
/// 3. add the profile's extra entity types;
/// 4. apply the schema policy and open the pool.
///
/// Nothing connects to the database before steps 1 and 2 succeed.
pub async fn build_session_factory(profile: ConnectionProfile) -> Result<SessionFactory, DataError> {
    let settings = profile.settings()?;
    let driver = profile
        .driver
        .ok_or_else(|| DataError::configuration("database driver is not set"))?;
    let context = profile
        .loading_context
        .clone()
        .ok_or(DiscoveryError::MissingContext)?;

    let root = profile.root_package.clone();
    let base = profile.base_package.clone();
    let mut metadata = tokio::task::spawn_blocking(move || scan(context, root, base))
        .await
        .map_err(DataError::database)??;
    for extra in &profile.extra_entities {
        if let Some(descriptor) = extra.mapping() {
            debug!(entity = descriptor.name(), "Adding extra entity");
            metadata.insert(descriptor);
        }
    }

    let policy = match settings.get(keys::SCHEMA_POLICY) {
        Some(raw) => raw.parse::<SchemaPolicy>()?,
        None => SchemaPolicy::default(),
    };
    let pool = open_pool(&settings, &metadata, driver.dialect(), policy).await?;

    info!(
        driver = %driver,
        entities = metadata.len(),
        persistable = metadata.persistable().count(),
        "Session factory ready"
    );
    Ok(SessionFactory::new(pool, driver, metadata, settings))
}

/// Build a session factory and install it as the process-wide factory.
///
/// A previously installed factory is replaced; calls already running keep
/// the handle they started with.
pub async fn bootstrap(profile: ConnectionProfile) -> Result<SessionFactory, DataError> {
    let factory = build_session_factory(profile).await?;
    orm::install(factory.clone());
    Ok(factory)
}
