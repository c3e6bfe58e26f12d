use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dormouse_data::{DataError, DiscoveredTypes, Dialect, EntityDescriptor, Mapped};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool, Connection, Executor};
use tracing::debug;

use crate::error::SqlxErrorExt;
use crate::profile::{keys, DriverKind, Settings};
use crate::uow::UnitOfWork;

/// Mapping metadata of every type a factory knows about, keyed by
/// qualified name.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entities: BTreeMap<String, &'static EntityDescriptor>,
}

impl Metadata {
    pub fn from_discovered(discovered: &DiscoveredTypes) -> Self {
        let mut metadata = Metadata::default();
        for descriptor in discovered.mappings() {
            metadata.insert(descriptor);
        }
        metadata
    }

    pub fn insert(&mut self, descriptor: &'static EntityDescriptor) {
        self.entities.insert(descriptor.name().to_string(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&'static EntityDescriptor> {
        self.entities.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        self.entities.values().copied()
    }

    /// Types that get a table of their own.
    pub fn persistable(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        self.iter().filter(|d| d.is_persistable())
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Default)]
pub struct Statistics {
    units_opened: AtomicU64,
    statements: AtomicU64,
}

impl Statistics {
    /// Units of work (transactions) begun by this factory.
    pub fn units_opened(&self) -> u64 {
        self.units_opened.load(Ordering::Relaxed)
    }

    pub fn statements_executed(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub(crate) fn record_unit(&self) {
        self.units_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }
}

struct Inner {
    pool: AnyPool,
    driver: DriverKind,
    metadata: Metadata,
    settings: Settings,
    statistics: Statistics,
}

/// Handle to a connection pool plus the mapping metadata built at
/// bootstrap. Cheap to clone; every clone shares the same pool.
#[derive(Clone)]
pub struct SessionFactory {
    inner: Arc<Inner>,
}

impl SessionFactory {
    pub(crate) fn new(pool: AnyPool, driver: DriverKind, metadata: Metadata, settings: Settings) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                driver,
                metadata,
                settings,
                statistics: Statistics::default(),
            }),
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.inner.pool
    }

    pub fn driver(&self) -> DriverKind {
        self.inner.driver
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.driver.dialect()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn statistics(&self) -> &Statistics {
        &self.inner.statistics
    }

    /// Whether both handles point at the same factory.
    pub fn same_as(&self, other: &SessionFactory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Begin a unit of work. It commits through [`UnitOfWork::commit`] and
    /// rolls back when dropped.
    pub async fn begin(&self) -> Result<UnitOfWork, DataError> {
        self.inner.statistics.record_unit();
        UnitOfWork::begin(&self.inner.pool).await
    }

    /// Close the pool. In-flight units of work finish first.
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }

    /// Mapping of `T`, provided this factory maps it as a persistable type.
    pub fn mapping_of<T: Mapped>(&self) -> Result<&'static EntityDescriptor, DataError> {
        let name = T::descriptor().name();
        match self.inner.metadata.get(name) {
            Some(descriptor) if descriptor.is_persistable() => Ok(descriptor),
            _ => Err(DataError::Unmapped(name.to_string())),
        }
    }
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory")
            .field("driver", &self.inner.driver)
            .field("entities", &self.inner.metadata.len())
            .field("statistics", &self.inner.statistics)
            .finish()
    }
}

/// Statements run on every new pooled connection.
fn session_statements(settings: &Settings) -> Result<Vec<String>, DataError> {
    let mut statements = Vec::new();
    if let Some(mode) = settings.get(keys::SQLITE_JOURNAL_MODE) {
        statements.push(format!("PRAGMA journal_mode = {}", setting_word(keys::SQLITE_JOURNAL_MODE, mode)?));
    }
    if let Some(sync) = settings.get(keys::SQLITE_SYNCHRONOUS) {
        statements.push(format!("PRAGMA synchronous = {}", setting_word(keys::SQLITE_SYNCHRONOUS, sync)?));
    }
    if let Some(charset) = settings.get(keys::CHARSET) {
        statements.push(format!("SET NAMES {}", setting_word(keys::CHARSET, charset)?));
    }
    Ok(statements)
}

/// Values spliced into session statements must be a single word.
fn setting_word<'a>(key: &str, value: &'a str) -> Result<&'a str, DataError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(value)
    } else {
        Err(DataError::configuration(format!(
            "setting `{key}` has an invalid value `{value}`"
        )))
    }
}

fn url(settings: &Settings) -> Result<&str, DataError> {
    settings
        .get(keys::URL)
        .ok_or_else(|| DataError::configuration("connection url is not set"))
}

/// An in-memory SQLite database lives only as long as its connection.
pub(crate) fn is_in_memory(settings: &Settings) -> bool {
    settings
        .get(keys::URL)
        .is_some_and(|url| url.starts_with("sqlite::memory:") || url.contains("mode=memory"))
}

/// Open a single connection outside any pool, with the same session
/// statements pooled connections get.
pub(crate) async fn connect_one(settings: &Settings) -> Result<AnyConnection, DataError> {
    sqlx::any::install_default_drivers();

    let mut conn = AnyConnection::connect(url(settings)?)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    for sql in session_statements(settings)? {
        (&mut conn)
            .execute(sql.as_str())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
    }
    Ok(conn)
}

/// Open the `Any` pool described by `settings`.
pub(crate) async fn connect(settings: &Settings) -> Result<AnyPool, DataError> {
    sqlx::any::install_default_drivers();

    let url = url(settings)?;
    let max_connections = match settings.get(keys::MAX_CONNECTIONS) {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            DataError::configuration(format!(
                "setting `{}` must be a positive integer, got `{raw}`",
                keys::MAX_CONNECTIONS
            ))
        })?,
        None => 10,
    };

    let statements = Arc::new(session_statements(settings)?);
    debug!(
        max_connections,
        session_statements = statements.len(),
        "Opening connection pool"
    );

    let mut options = AnyPoolOptions::new()
        .max_connections(max_connections.max(1))
        .test_before_acquire(settings.get_bool(keys::AUTO_RECONNECT));
    if !statements.is_empty() {
        options = options.after_connect(move |conn, _meta| {
            let statements = Arc::clone(&statements);
            Box::pin(async move {
                for sql in statements.iter() {
                    (&mut *conn).execute(sql.as_str()).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
        });
    }
    options.connect(url).await.map_err(SqlxErrorExt::into_data_error)
}
