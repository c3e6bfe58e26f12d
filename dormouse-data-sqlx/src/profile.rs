//! Connection profile: typed options turned into engine settings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dormouse_core::{DormouseConfig, FromConfigValue};
use dormouse_data::{DataError, Dialect, LoadingContext, Mapped, TypeDescriptor};

/// Setting keys produced by [`ConnectionProfile::settings`].
pub mod keys {
    pub const URL: &str = "connection.url";
    pub const DRIVER: &str = "connection.driver";
    pub const USERNAME: &str = "connection.username";
    pub const PASSWORD: &str = "connection.password";
    pub const AUTO_RECONNECT: &str = "connection.auto_reconnect";
    pub const CHARSET: &str = "connection.charset";
    pub const SCHEMA_POLICY: &str = "schema.policy";
    pub const MAX_CONNECTIONS: &str = "pool.max_connections";
    pub const SQLITE_JOURNAL_MODE: &str = "sqlite.journal_mode";
    pub const SQLITE_SYNCHRONOUS: &str = "sqlite.synchronous";
}

/// Config prefix read by [`ConnectionProfile::from_config`].
pub const CONFIG_PREFIX: &str = "dormouse.datasource";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Sqlite,
    Postgres,
    MySql,
    MariaDb,
}

impl DriverKind {
    /// Prefix the address is appended to when building the connection URL.
    pub fn url_prefix(self) -> &'static str {
        match self {
            DriverKind::Sqlite => "sqlite://",
            DriverKind::Postgres => "postgres://",
            // MariaDB speaks the MySQL protocol.
            DriverKind::MySql | DriverKind::MariaDb => "mysql://",
        }
    }

    pub fn driver_name(self) -> &'static str {
        match self {
            DriverKind::Sqlite => "sqlite",
            DriverKind::Postgres => "postgres",
            DriverKind::MySql => "mysql",
            DriverKind::MariaDb => "mariadb",
        }
    }

    pub fn dialect(self) -> Dialect {
        match self {
            DriverKind::Sqlite => Dialect::Sqlite,
            DriverKind::Postgres => Dialect::Postgres,
            DriverKind::MySql | DriverKind::MariaDb => Dialect::MySql,
        }
    }

    /// Whether the address names a server (and credentials go in the URL).
    pub fn is_network(self) -> bool {
        !matches!(self, DriverKind::Sqlite)
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

impl FromStr for DriverKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DriverKind::Sqlite),
            "postgres" | "postgresql" => Ok(DriverKind::Postgres),
            "mysql" => Ok(DriverKind::MySql),
            "mariadb" => Ok(DriverKind::MariaDb),
            other => Err(DataError::configuration(format!("unknown driver `{other}`"))),
        }
    }
}

/// What bootstrap does to the schema of the mapped tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Create missing tables and add missing columns. Never drops anything.
    #[default]
    Update,
    /// Leave the schema alone.
    None,
}

impl SchemaPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaPolicy::Update => "update",
            SchemaPolicy::None => "none",
        }
    }
}

impl FromStr for SchemaPolicy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(SchemaPolicy::Update),
            "none" => Ok(SchemaPolicy::None),
            other => Err(DataError::configuration(format!(
                "unknown schema policy `{other}` (expected `update` or `none`)"
            ))),
        }
    }
}

/// Ordered engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    entries: Vec<(String, String)>,
}

impl Settings {
    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Connection and mapping options for one session factory.
///
/// ```ignore
/// let profile = ConnectionProfile::new()
///     .driver(DriverKind::Postgres)
///     .address("db.internal:5432/shop")
///     .username("shop")
///     .password("secret")
///     .root_package("shop.entity")
///     .loading_context(Arc::new(class_path));
/// let factory = build_session_factory(profile).await?;
/// ```
#[derive(Clone, Default)]
pub struct ConnectionProfile {
    pub(crate) driver: Option<DriverKind>,
    pub(crate) address: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) auto_reconnect: bool,
    pub(crate) root_package: Option<String>,
    pub(crate) base_package: Option<String>,
    pub(crate) loading_context: Option<Arc<dyn LoadingContext>>,
    pub(crate) extra_entities: Vec<TypeDescriptor>,
    pub(crate) max_connections: Option<u32>,
    pub(crate) schema_policy: SchemaPolicy,
    pub(crate) overrides: Vec<(String, String)>,
}

impl ConnectionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(mut self, driver: DriverKind) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Server address (`host:port/database`) or SQLite file path.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Validate pooled connections before handing them out.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Package scanned exhaustively for mapped types.
    pub fn root_package(mut self, package: impl Into<String>) -> Self {
        self.root_package = Some(package.into());
        self
    }

    /// Package whose conventional entity sub-package is scanned when no
    /// root package is set.
    pub fn base_package(mut self, package: impl Into<String>) -> Self {
        self.base_package = Some(package.into());
        self
    }

    pub fn loading_context(mut self, context: Arc<dyn LoadingContext>) -> Self {
        self.loading_context = Some(context);
        self
    }

    /// Map `T` even if discovery does not find it.
    pub fn extra_entity<T: Mapped>(mut self) -> Self {
        self.extra_entities.push(TypeDescriptor::of::<T>());
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }

    /// Raw setting applied after every derived one.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    pub fn driver_kind(&self) -> Option<DriverKind> {
        self.driver
    }

    pub fn has_loading_context(&self) -> bool {
        self.loading_context.is_some()
    }

    /// Validate the profile and render engine settings.
    pub fn settings(&self) -> Result<Settings, DataError> {
        let driver = self
            .driver
            .ok_or_else(|| DataError::configuration("database driver is not set"))?;
        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| DataError::configuration("database address is not set"))?;

        let mut settings = Settings::default();
        settings.set(keys::URL, self.connection_url(driver, address)?);
        settings.set(keys::DRIVER, driver.driver_name());
        if let Some(username) = &self.username {
            settings.set(keys::USERNAME, username.as_str());
        }
        if let Some(password) = &self.password {
            settings.set(keys::PASSWORD, password.as_str());
        }
        settings.set(keys::AUTO_RECONNECT, self.auto_reconnect.to_string());
        settings.set(keys::SCHEMA_POLICY, self.schema_policy.as_str());

        let max_connections = if is_in_memory(driver, address) {
            1
        } else {
            self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
        };
        settings.set(keys::MAX_CONNECTIONS, max_connections.to_string());

        match driver {
            DriverKind::Sqlite => {
                settings.set(keys::SQLITE_JOURNAL_MODE, "WAL");
                settings.set(keys::SQLITE_SYNCHRONOUS, "NORMAL");
            }
            DriverKind::MySql | DriverKind::MariaDb => {
                settings.set(keys::CHARSET, "utf8mb4");
            }
            DriverKind::Postgres => {}
        }

        for (key, value) in &self.overrides {
            settings.set(key.as_str(), value.as_str());
        }
        Ok(settings)
    }

    fn connection_url(&self, driver: DriverKind, address: &str) -> Result<String, DataError> {
        if !driver.is_network() {
            if address == ":memory:" {
                return Ok("sqlite::memory:".to_string());
            }
            return Ok(format!("{}{address}?mode=rwc", driver.url_prefix()));
        }

        let raw = format!("{}{address}", driver.url_prefix());
        let mut url = url::Url::parse(&raw).map_err(|e| {
            DataError::configuration(format!("invalid database address `{address}`: {e}"))
        })?;
        if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|()| DataError::configuration("address cannot carry a username"))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password.as_str()))
                .map_err(|()| DataError::configuration("address cannot carry a password"))?;
        }
        Ok(url.into())
    }

    /// Build a profile from `dormouse.datasource.*` configuration keys.
    ///
    /// ```yaml
    /// dormouse:
    ///   datasource:
    ///     driver: postgres
    ///     address: localhost:5432/shop
    ///     username: shop
    ///     password: ${DB_PASSWORD}
    ///     root-package: shop.entity
    ///     settings:
    ///       pool.max_connections: 4
    /// ```
    ///
    /// The loading context and extra entities are code, not configuration;
    /// set them on the returned profile.
    pub fn from_config(config: &DormouseConfig) -> Result<Self, DataError> {
        let get = |key: &str| -> Result<Option<String>, DataError> {
            config
                .get_opt::<String>(&format!("{CONFIG_PREFIX}.{key}"))
                .map_err(|e| DataError::configuration(e.to_string()))
        };

        let mut profile = ConnectionProfile::new();
        if let Some(driver) = get("driver")? {
            profile = profile.driver(driver.parse()?);
        }
        if let Some(address) = get("address")? {
            profile = profile.address(address);
        }
        if let Some(username) = get("username")? {
            profile = profile.username(username);
        }
        if let Some(password) = get("password")? {
            profile = profile.password(password);
        }
        if let Some(package) = get("root-package")? {
            profile = profile.root_package(package);
        }
        if let Some(package) = get("base-package")? {
            profile = profile.base_package(package);
        }
        if let Some(policy) = get("schema-policy")? {
            profile = profile.schema_policy(policy.parse()?);
        }
        profile.auto_reconnect = config
            .get_opt::<bool>(&format!("{CONFIG_PREFIX}.auto-reconnect"))
            .map_err(|e| DataError::configuration(e.to_string()))?
            .unwrap_or(false);
        profile.max_connections = config
            .get_opt::<u32>(&format!("{CONFIG_PREFIX}.max-connections"))
            .map_err(|e| DataError::configuration(e.to_string()))?;

        for (key, value) in config.section(&format!("{CONFIG_PREFIX}.settings")) {
            let value = String::from_config_value(&value, &key)
                .map_err(|e| DataError::configuration(e.to_string()))?;
            profile = profile.setting(key, value);
        }
        Ok(profile)
    }
}

fn is_in_memory(driver: DriverKind, address: &str) -> bool {
    driver == DriverKind::Sqlite && (address == ":memory:" || address.contains("mode=memory"))
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("driver", &self.driver)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auto_reconnect", &self.auto_reconnect)
            .field("root_package", &self.root_package)
            .field("base_package", &self.base_package)
            .field("loading_context", &self.loading_context.is_some())
            .field("extra_entities", &self.extra_entities.len())
            .field("max_connections", &self.max_connections)
            .field("schema_policy", &self.schema_policy)
            .finish()
    }
}
