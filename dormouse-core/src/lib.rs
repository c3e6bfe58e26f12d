//! # dormouse-core
//!
//! Ambient pieces shared by every Dormouse crate:
//!
//! - [`config`]: layered configuration (`dormouse.yaml`, profile overlay,
//!   `.env` files, `DORMOUSE_*` environment variables)
//! - [`logging`]: `tracing` subscriber initialisation

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigValue, DormouseConfig, FromConfigValue};
pub use logging::init_tracing;
