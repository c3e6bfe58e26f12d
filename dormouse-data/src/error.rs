use crate::discovery::DiscoveryError;
use crate::query::QueryError;
use crate::value::ValueError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("`{entity}` has no mapped field `{field}`")]
    UnknownField { entity: String, field: String },
    #[error("`{0}` is not mapped by this session factory")]
    Unmapped(String),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DataError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        DataError::Configuration(msg.into())
    }

    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates to wrap driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    /// Whether the error comes from setup rather than from the engine.
    pub fn is_configuration(&self) -> bool {
        match self {
            DataError::Configuration(_)
            | DataError::UnknownField { .. }
            | DataError::Unmapped(_)
            | DataError::Query(_) => true,
            DataError::Discovery(e) => e.is_configuration(),
            DataError::Value(_) | DataError::Database(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(DataError::configuration("driver is required").is_configuration());
        assert!(DataError::from(DiscoveryError::MissingContext).is_configuration());
        assert!(!DataError::from(DiscoveryError::Materialize { name: "a.B".into() })
            .is_configuration());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(!DataError::database(io).is_configuration());
    }

    #[test]
    fn unknown_field_message() {
        let err = DataError::UnknownField {
            entity: "app.entity.User".into(),
            field: "nickname".into(),
        };
        assert_eq!(
            err.to_string(),
            "`app.entity.User` has no mapped field `nickname`"
        );
    }
}
