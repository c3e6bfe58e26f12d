use dormouse_data::DataError;

/// Maps driver errors onto the data-layer taxonomy. A malformed connection
/// setting stays a configuration error; everything else is a database error.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match self {
            sqlx::Error::Configuration(e) => DataError::Configuration(e.to_string()),
            other => DataError::database(other),
        }
    }
}

pub type SqlxResult<T> = Result<T, DataError>;
