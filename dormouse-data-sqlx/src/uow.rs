//! Unit of work: one transaction on one pooled connection.

use std::ops::{Deref, DerefMut};

use dormouse_data::DataError;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};

use crate::error::SqlxErrorExt;

/// A wrapper around a SQLx [`Transaction`] on the `Any` driver.
///
/// - Committed by [`commit`](UnitOfWork::commit)
/// - Rolled back when dropped without a commit (error paths, panics,
///   cancelled futures)
///
/// Every executor operation runs in its own unit of work.
pub struct UnitOfWork(Transaction<'static, Any>);

impl Deref for UnitOfWork {
    type Target = Transaction<'static, Any>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for UnitOfWork {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &AnyPool) -> Result<Self, DataError> {
        let tx = pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        Ok(UnitOfWork(tx))
    }

    pub async fn commit(self) -> Result<(), DataError> {
        self.0.commit().await.map_err(SqlxErrorExt::into_data_error)
    }

    /// Roll back explicitly instead of waiting for the drop.
    pub async fn rollback(self) -> Result<(), DataError> {
        self.0.rollback().await.map_err(SqlxErrorExt::into_data_error)
    }

    /// Returns a mutable reference to the underlying connection.
    pub fn as_mut(&mut self) -> &mut AnyConnection {
        &mut self.0
    }
}
