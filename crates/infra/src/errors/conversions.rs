//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use storesync_domain::StoreSyncError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreSyncError);

impl From<InfraError> for StoreSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreSyncError> for InfraError {
    fn from(value: StoreSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoStoreSyncError {
    fn into_storesync(self) -> StoreSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for SqlError {
    fn into_storesync(self) -> StoreSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StoreSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StoreSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        StoreSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        StoreSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => StoreSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StoreSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StoreSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                StoreSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                StoreSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                StoreSyncError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => StoreSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => StoreSyncError::Database("invalid SQL query".into()),
            other => StoreSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for r2d2::Error {
    fn into_storesync(self) -> StoreSyncError {
        StoreSyncError::Database(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for HttpError {
    fn into_storesync(self) -> StoreSyncError {
        if self.is_timeout() {
            return StoreSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StoreSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let target = self.url().map_or_else(|| "request".to_string(), |url| url.path().to_string());
            return StoreSyncError::remote(code, &target, None);
        }

        if self.is_decode() {
            return StoreSyncError::InvalidInput(format!("undecodable response body: {self}"));
        }

        StoreSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* Helpers used at the spawn_blocking boundary */
/* -------------------------------------------------------------------------- */

pub fn map_sql_error(err: SqlError) -> StoreSyncError {
    StoreSyncError::from(InfraError::from(err))
}

pub fn map_pool_error(err: r2d2::Error) -> StoreSyncError {
    StoreSyncError::from(InfraError::from(err))
}

pub fn map_join_error(err: tokio::task::JoinError) -> StoreSyncError {
    if err.is_cancelled() {
        StoreSyncError::Internal("blocking task cancelled".into())
    } else {
        StoreSyncError::Internal(format!("blocking task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
