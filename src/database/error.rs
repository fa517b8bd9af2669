use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Caller-facing error for every database action. Storage-level failures
/// are translated here and never leak raw.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(String),
}

impl Error {
    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_string())
    }

    pub fn validation(info: &str) -> Self {
        Self::Validation(info.to_string())
    }

    pub fn unauthorized(info: &str) -> Self {
        Self::Unauthorized(info.to_string())
    }

    pub fn forbidden(info: &str) -> Self {
        Self::Forbidden(info.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::NotFound(String::from("row not found")),
            sqlx::Error::Database(e) => match e.code().as_deref() {
                // unique_violation: a concurrent insert won the race
                Some("23505") => Self::Conflict(String::from("relation already exists")),
                // foreign_key_violation: the referenced entity is gone
                Some("23503") => Self::NotFound(String::from("referenced entity does not exist")),
                // check_violation: model-declared bounds
                Some("23514") => Self::Validation(String::from("value out of bounds")),
                _ => {
                    log::error!("unhandled database error: {e}");
                    Self::Database(format!("{e}"))
                }
            },
            sqlx::Error::PoolTimedOut => Self::Database(String::from("pool timed out")),
            sqlx::Error::PoolClosed => Self::Database(String::from("pool closed")),
            sqlx::Error::WorkerCrashed => Self::Database(String::from("worker crashed")),
            e => Self::Database(format!("{e}")),
        }
    }
}

impl Reject for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(Error::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::Database(String::from("x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_translates_to_not_found() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::NotFound(_)));
    }
}
