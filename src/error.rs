use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a raw database error onto the taxonomy. `what` names the entity
    /// for not-found messages ("Lease", "Payment", ...).
    pub fn from_sqlx(error: sqlx::Error, what: &str) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::NotFound(format!("{what} not found.")),
            // Fixed caller-facing messages; constraint names and raw
            // database text stay in the logs.
            sqlx::Error::Database(db_error) => match db_error.code().as_deref() {
                // Unique violation (e.g. the one-active-lease-per-unit
                // partial index).
                Some("23505") => {
                    Self::Conflict(format!("{what} conflicts with an existing record."))
                }
                // Foreign-key violation: dependent or missing referenced rows.
                Some("23503") => Self::Conflict(format!(
                    "{what} references records that are missing or still in use."
                )),
                // Check violation: the row would break a table constraint.
                Some("23514") => Self::UnprocessableEntity(format!(
                    "{what} contains values the data constraints reject."
                )),
                _ => internal(error),
            },
            _ => internal(error),
        }
    }
}

fn internal(error: sqlx::Error) -> AppError {
    tracing::error!(error = %error, "Database request failed");
    AppError::Internal("Internal server error.".to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            // Never leak internal detail to the caller.
            Self::Internal(message) => {
                tracing::error!(detail = %message, "Internal error surfaced to caller");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct StubPgError(&'static str);

    impl std::fmt::Display for StubPgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message())
        }
    }

    impl std::error::Error for StubPgError {}

    impl DatabaseError for StubPgError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"one_active_lease_per_unit\""
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubPgError(code)))
    }

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnprocessableEntity("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let mapped = AppError::from_sqlx(sqlx::Error::RowNotFound, "Lease");
        assert!(matches!(mapped, AppError::NotFound(message) if message == "Lease not found."));
    }

    #[test]
    fn constraint_codes_map_without_leaking_database_detail() {
        let unique = AppError::from_sqlx(db_error("23505"), "Lease");
        assert_eq!(unique.status_code(), StatusCode::CONFLICT);
        assert!(!unique.to_string().contains("one_active_lease_per_unit"));

        let foreign_key = AppError::from_sqlx(db_error("23503"), "Lease");
        assert_eq!(foreign_key.status_code(), StatusCode::CONFLICT);
        assert!(!foreign_key.to_string().contains("constraint"));

        let check = AppError::from_sqlx(db_error("23514"), "Lease");
        assert_eq!(check.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unrecognized_database_codes_stay_internal() {
        let mapped = AppError::from_sqlx(db_error("40001"), "Lease");
        assert!(matches!(mapped, AppError::Internal(_)));
    }
}
