use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    /// The spot was taken by someone else between the caller's last read and the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller does not own the booking it tried to change.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage or network hiccup. Safe to retry with backoff.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A mutating call timed out; it may or may not have committed.
    #[error("Outcome unknown for {0}, re-read before retrying")]
    Indeterminate(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Whether the operation may succeed if retried as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Transient(_))
    }

    /// Short machine-readable kind, used for metrics labels and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::Validation(_) => "validation",
            DomainError::Conflict(_) => "conflict",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Transient(_) => "transient",
            DomainError::Indeterminate(_) => "indeterminate",
        }
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        match e {
            sea_orm::DbErr::RecordNotFound(msg) => DomainError::NotFound {
                entity: "Record",
                field: "query",
                value: msg,
            },
            other => DomainError::Transient(format!("Database error: {}", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup and runtime failure of the service as a whole
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Infra(InfraError::Database(e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Infra(InfraError::Io(e))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(DomainError::Transient("db locked".into()).is_transient());
        assert!(!DomainError::Conflict("taken".into()).is_transient());
        assert!(!DomainError::Indeterminate("book".into()).is_transient());
    }

    #[test]
    fn db_errors_map_to_transient() {
        let err: DomainError = sea_orm::DbErr::Custom("connection reset".into()).into();
        assert_eq!(err.kind(), "transient");

        let err: DomainError = sea_orm::DbErr::RecordNotFound("spot".into()).into();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = DomainError::not_found("Location", "id", 7);
        assert_eq!(err.to_string(), "Not found: Location with id=7");
    }
}
