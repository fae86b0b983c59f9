use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Error surface of every service operation. The transport maps each kind
/// to an HTTP status; handlers just propagate with `?`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("user already has an inviter")]
    AlreadyInvited,

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::AlreadyInvited | ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage failures are logged server-side and not echoed to clients.
        let message = match self {
            ServiceError::Database(e) => {
                log::error!("storage failure: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            ServiceError::InvalidInput("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("user").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::AlreadyInvited.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Conflict("busy".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn not_found_message_names_the_subject() {
        assert_eq!(ServiceError::NotFound("inviter").to_string(), "inviter not found");
    }
}
