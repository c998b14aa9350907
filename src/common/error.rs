use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::models::report::ReportStatus;

// Código do Postgres para violação de chave estrangeira
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    ValidationError(#[from] ValidationErrors),

    // Validações de regra de negócio que não cabem no derive do validator
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot {action} a report that is {from}")]
    InvalidTransition {
        from: ReportStatus,
        action: &'static str,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("E-mail already in use")]
    EmailAlreadyExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or missing authentication token")]
    InvalidToken,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Spreadsheet error: {0}")]
    ExportError(#[from] rust_xlsxwriter::XlsxError),
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    /// Converte violações de FK (ON DELETE RESTRICT) em conflito de dependência.
    pub fn from_delete(err: sqlx::Error, what: &str) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                return AppError::Conflict(format!(
                    "Cannot delete {what} while other records still reference it"
                ));
            }
        }
        AppError::DatabaseError(err)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::BadRequest(_)
            | AppError::Conflict(_)
            | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::ExportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Achata erros aninhados ("data.children", "items[0].name")
fn collect_details(prefix: &str, errors: &ValidationErrors, out: &mut HashMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = field_errors.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                });
                out.entry(path).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_details(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_details(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                collect_details("", errors, &mut details);
                json!({
                    "message": "One or more fields are invalid.",
                    "details": details,
                })
            }
            e if status.is_server_error() => {
                tracing::error!("Internal server error: {}", e);
                json!({ "message": "An unexpected error occurred." })
            }
            e => json!({ "message": e.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_and_transitions_are_client_errors() {
        assert_eq!(
            AppError::conflict("already has a supervisor assigned").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidTransition {
                from: ReportStatus::AreaApproved,
                action: "approve",
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::forbidden("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::NotFound("Report").status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn transition_message_names_state_and_action() {
        let err = AppError::InvalidTransition {
            from: ReportStatus::AreaApproved,
            action: "approve",
        };
        assert_eq!(err.to_string(), "Cannot approve a report that is area_approved");
    }

    #[test]
    fn nested_validation_errors_keep_their_path() {
        use validator::ValidationError;

        let mut inner = ValidationErrors::new();
        inner.add("children", ValidationError::new("range").with_message("must not be negative".into()));
        let mut outer = ValidationErrors::new();
        outer.errors_mut().insert("data".into(), ValidationErrorsKind::Struct(Box::new(inner)));

        let mut details = HashMap::new();
        collect_details("", &outer, &mut details);
        assert_eq!(details["data.children"], vec!["must not be negative".to_string()]);
    }

    #[test]
    fn server_errors_hide_details() {
        let response = AppError::InternalServerError(anyhow::anyhow!("secret")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
