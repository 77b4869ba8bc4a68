use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned to clients for any failure we do not classify.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected internal server error occurred.";

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid query parameters: {}", summarize(.0))]
    InvalidFields(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    pub message: &'static str,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field)
        .collect::<Vec<_>>()
        .join(", ")
}

impl InventoryError {
    pub fn status(&self) -> StatusCode {
        match self {
            InventoryError::Validation(_) | InventoryError::InvalidFields(_) => {
                StatusCode::BAD_REQUEST
            }
            InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::Conflict(_) => StatusCode::CONFLICT,
            InventoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct FieldErrorsBody<'a> {
    errors: &'a [FieldError],
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            InventoryError::InvalidFields(errors) => {
                (status, Json(FieldErrorsBody { errors })).into_response()
            }
            InventoryError::Database(e) => {
                tracing::error!("Unhandled database error: {}", e);
                (
                    status,
                    Json(ErrorBody {
                        error: INTERNAL_ERROR_MESSAGE,
                    }),
                )
                    .into_response()
            }
            other => {
                let message = other.to_string();
                (status, Json(ErrorBody { error: &message })).into_response()
            }
        }
    }
}
