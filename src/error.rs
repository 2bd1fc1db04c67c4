use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures while provisioning, training or persisting a model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize model to MessagePack: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to deserialize model from MessagePack: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid training data: {0}")]
    Dataset(String),
}

/// Per-request failures. All of them are the client's fault.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid {expected} for '{field}': {value:?}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("malformed form body: {0}")]
    MalformedForm(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    pub fn error_code(&self) -> &str {
        match self {
            AppError::MissingField(_) => "MISSING_FIELD",
            AppError::InvalidNumber { .. } => "INVALID_NUMBER",
            AppError::MalformedForm(_) => "MALFORMED_FORM",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        tracing::warn!(
            error_code = self.error_code(),
            status_code = status.as_u16(),
            message = %message,
            "Prediction failed"
        );

        let body = Json(json!({ "error": format!("Prediction failed: {message}") }));
        (status, body).into_response()
    }
}
