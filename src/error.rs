use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::ModelError;

/// Every failure the HTTP layer can report.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No image file found in the request.")]
    MissingFile,

    #[error("The uploaded image file is empty.")]
    EmptyFile,

    #[error("cannot identify image file: {0}")]
    InvalidImage(String),

    /// Body was not a readable multipart form.
    #[error("{0}")]
    Multipart(String),

    #[error("{0}")]
    Inference(String),

    #[error("The requested resource was not found.")]
    NotFound,

    #[error("The method is not allowed for the requested URL.")]
    MethodNotAllowed,

    #[error("An internal server error occurred. Please try again later.")]
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFile
            | AppError::EmptyFile
            | AppError::InvalidImage(_)
            | AppError::Multipart(_)
            | AppError::Inference(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Decode(e) => AppError::InvalidImage(e.to_string()),
            other => AppError::Inference(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status: "failed",
            status_code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
