use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Too many files (limit {limit})")]
    TooManyFiles { limit: usize },

    #[error("File too large (field {field}, limit {limit} bytes)")]
    FileTooLarge { field: String, limit: u64 },

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
        context: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: err,
            context: None,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err.to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Multipart(rejection.body_text())
    }
}

impl AppError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Storage {
                message, source, ..
            } => Self::Storage {
                message,
                source,
                context: Some(context.into()),
            },
            error => error,
        }
    }

    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
            context: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooManyFiles { .. }
            | Self::FileTooLarge { .. }
            | Self::UnexpectedField(_)
            | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Storage { .. } | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    msg: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Storage { context, .. } => {
                tracing::error!(error = %self, context = ?context, "upload failed")
            }
            _ => tracing::warn!(error = %self, status = status.as_u16(), "upload rejected"),
        }

        let body = FailureBody {
            success: false,
            msg: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
