//! 统一的 API 错误类型与转换。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    MissingFile,
    InvalidFilename,
    BadRequest(String),
    PayloadTooLarge(u64),
    NotFound(String),
    /// 文件读取路由的 404，返回纯文本。
    FileNotFound,
    Internal(String),
}

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

fn json_message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        JsonResponse(MessageBody {
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingFile => json_message(StatusCode::BAD_REQUEST, "no file uploaded"),
            ApiError::InvalidFilename => json_message(StatusCode::BAD_REQUEST, "invalid filename"),
            ApiError::BadRequest(msg) => json_message(StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(limit) => json_message(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file exceeds the {limit} byte upload limit"),
            ),
            ApiError::NotFound(msg) => json_message(StatusCode::NOT_FOUND, msg),
            ApiError::FileNotFound => (StatusCode::NOT_FOUND, "file not found").into_response(),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                json_message(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidName => ApiError::InvalidFilename,
            StorageError::NotFound => ApiError::NotFound("file not found".into()),
            StorageError::TooLarge(limit) => ApiError::PayloadTooLarge(limit),
            StorageError::Source(msg) => ApiError::BadRequest(msg),
            StorageError::Io(err) => ApiError::Internal(err.to_string()),
        }
    }
}
