use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API错误类型
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(error: impl Into<anyhow::Error>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: error.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, format!("Something went wrong: {}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: err.into() }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
