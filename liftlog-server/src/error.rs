use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing row and failed ownership check collapse into this one
    /// variant; the response never reveals which it was.
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ServerError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ServerError::Database(err) => {
                log::error!("database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
            ServerError::Internal(err) => {
                log::error!("internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = Json(ErrorBody { message });
        (status, body).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
