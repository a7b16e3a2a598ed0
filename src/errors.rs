//!
//! src/errors.rs
//!
//! Defines the service error enum, conversions from the crates we call
//! into, and how each error is rendered back to an http client
//!

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self { ServiceError::Upstream(e.to_string()) }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self { ServiceError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self { ServiceError::Db(e.to_string()) }
}

/// NotFound and Validation are the only expected failures and carry their
/// message as `detail`; everything else is an opaque 500
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "detail": detail }))
            ).into_response(),
            ServiceError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "detail": detail }))
            ).into_response(),
            other => {
                tracing::error!(error = %other, "request.failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
        }
    }
}
