//! HTTP service boundary
//!
//! Translates requests into engine and store calls. Input validation lives
//! here: malformed CIDR text, IP addresses and query parameters are
//! rejected with 422 before anything reaches the engine.

pub mod routes;

pub use routes::configure;

use crate::classification::ClassificationEngine;
use crate::persistence::{EventStore, StoreError};
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use std::sync::Arc;
use thiserror::Error;

/// Shared application state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub engine: ClassificationEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        AppState {
            engine: ClassificationEngine::new(store.clone()),
            store,
        }
    }
}

/// Errors surfaced to API callers
///
/// Validation problems, duplicates and missing delete targets are caller
/// errors (422); storage failures are reported as a generic 500 with the
/// cause logged server-side.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("This IP range already exists.")]
    DuplicateRange,

    #[error("IP range not found")]
    RangeNotFound,

    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateRange | ApiError::RangeNotFound => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "detail": self.to_string() }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => ApiError::DuplicateRange,
            StoreError::NotFound(_) => ApiError::RangeNotFound,
            StoreError::Database(_) | StoreError::InvalidData(_) => {
                log::error!("Storage failure: {}", err);
                ApiError::Internal
            }
        }
    }
}

impl From<BlockingError> for ApiError {
    fn from(err: BlockingError) -> Self {
        log::error!("Blocking task failed: {}", err);
        ApiError::Internal
    }
}

/// JSON extractor configuration reporting deserialization failures as 422
///
/// Keeps body-validation errors in the same response shape as the rest of
/// the API instead of actix's default 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::UnprocessableEntity().json(serde_json::json!({ "detail": detail })),
        )
        .into()
    })
}

/// Query extractor configuration mirroring `json_config`
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::UnprocessableEntity().json(serde_json::json!({ "detail": detail })),
        )
        .into()
    })
}
