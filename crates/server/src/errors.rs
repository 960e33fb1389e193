use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::utils::logging::Logger;
use serde_json::{json, Value};
use service::ServiceError;
use thiserror::Error;

/// Turns a failed operation into a JSON body. The binder never interprets
/// the result.
pub trait ErrorFormatter: Send + Sync {
    fn format(&self, error: &ServiceError) -> Value;
}

/// Logs the message and wraps `{code, message}` under an `ERROR` key.
pub struct EnvelopeFormatter {
    logger: Arc<dyn Logger>,
}

impl EnvelopeFormatter {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl ErrorFormatter for EnvelopeFormatter {
    fn format(&self, error: &ServiceError) -> Value {
        self.logger.err(&error.to_string());
        json!({ "ERROR": error.info() })
    }
}

/// A formatted failure. Every fault is a 500; callers tell kinds apart by
/// the body's `code`.
#[derive(Debug)]
pub struct CrudError(pub Value);

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.0)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
