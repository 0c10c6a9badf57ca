use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::views::ApiResponse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The composer could not determine a model storage location; nothing was submitted.
    #[error("Invalid inference service spec: {0}")]
    InvalidSpec(String),

    #[error("Upstream dependency '{dependency}' failed: {message}")]
    UpstreamDependency { dependency: &'static str, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Inference service '{0}' has no routable URL yet")]
    ServiceNotReady(String),

    #[error("Invalid inference input: {0}")]
    InvalidInput(String),

    /// Non-2xx or unparsable answer from a model endpoint. `status` is `None` when no response arrived.
    #[error("Inference request failed with status {status:?}: {body}")]
    InferenceTransport { status: Option<u16>, body: String },

    #[error("Key '{0}' is empty")]
    MissingKey(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn upstream(dependency: &'static str, message: impl Into<String>) -> Self {
        Error::UpstreamDependency {
            dependency,
            message: message.into(),
        }
    }

    /// Short label for metrics and the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidSpec(_) => "invalid_spec",
            Error::UpstreamDependency { .. } => "upstream_dependency",
            Error::Conflict(_) => "conflict",
            Error::NotFound(_) => "not_found",
            Error::ServiceNotReady(_) => "service_not_ready",
            Error::InvalidInput(_) => "invalid_input",
            Error::InferenceTransport { .. } => "inference_transport",
            Error::MissingKey(_) => "missing_key",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidSpec(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::ServiceNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::UpstreamDependency { .. } | Error::InferenceTransport { .. } | Error::MissingKey(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Config(_) | Error::Io(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ApiResponse::failure(status, self))
    }
}
