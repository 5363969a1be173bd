//! HTTP-facing error handling.
//!
//! Maps core store errors and body parse failures onto status codes plus
//! the diagnostic `errorMessages` payload, rendered in the negotiated
//! representation.

use axum::http::StatusCode;
use axum::response::Response;
use thiserror::Error;
use todo_core::StoreError;

use crate::negotiate::{error_response, Representation};

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Domain failure from the store or validation pipeline
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Body could not be parsed as well-formed JSON or XML
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    /// Path named a collection or relationship that does not exist
    #[error("{0}")]
    UnknownResource(String),
}

impl ApiError {
    pub fn unknown_resource(segment: &str) -> Self {
        ApiError::UnknownResource(format!("no such resource: {segment}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(err) => {
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownResource(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Render in the representation the client asked for.
    pub fn into_response_as(self, repr: Representation) -> Response {
        let status = self.status();
        error_response(repr, status, &[self.to_string()])
    }
}
