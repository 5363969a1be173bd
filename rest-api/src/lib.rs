//! REST API layer for the todo manager service.
//!
//! Maps HTTP verbs and paths onto [`todo_core::EntityStore`] operations,
//! parses JSON and XML request bodies, and serializes responses in the
//! representation the client negotiated via `Accept`.

pub mod body;
pub mod error;
pub mod negotiate;
pub mod request_log;
pub mod routes;

pub use body::{parse_body, BodyFormat};
pub use error::ApiError;
pub use negotiate::{entity_to_json, Representation};
pub use routes::RestServer;
