//! Todo Core Library
//!
//! This crate provides the domain model, validation pipeline and in-memory
//! storage for the todo manager REST service. The HTTP crates depend only
//! on the types and the [`EntityStore`] trait defined here.
//!
//! # Architecture
//!
//! - [`model`] - Entity kinds, field schemas and stored values
//! - [`error`] - Error taxonomy and result handling
//! - [`validation`] - Schema-driven payload validation
//! - [`store`] - `EntityStore` trait and the `MemoryStore` implementation
//! - [`relations`] - Many-to-many association tables
//! - [`filter`] - Exact-match query filtering
//!
//! # Example
//!
//! ```rust
//! use todo_core::{
//!     EntityKind, MemoryStore, EntityStore, Payload, PayloadSource, RawValue,
//! };
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let mut payload = Payload::new(PayloadSource::Json);
//! payload.insert("title", RawValue::Text("file taxes".into()));
//! let todo = store.create(EntityKind::Todo, payload).await.unwrap();
//! assert_eq!(todo.id, 1);
//! # });
//! ```

pub mod error;
pub mod filter;
pub mod model;
pub mod relations;
pub mod store;
pub mod validation;

// Re-export commonly used types at the crate root for convenience
pub use error::{Result, StoreError};
pub use filter::ListFilter;
pub use model::{Entity, EntityKind, FieldKind, FieldSpec, FieldValue};
pub use relations::{Edge, Relation, Side};
pub use store::{EntityStore, MemoryStore, UpdateMode};
pub use validation::{related_id, validate, Payload, PayloadSource, RawValue, WriteMode};
