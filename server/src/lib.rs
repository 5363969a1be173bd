//! Todo Manager Server Library
//!
//! This library provides the startup functionality for the todo manager
//! REST server: configuration management, telemetry initialization and
//! application wiring.

pub mod config;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use setup::{create_server, create_store, initialize_app};
pub use telemetry::init_telemetry;
