//! # REST API Components
//!
//! HTTP surface for the keyplane identity plane: routing, handlers, error
//! mapping, and the OpenAPI document.

pub mod docs;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::{build_state, start_api_server};
