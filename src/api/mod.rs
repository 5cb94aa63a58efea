//! HTTP API for the task dispatcher.
//!
//! ## Endpoints
//!
//! - `POST /run` - Dispatch a free-text task (`?task=` or `{"task": ...}`)
//! - `GET /read?path=` - Return a file's text content
//! - `GET /tools` - List registered operations
//! - `GET /health` - Health check

mod fs;
mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
