//! HTTP surface of the proxy.
//!
//! Serves notes rendered as standalone HTML pages and the resources they
//! embed. Errors are reported as JSON `{"detail": ...}` bodies.

mod guard;
mod notes;
mod resources;
mod server;
mod state;

pub use server::{router, start_http_server};
pub use state::ApiState;
