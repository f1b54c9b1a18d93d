//! HTTP API
//!
//! This module provides the streamable HTTP transport: the axum router and
//! the SSE session machinery behind it.

pub mod http;
pub mod sse;

pub use http::{create_router, HttpTransport};
