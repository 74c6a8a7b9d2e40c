//! HTTP middleware.

pub mod pipeline;

pub use pipeline::{gateway_middleware, with_gateway};
