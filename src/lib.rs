//! API access-control and abuse-prevention gateway.
//!
//! Guards every request under `/api`: authenticates bearer tokens against a
//! static role map, gates by method, caps declared body sizes, rate-limits per
//! token or client IP, and bounds the latency of high-risk mutating routes.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::{AuthConfig, GatewayConfig, SecurityConfig};
pub use gateway::{Gateway, GatewayContext};
pub use http::{with_gateway, HttpServer};
pub use lifecycle::Shutdown;
