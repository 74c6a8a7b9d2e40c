//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/pipeline.rs (gateway admission, deadline race, audit)
//!     → server.rs proxy handler (forward to upstream)
//!     → response.rs (error bodies, rate-limit headers)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{gateway_middleware, with_gateway};
pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::HttpServer;
