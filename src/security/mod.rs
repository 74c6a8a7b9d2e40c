//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming API request:
//!     → path.rs (refuse non-canonical paths)
//!     → identity.rs (resolve client IP, loopback check)
//!     → authorizer.rs (token → role, role vs method)
//!     → classifier.rs (terminal-control / high-risk / upload routes)
//!     → limits.rs (declared body size)
//!     → rate_limit.rs (fixed window per token hash or IP)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: no tokens configured means loopback only
//! - No trust in client input (forwarded headers opt-in)
//! - Every check is a pure function except the limiter's counters

pub mod authorizer;
pub mod classifier;
pub mod identity;
pub mod limits;
pub mod path;
pub mod rate_limit;
pub mod role;

pub use authorizer::{authorize, AuthSource, AuthorizationResult, DenialKind};
pub use rate_limit::{build_rate_limit_key, FixedWindowLimiter, RateLimitDecision};
pub use role::Role;
