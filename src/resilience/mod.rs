//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! High-risk mutating request:
//!     → timeouts.rs (race handler against its budget)
//!     → On expiry: 504 to the client, handler finishes in the background
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable for routes that spawn processes
//! - Side effects may still land after the client saw a timeout

pub mod timeouts;
