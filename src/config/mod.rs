//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → env.rs (tokens, flags, limits; never fails)
//!     → AuthConfig + SecurityConfig (immutable)
//!
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Env values degrade to defaults; a broken config file is fatal

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{AuthConfig, SecurityConfig};
pub use loader::{load_config, ConfigError};
pub use schema::{GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, UpstreamConfig};
