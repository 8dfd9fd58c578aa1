//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StubConfig (validated, immutable)
//!     → ProxySettings handed to the proxy handler once, at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the route table
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Only the route table is reloadable; proxy defaults are fixed at startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{Api, ApiProxy, ProxySettings, StubConfig, UpstreamConfig};
