//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - Config reload is file-watch driven, not signal driven

pub mod shutdown;

pub use shutdown::Shutdown;
