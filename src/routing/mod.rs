//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → table.rs (exact lookup)
//!     → Return: matched Api or None
//!
//! Route Compilation (at startup and on reload):
//!     Api[]
//!     → Key by (path, METHOD)
//!     → Freeze as immutable RouteTable
//!     → Swap into the shared handle
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; reload replaces the whole table atomically
//! - No prefix or pattern matching: one path, one route
//! - A request with no route may still be proxied to the default upstream

pub mod table;

pub use table::{RouteSource, RouteTable};
