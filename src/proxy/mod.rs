//! Proxy-and-capture subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest + route (Api)
//!     → policy.rs (base URL, capturing flag, target URL)
//!     → client.rs (one upstream exchange)
//!     → normalizer.rs (drop Transfer-Encoding, pick body mode)
//!     → capture.rs (optional: build record, store.create)
//!     → ResponseEnvelope back to the web layer
//! ```
//!
//! # Design Decisions
//! - The network call and the capture write run in sequence
//! - Upstream error statuses are relayed like any other response
//! - The upstream client sits behind a trait so tests can fake it

pub mod capture;
pub mod client;
pub mod handler;
pub mod normalizer;
pub mod policy;

pub use capture::CaptureRecorder;
pub use client::{HttpUpstream, OutboundRequest, UpstreamClient, UpstreamError, UpstreamResponse};
pub use handler::ProxyHandler;
pub use normalizer::{ResponseBody, ResponseEnvelope};
