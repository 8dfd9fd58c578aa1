//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, stub handler)
//!     → request.rs (request ID, body limit, buffer into InboundRequest)
//!     → [route lookup + data key] (routing, key)
//!     → stored stub? → response.rs (render_stub)
//!     → else proxy::ProxyHandler::perform → response.rs (envelope)
//!     → Send to client
//! ```

pub mod download;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
