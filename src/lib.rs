//! HTTP API stub server library: serves recorded responses, proxies and
//! captures the rest.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod key;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod store;

pub use config::schema::StubConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
