//! HTTP API: server, routing, and request/response mapping.
//!
//! The API is a thin consumer of the core: the middleware turns a bearer
//! token into a principal, and handlers go through the tenant guard with the
//! tenant taken from that principal, never from the request body or path.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
