//! HTTP API: configuration, authentication middleware and the document routes.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
