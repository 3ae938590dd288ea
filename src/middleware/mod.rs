//! Middleware module
//!
//! Request logging with per-request ids

pub mod logging;

pub use logging::request_logging_middleware;
