//! Core engine for aviary: config, secrets, templates, the processed-item
//! cache, the middleware pipeline, message-generating providers, the
//! scheduler, and the Dispatch Engine. The webhook HTTP server and CLI live
//! in their own crates on top of this one.

pub mod accounts;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod providers;
pub mod rate_limit;
pub mod scheduler;
pub mod secrets;
pub mod security;
pub mod template;
pub mod types;

pub use error::{Error, Result};
