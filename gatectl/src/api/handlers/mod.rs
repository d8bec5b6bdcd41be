//! HTTP request handlers.

pub mod cache;
pub mod catalog;
pub mod completions;
pub mod credentials;
pub mod models;
pub mod tokens;
pub mod usage;
