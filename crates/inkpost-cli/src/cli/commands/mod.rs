//! CLI command handlers.

pub mod about;
pub mod auth;
pub mod config;
pub mod posts;
