//! Core inkpost library (sign-in exchange, posts, session, config).

pub mod auth;
pub mod backend;
pub mod config;
pub mod logging;
pub mod posts;
pub mod session;
