//! Mediarelay - adaptive media delivery service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod delivery;
pub mod server;
pub mod session;
