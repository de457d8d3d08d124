//! Plugstore Kernel Library
//!
//! Plugin registry service: HTTP routes, the dependency graph, release
//! storage and accounts. The `plugstore` binary is a thin wrapper.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod plugin;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
