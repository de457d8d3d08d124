//! Plugin registry.
//!
//! This module handles:
//! - Validating plugin metadata (name, license, platforms, tags)
//! - Keeping the dependency graph acyclic
//! - Creating plugins and their dependency edges atomically

mod dependency;
mod error;
mod service;
pub mod store;
mod types;
mod validation;

pub use dependency::{DependencyGraph, would_create_cycle};
pub use error::{PluginError, StoreError};
pub use service::PluginService;
pub use store::{MemoryPluginStore, PgPluginStore, PluginStore, PluginTransaction};
pub use types::{
    AddDependency, CreatePlugin, Dependency, DependencyCandidate, DependencyRequest,
    DependencySummary, License, NewDependency, NewPlugin, Platform, Plugin, PluginChanges,
    PluginDetails, PluginSummary, Tag, UpdatePlugin,
};
pub use validation::{
    DESCRIPTION_MAX_CHARS, NAME_MAX_CHARS, NAME_MIN_CHARS, dedupe_dependencies,
    validate_description, validate_license, validate_name, validate_platforms, validate_tags,
};
