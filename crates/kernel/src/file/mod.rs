//! Release file management.
//!
//! Provides release file storage, naming, and hashing.

pub mod service;
pub mod storage;

pub use service::{ReleaseFileKey, sanitize_filename, sha256_hex};
pub use storage::{LocalReleaseStorage, OpenedFile, ReleaseStorage};
