//! HTTP middleware components.
//!
//! Provides session and master-key authentication and metrics collection.

pub mod master_key;
pub mod metrics;
pub mod session_auth;

pub use master_key::{bearer_token, require_master_key};
pub use metrics::track_metrics;
pub use session_auth::{CurrentUser, require_session};
