//! External collaborators of the registry.

pub mod user_directory;

pub use user_directory::{HttpUserDirectory, LocalUserDirectory, UserDirectory};
