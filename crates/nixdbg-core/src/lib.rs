pub mod config;
pub mod error;
pub mod logging;

pub mod bootstrap;
pub mod checksum;
pub mod fetch;
pub mod manifest;
pub mod pins;
pub mod platform;
pub mod unpack;
pub mod userns;

// The base directory relies on symlinks and Unix permissions.
#[cfg(unix)]
pub mod install;
#[cfg(unix)]
pub mod tree;

// User and mount namespaces.
#[cfg(target_os = "linux")]
pub mod image;
#[cfg(target_os = "linux")]
pub mod namespace;

pub use error::BootstrapError;
