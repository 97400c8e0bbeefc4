//! CLI command handlers, one file per command.

#[cfg(target_os = "linux")]
mod build_image;
mod check_userns;
mod checksum;
mod completions;
mod fetch;
#[cfg(unix)]
mod install;
mod manifest;

#[cfg(target_os = "linux")]
pub use build_image::{run_build_image, run_namespace_build};
pub use check_userns::run_check_userns;
pub use checksum::run_checksum;
pub use completions::{run_completions, run_man};
pub use fetch::run_fetch;
#[cfg(unix)]
pub use install::run_install;
pub use manifest::run_manifest;
