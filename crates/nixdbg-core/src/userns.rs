//! Preflight for unprivileged user namespaces.
//!
//! See <https://gitlab.com/apparmor/apparmor/-/wikis/unprivileged_userns_restriction>.

use crate::error::BootstrapError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const PROC_SYS_KERNEL: &str = "/proc/sys/kernel";

/// Reads an integer sysctl, `None` when the knob does not exist.
fn read_knob(dir: &Path, name: &str) -> Result<Option<i64>> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let val = raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("parse {} value {:?}", path.display(), raw.trim()))?;
    Ok(Some(val))
}

/// Fails if the kernel (Debian's `unprivileged_userns_clone`) or AppArmor
/// (`apparmor_restrict_unprivileged_userns`) forbids unprivileged user
/// namespaces. `sys_kernel` is normally [`PROC_SYS_KERNEL`].
pub fn check_userns_restrictions(sys_kernel: &Path) -> Result<()> {
    if let Some(v) = read_knob(sys_kernel, "unprivileged_userns_clone")? {
        if v != 1 {
            return Err(BootstrapError::UsernsRestricted(
                "unprivileged user namespaces disabled in kernel".into(),
            )
            .into());
        }
    }

    // TODO: downgrade to a warning once we can tell whether an AppArmor
    // profile grants userns to this binary.
    if let Some(v) = read_knob(sys_kernel, "apparmor_restrict_unprivileged_userns")? {
        if v != 0 {
            return Err(BootstrapError::UsernsRestricted(
                "unprivileged user namespaces restricted by AppArmor".into(),
            )
            .into());
        }
    }

    tracing::debug!("user namespace preflight passed");
    Ok(())
}
