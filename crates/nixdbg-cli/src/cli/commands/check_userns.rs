//! `nixdbg check-userns` – user namespace preflight.

use anyhow::Result;
use nixdbg_core::userns;
use std::path::Path;

pub fn run_check_userns() -> Result<()> {
    userns::check_userns_restrictions(Path::new(userns::PROC_SYS_KERNEL))?;
    println!("Unprivileged user namespaces are available.");
    Ok(())
}
