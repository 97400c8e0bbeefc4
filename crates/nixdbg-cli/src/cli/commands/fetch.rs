//! `nixdbg fetch <dest>` – download, verify and unpack the pinned release.

use anyhow::Result;
use nixdbg_core::bootstrap;
use nixdbg_core::config::NixdbgConfig;
use nixdbg_core::fetch::FetchOptions;
use nixdbg_core::platform::Platform;
use std::path::Path;

pub fn run_fetch(cfg: &NixdbgConfig, dest: &Path, system: Option<Platform>) -> Result<()> {
    let platform = system.unwrap_or_else(Platform::detect);
    let pins = cfg.pin_table()?;
    let fetched = bootstrap::fetch_nix(dest, &pins, &platform, &FetchOptions::from(&cfg.fetch))?;
    println!(
        "Unpacked {} ({}) into {}",
        fetched.artifact.path,
        fetched.artifact.system,
        fetched.unpack_dir.display()
    );
    Ok(())
}
