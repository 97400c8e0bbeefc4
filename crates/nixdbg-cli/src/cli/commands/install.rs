//! `nixdbg install` – install Nix into a base directory.

use anyhow::Result;
use nixdbg_core::config::NixdbgConfig;
use nixdbg_core::fetch::FetchOptions;
use nixdbg_core::install;
use nixdbg_core::platform::Platform;
use std::path::Path;

pub fn run_install(cfg: &NixdbgConfig, path: &Path) -> Result<()> {
    let pins = cfg.pin_table()?;
    let closure = install::install_nix(
        path,
        &pins,
        &Platform::detect(),
        &FetchOptions::from(&cfg.fetch),
    )?;
    println!(
        "Nix installed in {} ({} store paths)",
        path.display(),
        closure.len()
    );
    Ok(())
}
