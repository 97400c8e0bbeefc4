//! `nixdbg manifest` – print or write the debug shell flake.

use anyhow::Result;
use nixdbg_core::config::NixdbgConfig;
use std::path::Path;

pub fn run_manifest(cfg: &NixdbgConfig, write: Option<&Path>) -> Result<()> {
    let manifest = cfg.manifest();
    match write {
        Some(dir) => {
            let path = manifest.write_flake(dir)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", manifest.render_flake()?),
    }
    Ok(())
}
