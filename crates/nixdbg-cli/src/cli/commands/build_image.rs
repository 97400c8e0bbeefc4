//! `nixdbg build-image` – install Nix, then build and package the debug
//! shell from a child process that enters the user namespace.

use anyhow::{Context, Result};
use nixdbg_core::config::NixdbgConfig;
use nixdbg_core::fetch::FetchOptions;
use nixdbg_core::platform::Platform;
use nixdbg_core::{image, install, userns};
use std::path::{Path, PathBuf};
use std::process::Command;

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub fn run_build_image(cfg: &NixdbgConfig, path: &Path, output: &Path) -> Result<()> {
    userns::check_userns_restrictions(Path::new(userns::PROC_SYS_KERNEL))?;
    cfg.manifest().validate()?;

    let pins = cfg.pin_table()?;
    install::install_nix(
        path,
        &pins,
        &Platform::detect(),
        &FetchOptions::from(&cfg.fetch),
    )?;

    let base = path
        .canonicalize()
        .with_context(|| format!("canonicalize {}", path.display()))?;
    let output = absolute(output)?;

    // Removed only after the child has exited and its mounts are gone.
    let root = tempfile::Builder::new()
        .prefix("nixdbg-root")
        .tempdir()
        .context("create chroot dir")?;

    let exe = std::env::current_exe().context("locate nixdbg executable")?;
    tracing::info!(base = %base.display(), root = %root.path().display(), "spawning namespaced build");
    let status = Command::new(exe)
        .arg("namespace-build")
        .arg("--path")
        .arg(&base)
        .arg("--root")
        .arg(root.path())
        .arg("--output")
        .arg(&output)
        .status()
        .context("spawn namespaced build")?;
    if !status.success() {
        anyhow::bail!("namespaced build failed: {}", status);
    }

    println!("Wrote {}", output.display());
    Ok(())
}

pub fn run_namespace_build(
    cfg: &NixdbgConfig,
    path: &Path,
    root: &Path,
    output: &Path,
) -> Result<()> {
    image::run_build_in_namespace(path, root, &cfg.manifest(), output)
}
