//! Build the debug shell with the installed Nix and package it together with
//! its closure as `base.tar.xz`.
//!
//! Everything here expects to run inside the namespace set up by
//! [`crate::namespace`], where the base directory is mounted at `/nix`.

use crate::install;
use crate::manifest::DebugShellManifest;
use crate::namespace;
use crate::tree;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use xz2::stream::MtStreamBuilder;
use xz2::write::XzEncoder;

/// Entries of the nix root that go into the image; `.cache` stays behind.
const KEPT_ROOT_ENTRIES: &[&str] = &[".base", ".bin", "etc", "var", "store"];

const XZ_PRESET: u32 = 6;

/// Environment for `nix` commands run against the installed base.
fn nix_env(nix_root: &Path) -> Vec<(&'static str, String)> {
    vec![
        (
            "PATH",
            format!(
                "{}:/usr/local/bin:/usr/bin:/bin",
                nix_root.join(".bin").display()
            ),
        ),
        ("NIX_CONF_DIR", nix_root.join("etc").display().to_string()),
    ]
}

/// Run `nix build` on the flake in `flake_dir` and return the output store
/// path together with the names of its runtime closure.
pub fn build_debug_shell(nix_root: &Path, flake_dir: &Path) -> Result<(PathBuf, Vec<String>)> {
    let work = tempfile::tempdir().context("create build dir")?;
    let env = nix_env(nix_root);

    tracing::info!(flake = %flake_dir.display(), "nix build");
    let status = Command::new("nix")
        .arg("build")
        .arg(flake_dir)
        .current_dir(work.path())
        .env_clear()
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .status()
        .context("spawn nix build")?;
    if !status.success() {
        anyhow::bail!("nix build failed: {}", status);
    }

    let result = work.path().join("result");
    let output = Command::new("nix-store")
        .arg("-qR")
        .arg(&result)
        .current_dir(work.path())
        .env_clear()
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .output()
        .context("spawn nix-store -qR")?;
    if !output.status.success() {
        anyhow::bail!(
            "nix-store -qR failed: {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let shell_path = fs::read_link(&result).with_context(|| format!("readlink {}", result.display()))?;
    let closure = parse_closure(&String::from_utf8_lossy(&output.stdout));
    tracing::info!(path = %shell_path.display(), entries = closure.len(), "debug shell built");
    Ok((shell_path, closure))
}

/// Store path names from `nix-store -qR` output.
pub fn parse_closure(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| Path::new(l).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Copy filter for the nix root: only [`KEPT_ROOT_ENTRIES`] at the top, only
/// closure members inside `store/`, everything below that.
pub fn keep_entry(nix_root: &Path, dir: &Path, name: &str, closure: &HashSet<String>) -> bool {
    if dir == nix_root {
        return KEPT_ROOT_ENTRIES.contains(&name);
    }
    if dir == install::store_path(nix_root) {
        return closure.contains(name);
    }
    true
}

/// Copy the filtered nix root to a staging dir, point `.base` at the debug
/// shell and write an xz-compressed tarball to `output`.
pub fn package_base_image(
    nix_root: &Path,
    nix_closure: &[String],
    shell_path: &Path,
    shell_closure: &[String],
    output: &Path,
) -> Result<()> {
    let keep: HashSet<String> = nix_closure
        .iter()
        .chain(shell_closure.iter())
        .cloned()
        .collect();

    let staging = tempfile::tempdir().context("create staging dir")?;
    tracing::info!(staging = %staging.path().display(), "copying nix base");
    let result = stage_and_compress(nix_root, &keep, shell_path, staging.path(), output);
    // Store entries were copied read-only.
    if let Err(e) = tree::make_dirs_writable(staging.path()) {
        tracing::warn!("staging cleanup: {:#}", e);
    }
    result
}

fn stage_and_compress(
    nix_root: &Path,
    keep: &HashSet<String>,
    shell_path: &Path,
    staging: &Path,
    output: &Path,
) -> Result<()> {
    tree::copy_tree(nix_root, staging, &|dir: &Path, name: &str| {
        keep_entry(nix_root, dir, name, keep)
    })?;

    let base_link = staging.join(".base");
    if base_link.symlink_metadata().is_ok() {
        fs::remove_file(&base_link)?;
    }
    tracing::info!("symlinking {} to {}", base_link.display(), shell_path.display());
    tree::symlink(shell_path, &base_link)?;

    tracing::info!(output = %output.display(), "compressing base");
    write_tar_xz(staging, output)?;
    tracing::info!("done");
    Ok(())
}

/// Tar `dir` (as `.`) into `output` with multi-threaded xz.
fn write_tar_xz(dir: &Path, output: &Path) -> Result<()> {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    let stream = MtStreamBuilder::new()
        .threads(threads)
        .preset(XZ_PRESET)
        .encoder()
        .context("init xz encoder")?;
    let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
    let mut builder = tar::Builder::new(XzEncoder::new_stream(file, stream));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", dir)
        .with_context(|| format!("archive {}", dir.display()))?;
    builder
        .into_inner()
        .context("finish tar")?
        .finish()
        .context("finish xz")?;
    Ok(())
}

/// Inside a fresh child process: enter the namespace, chroot into
/// `new_root` with `base` at `/nix`, build the debug shell and package it.
///
/// `new_root` is owned by the parent, which removes it after this process
/// exits and the mounts are gone.
pub fn run_build_in_namespace(
    base: &Path,
    new_root: &Path,
    manifest: &DebugShellManifest,
    output: &Path,
) -> Result<()> {
    namespace::enter_user_mount_ns()?;
    namespace::bind_mount_root_dirs(base, new_root)?;
    namespace::chroot_keep_cwd(new_root)?;

    let nix_root = Path::new("/nix");
    let nix_closure = install::read_base_paths(nix_root)?;

    let flake_dir = tempfile::Builder::new()
        .prefix("debug-shell")
        .tempdir()
        .context("create flake dir")?;
    manifest.write_flake(flake_dir.path())?;

    let (shell_path, shell_closure) = build_debug_shell(nix_root, flake_dir.path())?;
    package_base_image(nix_root, &nix_closure, &shell_path, &shell_closure, output)
}
