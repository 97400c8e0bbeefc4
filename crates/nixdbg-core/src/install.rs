//! Install the pinned Nix release into a self-contained base directory.
//!
//! Layout of the base directory (it becomes `/nix` inside the namespace):
//!
//! ```text
//! store/              copied from the release tarball, read-only
//! .bin -> /nix/store/<nix>/bin
//! etc/nix.conf
//! var/nix/
//! .cache/base_paths   names of the store entries shipped with the release
//! ```

use crate::bootstrap::{self, FetchedNix};
use crate::error::BootstrapError;
use crate::fetch::FetchOptions;
use crate::pins::PinTable;
use crate::platform::Platform;
use crate::tree;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

pub const NIX_CONF: &str = "experimental-features = nix-command flakes
sandbox = false
build-users-group =
";

const BASE_PATHS: &str = "base_paths";

/// Depth below the unpack dir searched for the release's `store/`.
const STORE_SEARCH_DEPTH: usize = 4;

pub fn store_path(base: &Path) -> PathBuf {
    base.join("store")
}

pub fn cache_path(base: &Path) -> PathBuf {
    base.join(".cache")
}

pub fn etc_path(base: &Path) -> PathBuf {
    base.join("etc")
}

/// True when `base` already holds an installed store.
pub fn is_installed(base: &Path) -> bool {
    [store_path(base), cache_path(base), etc_path(base)]
        .iter()
        .all(|p| p.exists())
}

/// Closure recorded at install time.
pub fn read_base_paths(base: &Path) -> Result<Vec<String>> {
    let path = cache_path(base).join(BASE_PATHS);
    let data =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(data
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Install Nix into `base` unless already installed. Returns the names of the
/// store entries the release ships (the Nix closure).
pub fn install_nix(
    base: &Path,
    pins: &PinTable,
    platform: &Platform,
    opts: &FetchOptions,
) -> Result<Vec<String>> {
    if is_installed(base) {
        tracing::info!(base = %base.display(), "Nix already installed");
        return read_base_paths(base);
    }

    let tmp = tempfile::tempdir().context("create temp dir")?;
    let FetchedNix { unpack_dir, .. } = bootstrap::fetch_nix(tmp.path(), pins, platform, opts)?;
    let result = install_from_unpacked(base, &unpack_dir);
    // Release store dirs unpack read-only; the temp dir can't be removed otherwise.
    if let Err(e) = tree::make_dirs_writable(&unpack_dir) {
        tracing::warn!("temp cleanup: {:#}", e);
    }
    result
}

/// Second half of [`install_nix`]: lay out `base` from an unpacked release.
pub fn install_from_unpacked(base: &Path, unpack_dir: &Path) -> Result<Vec<String>> {
    let release_store = find_store_dir(unpack_dir)?
        .ok_or_else(|| BootstrapError::NoStoreInArchive(unpack_dir.to_path_buf()))?;
    let release_root = release_store
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| unpack_dir.to_path_buf());
    let install_script = release_root.join("install");
    let script = fs::read_to_string(&install_script)
        .with_context(|| format!("read {}", install_script.display()))?;
    let nix_path = parse_nix_store_path(&script)
        .ok_or_else(|| BootstrapError::NixPathNotFound(install_script.clone()))?;
    tracing::info!(nix = %nix_path, "detected Nix store path");

    let store = store_path(base);
    fs::create_dir_all(base).with_context(|| format!("create {}", base.display()))?;
    tree::copy_tree(&release_store, &store, &|_: &Path, _: &str| true)
        .with_context(|| format!("copy store into {}", store.display()))?;

    let bin_link = base.join(".bin");
    if bin_link.symlink_metadata().is_ok() {
        fs::remove_file(&bin_link)?;
    }
    tree::symlink(&Path::new(&nix_path).join("bin"), &bin_link)
        .with_context(|| format!("symlink {}", bin_link.display()))?;

    let mut closure = Vec::new();
    for entry in fs::read_dir(&store)? {
        let entry = entry?;
        tree::make_read_only(&entry.path())?;
        closure.push(entry.file_name().to_string_lossy().into_owned());
    }
    closure.sort();

    let etc = etc_path(base);
    fs::create_dir_all(&etc)?;
    let nix_conf = etc.join("nix.conf");
    if !nix_conf.exists() {
        fs::write(&nix_conf, NIX_CONF)
            .with_context(|| format!("write {}", nix_conf.display()))?;
    }

    fs::create_dir_all(base.join("var").join("nix"))?;

    let cache = cache_path(base);
    fs::create_dir_all(&cache)?;
    let mut listing = closure.join("\n");
    listing.push('\n');
    fs::write(cache.join(BASE_PATHS), listing)?;

    tracing::info!(base = %base.display(), entries = closure.len(), "Nix installed");
    Ok(closure)
}

/// Breadth-first search for a directory named `store`.
fn find_store_dir(root: &Path) -> Result<Option<PathBuf>> {
    let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);
    while let Some((dir, depth)) = queue.pop_front() {
        for entry in fs::read_dir(&dir).with_context(|| format!("read dir {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.file_name() == "store" {
                return Ok(Some(entry.path()));
            }
            if depth + 1 < STORE_SEARCH_DEPTH {
                queue.push_back((entry.path(), depth + 1));
            }
        }
    }
    Ok(None)
}

/// Extract the value of a `nix="/nix/store/..."` line from the release's
/// install script.
pub fn parse_nix_store_path(script: &str) -> Option<String> {
    script.lines().find_map(|line| {
        let rest = line.strip_prefix("nix=\"")?;
        let (value, _) = rest.split_once('"')?;
        value.starts_with("/nix/store/").then(|| value.to_string())
    })
}
