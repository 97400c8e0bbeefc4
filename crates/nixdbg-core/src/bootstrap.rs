//! Fetch, verify and unpack the pinned Nix release for a platform.
//!
//! The pin is resolved before anything touches the filesystem or the
//! network, and nothing is unpacked unless the digest matches.

use crate::checksum;
use crate::fetch::{self, FetchOptions};
use crate::pins::{PinTable, PinnedArtifact};
use crate::platform::Platform;
use crate::unpack;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Layout under the destination directory.
pub const TMP_DIR: &str = "tmp";
pub const UNPACK_DIR: &str = "unpack";

/// Outcome of a successful [`fetch_nix`].
#[derive(Debug, Clone)]
pub struct FetchedNix {
    /// Verified tarball under `<dest>/tmp/`.
    pub archive: PathBuf,
    /// `<dest>/unpack/`.
    pub unpack_dir: PathBuf,
    pub artifact: PinnedArtifact,
}

/// Downloads the pinned tarball for `platform` into `<dest>/tmp/`, checks its
/// SHA-256 and unpacks it into `<dest>/unpack/`.
pub fn fetch_nix(
    dest: &Path,
    pins: &PinTable,
    platform: &Platform,
    opts: &FetchOptions,
) -> Result<FetchedNix> {
    let artifact = pins.lookup(platform)?.clone();
    let url = pins.url_for(&artifact);
    tracing::info!(%platform, system = %artifact.system, %url, "selected pinned Nix release");

    let tmp_dir = dest.join(TMP_DIR);
    let unpack_dir = dest.join(UNPACK_DIR);
    for dir in [&tmp_dir, &unpack_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    let archive = tmp_dir.join(format!("{}.tar.xz", artifact.path));
    if let Err(e) = fetch::download_to_file(&url, &archive, opts) {
        let _ = fs::remove_file(&archive);
        return Err(e);
    }

    if let Err(e) = checksum::verify_sha256(&archive, &artifact.hash) {
        tracing::warn!(archive = %archive.display(), "discarding archive: {:#}", e);
        let _ = fs::remove_file(&archive);
        return Err(e);
    }

    unpack::unpack_tar_xz(&archive, &unpack_dir)
        .with_context(|| format!("unpack {}", archive.display()))?;

    Ok(FetchedNix {
        archive,
        unpack_dir,
        artifact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;

    #[test]
    fn unsupported_platform_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dest");
        // Unroutable base: any network attempt would surface as a Download error.
        let pins = PinTable::new("0.0", "http://127.0.0.1:9");
        let err = fetch_nix(
            &dest,
            &pins,
            &Platform::from_uname("Plan9", "mips"),
            &FetchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::UnsupportedSystem(_))
        ));
        assert!(!dest.exists());
    }
}
