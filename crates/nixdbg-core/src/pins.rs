//! Pinned Nix release artifacts.
//!
//! A table maps (OS, architecture) to the tarball stem, Nix system double and
//! SHA-256 of the release tarball. Entries come from the `[[pins]]` section
//! of the config (see [`PinOverride`]); digests are copied from the
//! `<stem>.tar.xz.sha256` files published next to each release tarball.

use crate::error::BootstrapError;
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default Nix release.
pub const NIX_VERSION: &str = "2.24.10";

/// Release host the URL template is rooted at.
pub const RELEASE_BASE_URL: &str = "https://releases.nixos.org/nix";

/// One pinned release tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedArtifact {
    /// Lowercase hex SHA-256 of the tarball.
    pub hash: String,
    /// Tarball stem, e.g. `nix-2.24.10-x86_64-linux`.
    pub path: String,
    /// Nix system double, e.g. `x86_64-linux`.
    pub system: String,
}

/// `[[pins]]` entry in config.toml. OS and arch names are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinOverride {
    /// `uname -s` style OS name.
    pub os: String,
    /// `uname -m` style architecture name.
    pub arch: String,
    pub hash: String,
    /// Defaults to `nix-<version>-<system>`.
    #[serde(default)]
    pub path: Option<String>,
    /// Defaults to the platform's Nix system double.
    #[serde(default)]
    pub system: Option<String>,
}

/// Mapping from platform to pinned artifact plus the URL template inputs.
#[derive(Debug, Clone)]
pub struct PinTable {
    version: String,
    base_url: String,
    entries: HashMap<Platform, PinnedArtifact>,
}

fn default_path(version: &str, system: &str) -> String {
    format!("nix-{}-{}", version, system)
}

/// Checks a digest is 64 hex characters and returns it lowercased.
pub fn normalize_sha256_hex(hash: &str) -> Option<String> {
    let hash = hash.trim();
    if hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash.to_ascii_lowercase())
    } else {
        None
    }
}

impl PinTable {
    /// Empty table for `version` rooted at `base_url`.
    pub fn new(version: &str, base_url: &str) -> Self {
        Self {
            version: version.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, platform: Platform, artifact: PinnedArtifact) {
        self.entries.insert(platform, artifact);
    }

    /// Add config pins to this table; a later entry for the same platform
    /// replaces an earlier one.
    pub fn with_overrides(mut self, overrides: &[PinOverride]) -> Result<Self, BootstrapError> {
        for o in overrides {
            let platform = Platform::from_uname(&o.os, &o.arch);
            let system = o.system.clone().unwrap_or_else(|| platform.nix_system());
            let hash = normalize_sha256_hex(&o.hash).ok_or_else(|| BootstrapError::InvalidPin {
                system: system.clone(),
                reason: format!("hash {:?} is not a hex SHA-256 digest", o.hash),
            })?;
            let path = o
                .path
                .clone()
                .unwrap_or_else(|| default_path(&self.version, &system));
            if path.is_empty() || path.contains('/') {
                return Err(BootstrapError::InvalidPin {
                    system,
                    reason: format!("path {:?} must be a bare tarball name", path),
                });
            }
            tracing::debug!(%platform, %system, "pin override");
            self.insert(platform, PinnedArtifact { hash, path, system });
        }
        Ok(self)
    }

    /// Pinned artifact for `platform`, or `UnsupportedSystem`.
    pub fn lookup(&self, platform: &Platform) -> Result<&PinnedArtifact, BootstrapError> {
        self.entries
            .get(platform)
            .ok_or_else(|| {
                BootstrapError::UnsupportedSystem(format!(
                    "{} (no pin for Nix {})",
                    platform, self.version
                ))
            })
    }

    /// `{base_url}/nix-{version}/{path}.tar.xz`
    pub fn url_for(&self, artifact: &PinnedArtifact) -> String {
        format!(
            "{}/nix-{}/{}.tar.xz",
            self.base_url, self.version, artifact.path
        )
    }
}
