use crate::manifest::DebugShellManifest;
use crate::pins::{self, PinOverride, PinTable};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// libcurl timeouts for the tarball download (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    /// Hard cap on the whole transfer.
    pub timeout_secs: u64,
    /// Bytes per second below which the transfer counts as stalled.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
        }
    }
}

/// Debug shell contents (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugShellConfig {
    /// Flake reference for nixpkgs.
    pub nixpkgs_ref: String,
    /// Attribute names under `pkgs`.
    pub packages: Vec<String>,
}

impl Default for DebugShellConfig {
    fn default() -> Self {
        let m = DebugShellManifest::default();
        Self {
            nixpkgs_ref: m.nixpkgs_ref,
            packages: m.packages,
        }
    }
}

/// Global configuration loaded from `~/.config/nixdbg/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NixdbgConfig {
    /// Nix release the pins refer to.
    pub nix_version: String,
    /// Root of the release URL template.
    pub release_base_url: String,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Pinned release tarballs, one per supported platform.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<PinOverride>,
    #[serde(default)]
    pub debug_shell: DebugShellConfig,
}

impl Default for NixdbgConfig {
    fn default() -> Self {
        Self {
            nix_version: pins::NIX_VERSION.to_string(),
            release_base_url: pins::RELEASE_BASE_URL.to_string(),
            fetch: FetchConfig::default(),
            pins: Vec::new(),
            debug_shell: DebugShellConfig::default(),
        }
    }
}

impl NixdbgConfig {
    /// Pin table for this config. Platforms without a `[[pins]]` entry are
    /// unsupported.
    pub fn pin_table(&self) -> Result<PinTable> {
        let base = url::Url::parse(&self.release_base_url)
            .with_context(|| format!("invalid release_base_url {:?}", self.release_base_url))?;
        if !matches!(base.scheme(), "https" | "http" | "file") {
            anyhow::bail!("unsupported release_base_url scheme {:?}", base.scheme());
        }
        let table = PinTable::new(&self.nix_version, &self.release_base_url)
            .with_overrides(&self.pins)?;
        if table.is_empty() {
            tracing::warn!("no [[pins]] configured; every platform is unsupported");
        }
        Ok(table)
    }

    pub fn manifest(&self) -> DebugShellManifest {
        DebugShellManifest {
            nixpkgs_ref: self.debug_shell.nixpkgs_ref.clone(),
            packages: self.debug_shell.packages.clone(),
            ..DebugShellManifest::default()
        }
    }
}

const PINS_HELP: &str = "\
# Add one [[pins]] table per platform. The hash is the content of
# <release_base_url>/nix-<nix_version>/nix-<nix_version>-<system>.tar.xz.sha256
#
# [[pins]]
# os = \"Linux\"
# arch = \"x86_64\"
# hash = \"<64 hex characters>\"

";

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nixdbg")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NixdbgConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = NixdbgConfig::default();
        let toml = format!("{}{}", PINS_HELP, toml::to_string_pretty(&default_cfg)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: NixdbgConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
