//! Declarative package list for the debug shell image.
//!
//! The manifest renders to a `flake.nix` whose default package is a
//! `buildEnv` of the listed nixpkgs attributes.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Systems the flake exposes packages for.
pub const FLAKE_SYSTEMS: &[&str] = &[
    "x86_64-linux",
    "aarch64-linux",
    "i686-linux",
    "armv7l-linux",
];

const DEFAULT_PACKAGES: &[&str] = &[
    "bashInteractive",
    "coreutils",
    "findutils",
    "gnugrep",
    "gnused",
    "gawk",
    "less",
    "vim",
    "file",
    "procps",
    "psmisc",
    "util-linux",
    "iproute2",
    "iputils",
    "bind.dnsutils",
    "curl",
    "tcpdump",
    "strace",
    "ltrace",
    "gdb",
    "lsof",
    "htop",
    "jq",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugShellManifest {
    pub description: String,
    pub nixpkgs_ref: String,
    /// Attribute paths under `pkgs`, e.g. `bind.dnsutils`.
    pub packages: Vec<String>,
}

impl Default for DebugShellManifest {
    fn default() -> Self {
        Self {
            description: "nixdbg debug shell".to_string(),
            nixpkgs_ref: "github:NixOS/nixpkgs/nixos-unstable".to_string(),
            packages: DEFAULT_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Nix identifier: letter or `_` first, then alphanumerics, `_`, `-`, `'`.
fn is_nix_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '\''))
}

fn is_attr_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_nix_ident)
}

impl DebugShellManifest {
    /// Every package must be a dotted Nix attribute path; the list must be
    /// non-empty and free of duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.packages.is_empty() {
            anyhow::bail!("debug shell manifest lists no packages");
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.packages {
            if !is_attr_path(p) {
                anyhow::bail!("invalid nixpkgs attribute {:?}", p);
            }
            if !seen.insert(p.as_str()) {
                anyhow::bail!("duplicate package {:?}", p);
            }
        }
        if self.nixpkgs_ref.contains('"') || self.description.contains('"') {
            anyhow::bail!("manifest strings must not contain '\"'");
        }
        Ok(())
    }

    pub fn render_flake(&self) -> Result<String> {
        self.validate()?;
        let mut out = String::new();
        writeln!(out, "{{")?;
        writeln!(out, "  description = \"{}\";", self.description)?;
        writeln!(out)?;
        writeln!(out, "  inputs.nixpkgs.url = \"{}\";", self.nixpkgs_ref)?;
        writeln!(out)?;
        writeln!(out, "  outputs = {{ self, nixpkgs }}:")?;
        writeln!(out, "    let")?;
        write!(out, "      systems = [")?;
        for s in FLAKE_SYSTEMS {
            write!(out, " \"{}\"", s)?;
        }
        writeln!(out, " ];")?;
        writeln!(out, "      forAll = nixpkgs.lib.genAttrs systems;")?;
        writeln!(out, "    in {{")?;
        writeln!(out, "      packages = forAll (system:")?;
        writeln!(out, "        let pkgs = nixpkgs.legacyPackages.${{system}}; in {{")?;
        writeln!(out, "          default = pkgs.buildEnv {{")?;
        writeln!(out, "            name = \"debug-shell\";")?;
        writeln!(out, "            paths = with pkgs; [")?;
        for p in &self.packages {
            writeln!(out, "              {}", p)?;
        }
        writeln!(out, "            ];")?;
        writeln!(out, "          }};")?;
        writeln!(out, "        }});")?;
        writeln!(out, "    }};")?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    /// Writes `<dir>/flake.nix`, creating `dir` if needed.
    pub fn write_flake(&self, dir: &Path) -> Result<PathBuf> {
        let flake = self.render_flake()?;
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join("flake.nix");
        fs::write(&path, flake).with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %path.display(), packages = self.packages.len(), "wrote flake");
        Ok(path)
    }
}
