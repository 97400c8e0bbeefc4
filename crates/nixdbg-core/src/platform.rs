//! Host platform detection.
//!
//! Names follow `uname -s` / `uname -m` so a platform can be given on the
//! command line the same way it would be reported by the shell.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    I686,
    Armv7l,
    Other(String),
}

impl Os {
    /// Parse a `uname -s` style name. Matching is case-insensitive and
    /// unknown names are kept lowercased, as `std::env::consts::OS` has them.
    pub fn from_uname(sysname: &str) -> Self {
        let s = sysname.trim();
        if s.eq_ignore_ascii_case("linux") {
            Os::Linux
        } else if s.eq_ignore_ascii_case("darwin") || s.eq_ignore_ascii_case("macos") {
            Os::Darwin
        } else {
            Os::Other(s.to_ascii_lowercase())
        }
    }

    /// Name as used in a Nix system double (`x86_64-linux`).
    pub fn nix_name(&self) -> &str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Other(s) => s,
        }
    }
}

impl Arch {
    /// Parse a `uname -m` style name, folding the usual aliases.
    pub fn from_uname(machine: &str) -> Self {
        let machine = machine.trim().to_ascii_lowercase();
        match machine.as_str() {
            "x86_64" | "amd64" => Arch::X86_64,
            "aarch64" | "arm64" => Arch::Aarch64,
            "i686" | "i386" | "x86" => Arch::I686,
            "armv7l" | "armv7" | "arm" => Arch::Armv7l,
            _ => Arch::Other(machine),
        }
    }

    pub fn nix_name(&self) -> &str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::I686 => "i686",
            Arch::Armv7l => "armv7l",
            Arch::Other(s) => s,
        }
    }
}

/// An (OS, architecture) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn from_uname(sysname: &str, machine: &str) -> Self {
        Self::new(Os::from_uname(sysname), Arch::from_uname(machine))
    }

    /// Platform of the running process.
    pub fn detect() -> Self {
        Self::from_uname(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Nix system double, e.g. `aarch64-linux`.
    pub fn nix_system(&self) -> String {
        format!("{}-{}", self.arch.nix_name(), self.os.nix_name())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.nix_name(), self.arch.nix_name())
    }
}

/// Parses `<os>/<arch>` as accepted by `--system`.
impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <os>/<arch>, got {:?}", s))?;
        if os.trim().is_empty() || arch.trim().is_empty() {
            return Err(format!("expected <os>/<arch>, got {:?}", s));
        }
        Ok(Platform::from_uname(os, arch))
    }
}
