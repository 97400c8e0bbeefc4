//! Typed failures of the bootstrap path.
//!
//! Callers mostly propagate these through `anyhow`; tests and the CLI match
//! on the variant when the distinction matters (e.g. a checksum mismatch must
//! never be followed by an unpack).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// No pinned artifact exists for this (OS, architecture) pair.
    #[error("unsupported system: {0}")]
    UnsupportedSystem(String),

    /// The downloaded archive does not hash to the pinned digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// libcurl reported an error (DNS, TLS, timeout, ...).
    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: curl::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("GET {url} returned HTTP {code}")]
    Http { url: String, code: u32 },

    /// The archive could not be decompressed or contains an unsafe entry.
    #[error("unpack failed: {0}")]
    Unpack(String),

    /// The unpacked release does not contain a `store` directory.
    #[error("downloaded tarball did not contain any Nix store under {}", .0.display())]
    NoStoreInArchive(PathBuf),

    /// The release `install` script has no `nix="/nix/store/..."` line.
    #[error("could not detect Nix store path in {}", .0.display())]
    NixPathNotFound(PathBuf),

    /// The kernel or AppArmor forbids unprivileged user namespaces.
    #[error("{0}")]
    UsernsRestricted(String),

    /// A pin from config is malformed.
    #[error("invalid pin for {system}: {reason}")]
    InvalidPin { system: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
