//! `.tar.xz` extraction with path traversal checks.
//!
//! Symlinks are kept: the Nix store is full of them. Entry paths themselves
//! must be relative and free of `..`, and nothing is written through a
//! symlink that points outside the destination.

use crate::error::BootstrapError;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path};
use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

fn unpack_err(msg: impl Into<String>) -> anyhow::Error {
    BootstrapError::Unpack(msg.into()).into()
}

/// Rejects absolute paths and any `..`, root or prefix component.
fn validate_entry_path(path: &Path) -> Result<()> {
    if path.is_absolute() {
        return Err(unpack_err(format!("absolute path {}", path.display())));
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(unpack_err(format!("path escapes destination: {}", path.display())));
        }
    }
    Ok(())
}

/// Fails unless the deepest existing ancestor of `target` resolves inside
/// `dest`. Anything below that ancestor is created fresh, so it cannot be a
/// symlink.
fn check_inside(dest: &Path, target: &Path) -> Result<()> {
    let mut existing = target;
    while existing.symlink_metadata().is_err() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => break,
        }
    }
    let resolved = existing
        .canonicalize()
        .map_err(|e| unpack_err(format!("resolve {}: {e}", existing.display())))?;
    if !resolved.starts_with(dest) {
        return Err(unpack_err(format!(
            "path escapes destination: {}",
            target.display()
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(mode & 0o7777))
        .with_context(|| format!("chmod {}", dir.display()))
}

#[cfg(not(unix))]
fn set_dir_mode(_dir: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Extract `archive` (xz-compressed tar) into `dest`. Returns the number of
/// entries unpacked.
pub fn unpack_tar_xz(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let dest = dest
        .canonicalize()
        .with_context(|| format!("canonicalize {}", dest.display()))?;

    let mut tar = Archive::new(XzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);
    tar.set_preserve_mtime(true);
    tar.set_overwrite(true);

    let mut count = 0usize;
    // Directory modes are applied last: release store dirs are read-only.
    let mut dir_modes = Vec::new();
    let entries = tar
        .entries()
        .map_err(|e| unpack_err(format!("read archive entries: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| unpack_err(format!("read archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| unpack_err(format!("read entry path: {e}")))?
            .into_owned();
        validate_entry_path(&path)?;
        count += 1;

        if entry.header().entry_type() == EntryType::Directory {
            let dir = dest.join(&path);
            check_inside(&dest, &dir)?;
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
            if let Ok(mode) = entry.header().mode() {
                dir_modes.push((dir, mode));
            }
            continue;
        }

        // `unpack_in` refuses to write through symlinks that leave `dest`.
        let unpacked = entry
            .unpack_in(&dest)
            .map_err(|e| unpack_err(format!("unpack {}: {e}", path.display())))?;
        if !unpacked {
            return Err(unpack_err(format!("path escapes destination: {}", path.display())));
        }
    }

    for (dir, mode) in dir_modes.iter().rev() {
        set_dir_mode(dir, *mode)?;
    }

    if count == 0 {
        return Err(unpack_err("archive is empty"));
    }
    tracing::info!(entries = count, dest = %dest.display(), "unpacked");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use xz2::write::XzEncoder;

    enum Fixture<'a> {
        File(&'a str, &'a [u8]),
        Dir(&'a str, u32),
        Symlink(&'a str, &'a str),
    }

    /// Build a `.tar.xz` at `out` from `entries`.
    fn write_tar_xz(out: &Path, entries: &[Fixture<'_>]) {
        let file = File::create(out).unwrap();
        let mut builder = tar::Builder::new(XzEncoder::new(file, 6));
        for e in entries {
            let mut header = tar::Header::new_gnu();
            match e {
                Fixture::File(path, data) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(data.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder.append_data(&mut header, path, *data).unwrap();
                }
                Fixture::Dir(path, mode) => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(*mode);
                    header.set_cksum();
                    builder.append_data(&mut header, path, std::io::empty()).unwrap();
                }
                Fixture::Symlink(path, target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, path, target).unwrap();
                }
            }
        }
        let enc = builder.into_inner().unwrap();
        enc.finish().unwrap().flush().unwrap();
    }

    #[test]
    fn unpacks_files_dirs_and_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.tar.xz");
        write_tar_xz(
            &archive,
            &[
                Fixture::Dir("nix-x/", 0o755),
                Fixture::File("nix-x/install", b"#!/bin/sh\n"),
                Fixture::Dir("nix-x/store/abc-nix/bin/", 0o755),
                Fixture::File("nix-x/store/abc-nix/bin/nix", b"ELF"),
                Fixture::Symlink("nix-x/store/abc-nix/bin/nix-store", "nix"),
            ],
        );
        let dest = dir.path().join("unpack");
        let n = unpack_tar_xz(&archive, &dest).unwrap();
        assert_eq!(n, 5);
        assert_eq!(fs::read(dest.join("nix-x/install")).unwrap(), b"#!/bin/sh\n");
        let link = dest.join("nix-x/store/abc-nix/bin/nix-store");
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("nix"));
    }

    #[cfg(unix)]
    #[test]
    fn read_only_dirs_get_their_mode_last() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ro.tar.xz");
        write_tar_xz(
            &archive,
            &[
                Fixture::Dir("store/", 0o555),
                Fixture::Dir("store/abc-nix/", 0o555),
                Fixture::File("store/abc-nix/nix", b"ELF"),
            ],
        );
        let dest = dir.path().join("unpack");
        unpack_tar_xz(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("store/abc-nix/nix")).unwrap(), b"ELF");
        let mode = fs::metadata(dest.join("store/abc-nix")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o555);

        crate::tree::make_dirs_writable(&dest).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn dir_through_escaping_symlink_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        let archive = dir.path().join("evil.tar.xz");
        let target = outside.to_str().unwrap();
        write_tar_xz(
            &archive,
            &[
                Fixture::Symlink("evil", target),
                Fixture::Dir("evil/planted/", 0o755),
            ],
        );
        let err = unpack_tar_xz(&archive, &dir.path().join("unpack")).unwrap_err();
        assert!(err.to_string().contains("path escapes destination"));
        assert!(!outside.join("planted").exists());
    }

    #[test]
    fn empty_archive_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("empty.tar.xz");
        write_tar_xz(&archive, &[]);
        let err = unpack_tar_xz(&archive, &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("archive is empty"));
    }

    #[test]
    fn garbage_is_unpack_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("junk.tar.xz");
        fs::write(&archive, b"definitely not xz").unwrap();
        let err = unpack_tar_xz(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::Unpack(_))
        ));
    }

    #[test]
    fn entry_path_validation() {
        assert!(validate_entry_path(Path::new("a/b/c")).is_ok());
        assert!(validate_entry_path(Path::new("./a")).is_ok());
        assert!(validate_entry_path(Path::new("../a")).is_err());
        assert!(validate_entry_path(Path::new("a/../../b")).is_err());
        assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
    }
}
