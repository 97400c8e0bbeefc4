//! Directory tree helpers: symlink-preserving copy and recursive read-only.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Recursively copy `src` into `dst` (created if missing), re-creating
/// symlinks instead of following them. `keep(dir, name)` decides, per entry
/// of source directory `dir`, whether the entry is copied.
pub fn copy_tree<F>(src: &Path, dst: &Path, keep: &F) -> Result<()>
where
    F: Fn(&Path, &str) -> bool,
{
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read dir {}", src.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if !keep(src, &name_str) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_symlink() {
            let target = fs::read_link(&from)?;
            if to.symlink_metadata().is_ok() {
                fs::remove_file(&to)?;
            }
            symlink(&target, &to)
                .with_context(|| format!("symlink {} -> {}", to.display(), target.display()))?;
        } else if ft.is_dir() {
            copy_tree(&from, &to, keep)?;
            let perms = fs::metadata(&from)?.permissions();
            fs::set_permissions(&to, perms)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

/// Remove write permission for everyone on `path` and everything below it.
/// Symlinks are left alone.
pub fn make_read_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    if meta.is_dir() {
        for entry in fs::read_dir(path)? {
            make_read_only(&entry?.path())?;
        }
    }
    let mode = meta.permissions().mode() & !0o222;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod a-w {}", path.display()))?;
    Ok(())
}

/// Give the owner write access to every directory under `path` again so the
/// tree can be removed. Files are left as they are.
pub fn make_dirs_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        return Ok(());
    }
    let mode = meta.permissions().mode() | 0o700;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    for entry in fs::read_dir(path)? {
        make_dirs_writable(&entry?.path())?;
    }
    Ok(())
}

pub fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}
