//! Private user + mount namespace with the base directory mounted at `/nix`.
//!
//! The calling process must be single-threaded when entering the namespace
//! (`unshare(CLONE_NEWUSER)` fails with `EINVAL` otherwise); the CLI runs
//! this from a freshly spawned child for that reason.

use anyhow::{Context, Result};
use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

fn cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains NUL: {}", path.display()))
}

fn check(ret: libc::c_int, what: &str) -> Result<()> {
    if ret == -1 {
        return Err(io::Error::last_os_error()).context(what.to_string());
    }
    Ok(())
}

/// Unshare user and mount namespaces and map the caller's uid/gid to
/// themselves.
pub fn enter_user_mount_ns() -> Result<()> {
    // SAFETY: getuid/getgid cannot fail and touch no memory.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

    // SAFETY: plain syscall with flag arguments.
    check(
        unsafe { libc::unshare(libc::CLONE_NEWUSER | libc::CLONE_NEWNS) },
        "unshare(CLONE_NEWUSER | CLONE_NEWNS)",
    )?;

    fs::write("/proc/self/uid_map", format!("{uid} {uid} 1\n")).context("write uid_map")?;
    fs::write("/proc/self/setgroups", "deny").context("write setgroups")?;
    fs::write("/proc/self/gid_map", format!("{gid} {gid} 1\n")).context("write gid_map")?;
    tracing::debug!(uid, gid, "entered user+mount namespace");
    Ok(())
}

/// Recursive bind mount of `src` onto `dst`.
pub fn bind_mount(src: &Path, dst: &Path) -> Result<()> {
    let c_src = cstring(src)?;
    let c_dst = cstring(dst)?;
    let fstype = CString::default();
    // SAFETY: all pointers are valid NUL-terminated strings for the call's
    // duration; data is null as allowed for bind mounts.
    let ret = unsafe {
        libc::mount(
            c_src.as_ptr(),
            c_dst.as_ptr(),
            fstype.as_ptr(),
            libc::MS_BIND | libc::MS_REC,
            std::ptr::null(),
        )
    };
    check(ret, &format!("bind mount {} -> {}", src.display(), dst.display()))
}

/// What to do with one top-level entry of the host root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorAction {
    /// Re-create the symlink `name -> target` in the new root.
    Symlink { name: String, target: PathBuf },
    /// Create `name` and bind-mount the host directory onto it.
    Bind { name: String },
}

/// Plan how to mirror `host_root`'s top-level entries into a new root.
/// `/nix` is skipped (the base directory takes its place); plain files are
/// ignored.
pub fn plan_root_mirror(host_root: &Path) -> Result<Vec<MirrorAction>> {
    let mut actions = Vec::new();
    for entry in fs::read_dir(host_root).with_context(|| format!("read dir {}", host_root.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "nix" {
            continue;
        }
        let ft = entry.file_type()?;
        if ft.is_symlink() {
            let target = fs::read_link(entry.path())?;
            actions.push(MirrorAction::Symlink { name, target });
        } else if ft.is_dir() {
            actions.push(MirrorAction::Bind { name });
        }
    }
    actions.sort_by(|a, b| mirror_name(a).cmp(mirror_name(b)));
    Ok(actions)
}

fn mirror_name(a: &MirrorAction) -> &str {
    match a {
        MirrorAction::Symlink { name, .. } | MirrorAction::Bind { name } => name,
    }
}

/// Mirror the host `/` into `new_root` and bind `base` onto `new_root/nix`.
pub fn bind_mount_root_dirs(base: &Path, new_root: &Path) -> Result<()> {
    let host_root = Path::new("/");
    for action in plan_root_mirror(host_root)? {
        match action {
            MirrorAction::Symlink { name, target } => {
                crate::tree::symlink(&target, &new_root.join(&name))
                    .with_context(|| format!("symlink {}", name))?;
            }
            MirrorAction::Bind { name } => {
                let dst = new_root.join(&name);
                fs::create_dir_all(&dst)?;
                bind_mount(&host_root.join(&name), &dst)?;
            }
        }
    }
    let nix = new_root.join("nix");
    fs::create_dir_all(&nix)?;
    bind_mount(base, &nix)
}

/// `chroot` into `root`, then return to the same working directory path.
pub fn chroot_keep_cwd(root: &Path) -> Result<()> {
    let cwd = std::env::current_dir().context("current dir")?;
    let c_root = cstring(root)?;
    // SAFETY: c_root is a valid NUL-terminated string.
    check(unsafe { libc::chroot(c_root.as_ptr()) }, "chroot")?;
    std::env::set_current_dir(&cwd)
        .with_context(|| format!("chdir {} inside chroot", cwd.display()))?;
    Ok(())
}
