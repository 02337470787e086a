//! Host platform queries.
//!
//! Everything the rest of the crate needs to know about the machine it runs
//! on lives here: thread identity, well-known directories, removable media
//! and symlink detection. Nothing in this module knows about mounts or
//! logical paths.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use nix::unistd::Uid;
use nix::unistd::User;

/// Identifier of the calling thread, used to key per-thread error slots.
#[cfg(target_os = "linux")]
pub(crate) fn thread_id() -> u64 {
    nix::unistd::gettid().as_raw() as u64
}

/// Identifier of the calling thread, used to key per-thread error slots.
#[cfg(not(target_os = "linux"))]
pub(crate) fn thread_id() -> u64 {
    unsafe { libc::pthread_self() as u64 }
}

/// The separator the host filesystem uses between path components.
pub(crate) fn path_separator() -> &'static str {
    std::path::MAIN_SEPARATOR_STR
}

/// Directory the running program was started from, derived from `argv[0]`.
///
/// Falls back to the executable's real location and then to the current
/// working directory when `argv[0]` carries no directory part.
pub(crate) fn base_dir(argv0: &str) -> io::Result<PathBuf> {
    let arg = Path::new(argv0);
    if let Some(parent) = arg.parent() {
        if !parent.as_os_str().is_empty() {
            return Ok(parent.to_path_buf());
        }
    }
    #[cfg(target_os = "linux")]
    if let Ok(exe) = fs::read_link("/proc/self/exe") {
        if let Some(parent) = exe.parent() {
            return Ok(parent.to_path_buf());
        }
    }
    std::env::current_dir()
}

/// Home directory of the account we are running as, if the account database
/// knows one.
pub(crate) fn user_dir() -> Option<PathBuf> {
    User::from_uid(Uid::current()).ok().flatten().map(|user| user.dir)
}

/// Login name of the account we are running as.
pub(crate) fn user_name() -> Option<String> {
    User::from_uid(Uid::current()).ok().flatten().map(|user| user.name)
}

/// Mount points of optical media currently visible to the host.
///
/// Reading the mount table may block while the drive spins up.
#[cfg(target_os = "linux")]
pub(crate) fn cd_roms() -> Vec<PathBuf> {
    let Ok(mounts) = fs::read_to_string("/proc/mounts") else {
        return Vec::new();
    };
    let mut dirs = Vec::new();
    for line in mounts.lines() {
        let mut fields = line.split_whitespace();
        let _device = fields.next();
        let (Some(mount_point), Some(fs_type)) = (fields.next(), fields.next()) else {
            continue;
        };
        if fs_type == "iso9660" || fs_type == "udf" {
            dirs.push(PathBuf::from(mount_point));
        }
    }
    dirs
}

/// Mount points of optical media currently visible to the host.
#[cfg(not(target_os = "linux"))]
pub(crate) fn cd_roms() -> Vec<PathBuf> {
    Vec::new()
}

/// ASCII case-insensitive string comparison.
pub(crate) fn stricmp(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|byte| byte.to_ascii_lowercase());
    let b = b.bytes().map(|byte| byte.to_ascii_lowercase());
    a.cmp(b)
}

/// Whether `path` itself is a symbolic link (the link is not followed).
pub(crate) fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}
