//! The contract every archive backend implements.
//!
//! Anything that can contain files (a ZIP-style archive, a custom pak
//! format, or a plain host directory) is surfaced to the rest of the
//! crate through two traits. [`ArchiveFormat`] is the static side of a
//! backend: a descriptor plus the probing and opening entry points the
//! registry dispatches on. [`Archive`] is one opened instance, rooted at a
//! host path, answering enumeration, existence and open-for-read requests
//! against logical names.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::file::FileHandle;
use crate::path::LogicalPath;
use crate::platform;

/// Static description of an archive format, advertised through
/// [`Vfs::supported_archive_types`](crate::Vfs::supported_archive_types).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ArchiveInfo {
    /// File extension the format claims, without the dot (e.g. `"zip"`).
    /// Matched case-insensitively against host file names.
    pub extension: &'static str,
    /// Human-readable one-line description.
    pub description: &'static str,
    /// Maintainer of the backend.
    pub author: &'static str,
    /// Where to find the backend's documentation or source.
    pub url: &'static str,
}

/// The static side of an archive backend: probing and construction.
///
/// Implementations are registered with
/// [`Vfs::register_format`](crate::Vfs::register_format) as `&'static`
/// references; registration order is probe priority.
pub trait ArchiveFormat: fmt::Debug + Sync {
    /// Descriptor used to advertise this format.
    fn info(&self) -> &'static ArchiveInfo;

    /// Cheap probe: does this backend plausibly own the host object?
    ///
    /// The default claims regular files whose extension matches
    /// [`ArchiveInfo::extension`] case-insensitively, refusing symlinks
    /// unless `allow_symlinks` is set. Formats with magic-number probing
    /// should override this.
    fn is_archive(&self, host: &Path, allow_symlinks: bool) -> bool {
        if !allow_symlinks && platform::is_symlink(host) {
            return false;
        }
        let Some(extension) = host.extension().and_then(OsStr::to_str) else {
            return false;
        };
        platform::stricmp(extension, self.info().extension) == Ordering::Equal && host.is_file()
    }

    /// Construct an archive instance rooted at `host`.
    ///
    /// Called only after [`is_archive`](Self::is_archive) claimed the path;
    /// may still fail if the content turns out to be malformed.
    fn open(&self, host: &Path, allow_symlinks: bool) -> Result<Box<dyn Archive>>;
}

/// One opened backend instance.
///
/// Logical paths arriving here have already been validated. Read-only
/// backends simply leave [`remove`](Self::remove) and
/// [`mkdir`](Self::mkdir) alone; the defaults report the missing
/// capability as [`Error::NotSupported`] at the call site.
///
/// Closing is `Drop`. Implementations must leave handles produced by
/// [`open_read`](Self::open_read) self-contained: a handle stays usable
/// (or fails cleanly) after its archive is gone, never dangles.
pub trait Archive: fmt::Debug + Send + Sync {
    /// List the direct children of a logical directory. An existing but
    /// empty directory yields an empty list.
    fn enumerate(&self, dir: &LogicalPath) -> Result<Vec<String>>;

    /// Presence check for a file or directory.
    fn exists(&self, path: &LogicalPath) -> bool;

    /// Whether `path` names a directory.
    fn is_directory(&self, path: &LogicalPath) -> bool;

    /// Whether `path` names a symbolic link.
    fn is_symlink(&self, path: &LogicalPath) -> bool;

    /// Open a file for reading, positioned at offset 0.
    fn open_read(&self, path: &LogicalPath) -> Result<Box<dyn FileHandle>>;

    /// Remove a file or empty directory. Writable backends only.
    fn remove(&self, _path: &LogicalPath) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Create a directory, including missing intermediates. Writable
    /// backends only.
    fn mkdir(&self, _path: &LogicalPath) -> Result<()> {
        Err(Error::NotSupported)
    }
}
