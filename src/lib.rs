//! Layered read/write virtual filesystem.
//!
//! `stratafs` unifies real directories and archive files into a single
//! logical tree behind a portable path syntax. Applications configure a
//! prioritized search path of mounts and read resources by logical name;
//! the first mount that has a match wins, with archives decoded
//! transparently by their registered backend. All writes go to one
//! separate write directory on the real filesystem, never into archives.
//!
//! ```no_run
//! use stratafs::Vfs;
//!
//! # fn main() -> Result<(), stratafs::Error> {
//! let mut vfs = Vfs::new();
//! vfs.init("/usr/local/bin/game")?;
//! vfs.set_write_dir(Some("/home/player/.game".as_ref()))?;
//! vfs.add_search_path("/home/player/.game", false)?;
//! vfs.add_search_path("/usr/local/share/game", true)?;
//!
//! let mut file = vfs.open_read("maps/level1.map")?;
//! let mut bytes = Vec::new();
//! std::io::Read::read_to_end(&mut file, &mut bytes)?;
//! # Ok(()) }
//! ```
//!
//! Custom archive formats plug in through [`ArchiveFormat`] and
//! [`Archive`]; plain host directories are handled by the built-in
//! [`DirArchive`] backend as a last resort.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;

pub use crate::archive::Archive;
pub use crate::archive::ArchiveFormat;
pub use crate::archive::ArchiveInfo;
pub use crate::dir::DirArchive;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::file::File;
pub use crate::file::FileHandle;
pub use crate::path::LogicalPath;
pub use crate::vfs::Vfs;

mod archive;
mod dir;
mod error;
mod file;
mod path;
mod platform;
mod registry;
mod search;
mod vfs;
mod write_dir;

/// Crate version triple, as reported by [`linked_version`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Version {
    /// Incompatible API changes.
    pub major: u16,
    /// Backwards-compatible additions.
    pub minor: u16,
    /// Backwards-compatible fixes.
    pub patch: u16,
}

/// The version of the crate this program was compiled against.
pub const fn linked_version() -> Version {
    Version { major: 0, minor: 4, patch: 0 }
}

/// The separator the host filesystem uses between path components.
///
/// Only relevant when assembling host paths to hand to
/// [`Vfs::set_write_dir`] or [`Vfs::add_search_path`]; logical paths
/// always use `/`.
pub fn dir_separator() -> &'static str {
    platform::path_separator()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn linked_version_matches_cargo_metadata() {
        let version = linked_version();
        let expected = format!("{}.{}.{}", version.major, version.minor, version.patch);
        assert_eq!(env!("CARGO_PKG_VERSION"), expected);
    }

    #[test]
    fn dir_separator_is_nonempty() {
        assert!(!dir_separator().is_empty());
    }
}
