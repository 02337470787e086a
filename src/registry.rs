//! Archive format registry and backend probing.

use std::path::Path;

use crate::archive::Archive;
use crate::archive::ArchiveFormat;
use crate::dir::DirArchive;
use crate::error::Error;
use crate::error::Result;

/// Formats compiled into the crate. Codec crates register theirs at
/// runtime via [`Vfs::register_format`](crate::Vfs::register_format).
pub(crate) static BUILTIN_FORMATS: &[&dyn ArchiveFormat] = &[];

/// Find the backend for a host path and open it.
///
/// Formats are probed in registration order; the first that claims the
/// path wins and its open result (success or failure) is final. The
/// directory backend is the last resort: it takes any host path that no
/// format claimed, provided the path is a directory.
pub(crate) fn open_backend(
    formats: &[&'static dyn ArchiveFormat],
    host: &Path,
    allow_symlinks: bool,
) -> Result<Box<dyn Archive>> {
    for format in formats {
        if format.is_archive(host, allow_symlinks) {
            return format.open(host, allow_symlinks);
        }
    }
    if host.is_dir() {
        return Ok(Box::new(DirArchive::open(host, allow_symlinks)?));
    }
    Err(Error::UnsupportedArchive)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_files_are_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("data.bin");
        std::fs::write(&file, b"not an archive").unwrap();
        let result = open_backend(BUILTIN_FORMATS, &file, false);
        assert!(matches!(result, Err(Error::UnsupportedArchive)));
    }

    #[test]
    fn directories_fall_back_to_the_dir_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = open_backend(BUILTIN_FORMATS, tmp.path(), false).unwrap();
        assert!(backend.enumerate(crate::LogicalPath::new("").unwrap()).unwrap().is_empty());
    }

    #[test]
    fn missing_paths_are_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("gone");
        assert!(matches!(
            open_backend(BUILTIN_FORMATS, &gone, false),
            Err(Error::UnsupportedArchive)
        ));
    }
}
