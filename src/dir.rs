//! The directory backend: the archiver contract implemented against a plain
//! host directory via `std::fs`.
//!
//! This is the only backend that implements the writable capabilities, and
//! the only one the write root talks to; writes never go through mounted
//! archives.

use std::fs;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::archive::Archive;
use crate::error::Error;
use crate::error::Result;
use crate::file::FileHandle;
use crate::path::LogicalPath;
use crate::platform;

/// An archive backed by a real directory on the host filesystem.
#[derive(Debug)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    /// Open a directory as an archive.
    ///
    /// Fails with [`Error::NotADir`] if `root` is not a directory, or if it
    /// is reached through a symlink while `allow_symlinks` is off.
    pub fn open(root: &Path, allow_symlinks: bool) -> Result<DirArchive> {
        if !allow_symlinks && platform::is_symlink(root) {
            return Err(Error::NotADir);
        }
        if !root.is_dir() {
            return Err(Error::NotADir);
        }
        Ok(DirArchive { root: root.to_path_buf() })
    }

    /// The host directory this archive is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native(&self, path: &LogicalPath) -> PathBuf {
        path.to_native(&self.root)
    }

    /// Open a file under the root for writing.
    ///
    /// Missing parent directories are created. With `append` unset the file
    /// is truncated and the offset starts at zero; with it set the offset
    /// starts at the current end and nothing is truncated.
    pub(crate) fn open_write(&self, path: &LogicalPath, append: bool) -> Result<DirFile> {
        if path.is_root() {
            return Err(Error::NotAFile);
        }
        let native = self.native(path);
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent).map_err(|_| Error::NoDirCreate)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(!append)
            .open(&native)?;
        let pos = if append { file.seek(SeekFrom::End(0))? } else { 0 };
        Ok(DirFile::writable(file, pos))
    }
}

impl Archive for DirArchive {
    fn enumerate(&self, dir: &LogicalPath) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.native(dir))? {
            // Entries with non-UTF-8 names have no logical spelling; skip them.
            if let Ok(name) = entry?.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    fn exists(&self, path: &LogicalPath) -> bool {
        fs::symlink_metadata(self.native(path)).is_ok()
    }

    fn is_directory(&self, path: &LogicalPath) -> bool {
        fs::metadata(self.native(path)).is_ok_and(|metadata| metadata.is_dir())
    }

    fn is_symlink(&self, path: &LogicalPath) -> bool {
        platform::is_symlink(&self.native(path))
    }

    fn open_read(&self, path: &LogicalPath) -> Result<Box<dyn FileHandle>> {
        let native = self.native(path);
        let metadata = fs::metadata(&native).map_err(|_| Error::NotFound)?;
        if !metadata.is_file() {
            return Err(Error::NotAFile);
        }
        let file = fs::File::open(&native)?;
        Ok(Box::new(DirFile::read_only(file, metadata.len())))
    }

    fn remove(&self, path: &LogicalPath) -> Result<()> {
        let native = self.native(path);
        let metadata = fs::symlink_metadata(&native).map_err(|_| Error::NotFound)?;
        if metadata.is_dir() {
            fs::remove_dir(&native)?;
        } else {
            fs::remove_file(&native)?;
        }
        Ok(())
    }

    fn mkdir(&self, path: &LogicalPath) -> Result<()> {
        fs::create_dir_all(self.native(path))?;
        Ok(())
    }
}

/// Handle over a host file.
///
/// Read handles cache the length observed at open time and refuse to seek
/// past it; write handles ask the host for the live length instead.
#[derive(Debug)]
pub(crate) struct DirFile {
    file: fs::File,
    pos: u64,
    cached_len: Option<u64>,
    writable: bool,
}

impl DirFile {
    fn read_only(file: fs::File, len: u64) -> DirFile {
        DirFile { file, pos: 0, cached_len: Some(len), writable: false }
    }

    fn writable(file: fs::File, pos: u64) -> DirFile {
        DirFile { file, pos, cached_len: None, writable: true }
    }

    fn current_len(&self) -> Result<u64> {
        match self.cached_len {
            Some(len) => Ok(len),
            None => Ok(self.file.metadata()?.len()),
        }
    }
}

impl FileHandle for DirFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.writable {
            return Err(Error::NotSupported);
        }
        let count = self.file.read(buf)?;
        self.pos += count as u64;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::NotSupported);
        }
        let count = self.file.write(buf)?;
        self.pos += count as u64;
        Ok(count)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if !self.writable && pos > self.current_len()? {
            return Err(Error::PastEof);
        }
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.pos)
    }

    fn length(&self) -> Result<u64> {
        self.current_len()
    }

    fn eof(&self) -> bool {
        self.current_len().is_ok_and(|len| self.pos >= len)
    }

    fn close(&mut self) -> Result<()> {
        if self.writable {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn logical(path: &str) -> &LogicalPath {
        LogicalPath::new(path).unwrap()
    }

    fn scratch() -> (tempfile::TempDir, DirArchive) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("maps")).unwrap();
        fs::write(tmp.path().join("maps/level1.map"), b"terrain").unwrap();
        fs::write(tmp.path().join("readme.txt"), b"hi").unwrap();
        let archive = DirArchive::open(tmp.path(), false).unwrap();
        (tmp, archive)
    }

    #[test]
    fn open_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, b"").unwrap();
        assert!(matches!(DirArchive::open(&file, false), Err(Error::NotADir)));
    }

    #[test]
    fn existence_and_kind_checks() {
        let (_tmp, archive) = scratch();
        assert!(archive.exists(logical("maps/level1.map")));
        assert!(archive.exists(logical("maps")));
        assert!(!archive.exists(logical("missing")));
        assert!(archive.is_directory(logical("maps")));
        assert!(!archive.is_directory(logical("readme.txt")));
    }

    #[test]
    fn enumerate_lists_direct_children_sorted() {
        let (_tmp, archive) = scratch();
        assert_eq!(archive.enumerate(logical("")).unwrap(), ["maps", "readme.txt"]);
        assert_eq!(archive.enumerate(logical("maps")).unwrap(), ["level1.map"]);
    }

    #[test]
    fn read_handle_lifecycle() {
        let (_tmp, archive) = scratch();
        let mut handle = archive.open_read(logical("maps/level1.map")).unwrap();
        assert_eq!(handle.length().unwrap(), 7);
        let mut buf = [0u8; 4];
        assert_eq!(handle.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"terr");
        assert_eq!(handle.tell().unwrap(), 4);
        assert!(!handle.eof());
        let mut rest = [0u8; 16];
        assert_eq!(handle.read(&mut rest).unwrap(), 3);
        assert!(handle.eof());
        assert!(matches!(handle.write(b"x"), Err(Error::NotSupported)));
    }

    #[test]
    fn read_handle_rejects_seek_past_end() {
        let (_tmp, archive) = scratch();
        let mut handle = archive.open_read(logical("readme.txt")).unwrap();
        assert!(matches!(handle.seek(3), Err(Error::PastEof)));
        handle.seek(2).unwrap();
        assert!(handle.eof());
    }

    #[test]
    fn open_read_misses() {
        let (_tmp, archive) = scratch();
        assert!(matches!(archive.open_read(logical("missing")), Err(Error::NotFound)));
        assert!(matches!(archive.open_read(logical("maps")), Err(Error::NotAFile)));
    }

    #[test]
    fn write_handle_creates_parents_and_pads_on_seek() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = DirArchive::open(tmp.path(), false).unwrap();
        let mut handle = archive.open_write(logical("a/b/x.bin"), false).unwrap();
        handle.write(b"ab").unwrap();
        handle.seek(4).unwrap();
        handle.write(b"cd").unwrap();
        handle.close().unwrap();
        assert_eq!(fs::read(tmp.path().join("a/b/x.bin")).unwrap(), b"ab\0\0cd");
    }

    #[test]
    fn append_starts_at_end() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("log.txt"), b"one").unwrap();
        let archive = DirArchive::open(tmp.path(), false).unwrap();
        let mut handle = archive.open_write(logical("log.txt"), true).unwrap();
        assert_eq!(handle.tell().unwrap(), 3);
        handle.write(b"two").unwrap();
        handle.close().unwrap();
        assert_eq!(fs::read(tmp.path().join("log.txt")).unwrap(), b"onetwo");
    }

    #[test]
    fn remove_files_and_empty_dirs() {
        let (tmp, archive) = scratch();
        archive.remove(logical("maps/level1.map")).unwrap();
        archive.remove(logical("maps")).unwrap();
        assert!(!tmp.path().join("maps").exists());
        assert!(matches!(archive.remove(logical("maps")), Err(Error::NotFound)));
    }

    #[test]
    #[cfg(unix)]
    fn symlinks_are_reported() {
        let (tmp, archive) = scratch();
        std::os::unix::fs::symlink("readme.txt", tmp.path().join("link.txt")).unwrap();
        assert!(archive.is_symlink(logical("link.txt")));
        assert!(!archive.is_symlink(logical("readme.txt")));
    }
}
