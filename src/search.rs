//! The search path: an ordered list of mounts consulted for every read.
//!
//! Order is priority. Adding is atomic: the backend is probed and opened
//! before the list is touched, so a failed add leaves no trace. Removal is
//! refused while any handle opened through the mount is alive; the handle
//! itself only holds a counter, never the archive, so it cannot extend the
//! mount's life silently.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::archive::Archive;
use crate::error::Error;
use crate::error::Result;
use crate::file::File;
use crate::file::HandleGuard;
use crate::path::LogicalPath;

/// One entry in the search path: a host-side label and the archive opened
/// for it. The mount exclusively owns the archive.
#[derive(Debug)]
pub(crate) struct Mount {
    dir_name: PathBuf,
    archive: Box<dyn Archive>,
    handles: Arc<AtomicUsize>,
}

impl Mount {
    pub(crate) fn new(dir_name: PathBuf, archive: Box<dyn Archive>) -> Mount {
        Mount { dir_name, archive, handles: Arc::new(AtomicUsize::new(0)) }
    }

    fn open_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SearchPath {
    mounts: Vec<Mount>,
}

impl SearchPath {
    /// Insert a fully constructed mount at the head (prepend) or tail
    /// (append).
    pub(crate) fn add(&mut self, mount: Mount, append: bool) {
        if append {
            self.mounts.push(mount);
        } else {
            self.mounts.insert(0, mount);
        }
    }

    /// Remove the first mount labelled `dir_name`.
    pub(crate) fn remove(&mut self, dir_name: &Path) -> Result<()> {
        let position = self
            .mounts
            .iter()
            .position(|mount| mount.dir_name == dir_name)
            .ok_or(Error::NotInSearchPath)?;
        if self.mounts[position].open_handles() > 0 {
            return Err(Error::FilesStillOpen);
        }
        self.mounts.remove(position);
        Ok(())
    }

    /// Snapshot of the mount labels in priority order.
    pub(crate) fn list(&self) -> Vec<PathBuf> {
        self.mounts.iter().map(|mount| mount.dir_name.clone()).collect()
    }

    /// First mount that contains `path`, honoring the symlink policy: a
    /// match that is a symlink is skipped (and the search continues) unless
    /// `allow_symlinks` is set.
    pub(crate) fn resolve(&self, path: &LogicalPath, allow_symlinks: bool) -> Option<&Mount> {
        self.mounts.iter().find(|mount| {
            mount.archive.exists(path)
                && (allow_symlinks || !mount.archive.is_symlink(path))
        })
    }

    /// Open `path` for reading from the first mount that has it.
    pub(crate) fn open_read(&self, path: &LogicalPath, allow_symlinks: bool) -> Result<File> {
        let mount = self.resolve(path, allow_symlinks).ok_or(Error::NotFound)?;
        let handle = mount.archive.open_read(path)?;
        Ok(File::read_only(handle, HandleGuard::new(&mount.handles)))
    }

    /// Host label of the mount that would satisfy a read of `path`.
    pub(crate) fn real_dir(&self, path: &LogicalPath, allow_symlinks: bool) -> Result<PathBuf> {
        self.resolve(path, allow_symlinks)
            .map(|mount| mount.dir_name.clone())
            .ok_or(Error::NotFound)
    }

    /// Union of every mount's children at `dir`, deduplicated preserving
    /// first-occurrence order across mounts.
    pub(crate) fn enumerate(&self, dir: &LogicalPath) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut names = Vec::new();
        for mount in &self.mounts {
            let Ok(children) = mount.archive.enumerate(dir) else {
                continue;
            };
            for name in children {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Total open handles across all mounts.
    pub(crate) fn open_handles(&self) -> usize {
        self.mounts.iter().map(Mount::open_handles).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.mounts.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::file::FileHandle;

    /// In-memory archive with a fixed set of entries, for exercising the
    /// manager without touching the host filesystem.
    #[derive(Debug)]
    struct FixedArchive {
        entries: Vec<(&'static str, &'static [u8])>,
        symlinks: Vec<&'static str>,
    }

    impl FixedArchive {
        fn new(entries: Vec<(&'static str, &'static [u8])>) -> FixedArchive {
            FixedArchive { entries, symlinks: Vec::new() }
        }

        fn find(&self, path: &LogicalPath) -> Option<&'static [u8]> {
            self.entries
                .iter()
                .find(|(name, _)| *name == path.as_str())
                .map(|(_, data)| *data)
        }
    }

    impl Archive for FixedArchive {
        fn enumerate(&self, dir: &LogicalPath) -> Result<Vec<String>> {
            if !dir.is_root() {
                return Ok(Vec::new());
            }
            Ok(self.entries.iter().map(|(name, _)| (*name).to_owned()).collect())
        }

        fn exists(&self, path: &LogicalPath) -> bool {
            self.find(path).is_some()
        }

        fn is_directory(&self, path: &LogicalPath) -> bool {
            path.is_root()
        }

        fn is_symlink(&self, path: &LogicalPath) -> bool {
            self.symlinks.contains(&path.as_str())
        }

        fn open_read(&self, path: &LogicalPath) -> Result<Box<dyn FileHandle>> {
            let data = self.find(path).ok_or(Error::NotFound)?;
            Ok(Box::new(FixedHandle { data, pos: 0 }))
        }
    }

    #[derive(Debug)]
    struct FixedHandle {
        data: &'static [u8],
        pos: usize,
    }

    impl FileHandle for FixedHandle {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let remaining = &self.data[self.pos..];
            let count = remaining.len().min(buf.len());
            buf[..count].copy_from_slice(&remaining[..count]);
            self.pos += count;
            Ok(count)
        }

        fn seek(&mut self, pos: u64) -> Result<()> {
            if pos > self.data.len() as u64 {
                return Err(Error::PastEof);
            }
            self.pos = pos as usize;
            Ok(())
        }

        fn tell(&self) -> Result<u64> {
            Ok(self.pos as u64)
        }

        fn length(&self) -> Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn eof(&self) -> bool {
            self.pos >= self.data.len()
        }
    }

    fn mount(label: &str, entries: Vec<(&'static str, &'static [u8])>) -> Mount {
        Mount::new(PathBuf::from(label), Box::new(FixedArchive::new(entries)))
    }

    fn logical(path: &str) -> &LogicalPath {
        LogicalPath::new(path).unwrap()
    }

    #[test]
    fn prepend_and_append_ordering() {
        let mut search = SearchPath::default();
        search.add(mount("/m", vec![]), false);
        search.add(mount("/n", vec![]), false);
        assert_eq!(search.list(), [PathBuf::from("/n"), PathBuf::from("/m")]);

        let mut search = SearchPath::default();
        search.add(mount("/m", vec![]), true);
        search.add(mount("/n", vec![]), true);
        assert_eq!(search.list(), [PathBuf::from("/m"), PathBuf::from("/n")]);
    }

    #[test]
    fn remove_restores_previous_list() {
        let mut search = SearchPath::default();
        search.add(mount("/keep", vec![]), true);
        let before = search.list();
        search.add(mount("/gone", vec![]), true);
        search.remove(Path::new("/gone")).unwrap();
        assert_eq!(search.list(), before);
        assert!(matches!(search.remove(Path::new("/gone")), Err(Error::NotInSearchPath)));
    }

    #[test]
    fn first_match_wins() {
        let mut search = SearchPath::default();
        search.add(mount("/ro", vec![("foo", b"base")]), true);
        search.add(mount("/over", vec![("foo", b"patch")]), false);
        let mut file = search.open_read(logical("foo"), false).unwrap();
        let mut buf = [0u8; 8];
        let count = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..count], b"patch");
        assert_eq!(search.real_dir(logical("foo"), false).unwrap(), PathBuf::from("/over"));
    }

    #[test]
    fn symlink_matches_are_skipped_without_permission() {
        let mut search = SearchPath::default();
        let mut linked = FixedArchive::new(vec![("cfg", b"via link")]);
        linked.symlinks.push("cfg");
        search.add(Mount::new(PathBuf::from("/links"), Box::new(linked)), true);
        search.add(mount("/plain", vec![("cfg", b"direct")]), true);

        // Policy off: the symlink mount is passed over in favor of the next.
        assert_eq!(search.real_dir(logical("cfg"), false).unwrap(), PathBuf::from("/plain"));
        // Policy on: priority order applies again.
        assert_eq!(search.real_dir(logical("cfg"), true).unwrap(), PathBuf::from("/links"));
    }

    #[test]
    fn enumerate_deduplicates_in_first_occurrence_order() {
        let mut search = SearchPath::default();
        search.add(mount("/d1", vec![("a", b""), ("b", b"")]), true);
        search.add(mount("/d2", vec![("b", b""), ("c", b"")]), true);
        assert_eq!(search.enumerate(logical("")), ["a", "b", "c"]);
    }

    #[test]
    fn open_handles_block_removal() {
        let mut search = SearchPath::default();
        search.add(mount("/data", vec![("foo", b"x")]), true);
        let file = search.open_read(logical("foo"), false).unwrap();
        assert_eq!(search.open_handles(), 1);
        assert!(matches!(search.remove(Path::new("/data")), Err(Error::FilesStillOpen)));
        drop(file);
        assert_eq!(search.open_handles(), 0);
        search.remove(Path::new("/data")).unwrap();
    }
}
