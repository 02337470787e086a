//! The write root: the single host directory all modifications land in.
//!
//! Write requests bypass the search path entirely and talk to the
//! directory backend rooted here. While any writable handle is open the
//! root is pinned; changing or clearing it is refused.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::archive::Archive;
use crate::dir::DirArchive;
use crate::error::Error;
use crate::error::Result;
use crate::file::File;
use crate::file::HandleGuard;
use crate::path::LogicalPath;

#[derive(Debug, Default)]
pub(crate) struct WriteRoot {
    backend: Option<DirArchive>,
    writers: Arc<AtomicUsize>,
}

impl WriteRoot {
    /// Current write root, if one is configured.
    pub(crate) fn get(&self) -> Option<&Path> {
        self.backend.as_ref().map(DirArchive::root)
    }

    /// Point the write root at `dir` (created recursively if missing), or
    /// clear it with `None`. Refused while writable handles are open.
    pub(crate) fn set(&mut self, dir: Option<&Path>) -> Result<()> {
        if self.open_writers() > 0 {
            return Err(Error::FilesStillOpenForWrite);
        }
        self.backend = match dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|_| Error::NoDirCreate)?;
                Some(DirArchive::open(dir, true)?)
            }
            None => None,
        };
        Ok(())
    }

    pub(crate) fn open_writers(&self) -> usize {
        self.writers.load(Ordering::SeqCst)
    }

    fn backend(&self) -> Result<&DirArchive> {
        self.backend.as_ref().ok_or(Error::NoWriteDir)
    }

    /// Open `path` under the root for writing (truncate) or appending.
    pub(crate) fn open_write(&self, path: &LogicalPath, append: bool) -> Result<File> {
        let handle = self.backend()?.open_write(path, append)?;
        Ok(File::writable(Box::new(handle), HandleGuard::new(&self.writers)))
    }

    /// Create a directory (and missing intermediates) under the root.
    pub(crate) fn mkdir(&self, path: &LogicalPath) -> Result<()> {
        self.backend()?.mkdir(path)
    }

    /// Remove a file or empty directory under the root.
    pub(crate) fn delete(&self, path: &LogicalPath) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidArgument);
        }
        self.backend()?.remove(path)
    }
}
