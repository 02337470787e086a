//! The top-level façade.
//!
//! A [`Vfs`] value is the whole virtual filesystem: search path, write
//! root, error slots and the registered archive formats, behind an
//! explicit init/deinit state machine. There are no process globals;
//! tests (and embedders) run as many independent contexts as they like.
//!
//! Structural mutation (init, deinit, mounting, write-root changes) takes
//! `&mut self`, so the external-serialization requirement for those
//! operations is enforced by the borrow checker rather than documentation.
//! Reads and opens take `&self` and may run concurrently.

use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;

use log::debug;

use crate::archive::ArchiveFormat;
use crate::archive::ArchiveInfo;
use crate::error::Error;
use crate::error::ErrorSlots;
use crate::error::Result;
use crate::file::File;
use crate::path::LogicalPath;
use crate::platform;
use crate::registry;
use crate::search::Mount;
use crate::search::SearchPath;
use crate::write_dir::WriteRoot;

/// State that only exists between `init` and `deinit`.
#[derive(Debug)]
struct State {
    base_dir: PathBuf,
    user_dir: OnceLock<PathBuf>,
    allow_symlinks: bool,
    search: SearchPath,
    write: WriteRoot,
}

/// A virtual filesystem context.
///
/// Created empty with [`Vfs::new`], brought to life with [`Vfs::init`].
/// Every fallible operation reports its failure twice: as the returned
/// `Err`, and as a message parked in the calling thread's error slot for
/// consumption by [`Vfs::last_error`].
#[derive(Debug)]
pub struct Vfs {
    formats: Vec<&'static dyn ArchiveFormat>,
    errors: ErrorSlots,
    state: Option<State>,
}

impl Vfs {
    /// A fresh, uninitialized context with the built-in archive formats.
    pub fn new() -> Vfs {
        Vfs {
            formats: registry::BUILTIN_FORMATS.to_vec(),
            errors: ErrorSlots::default(),
            state: None,
        }
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.errors.set(err);
        }
        result
    }

    fn ready(&self) -> Result<&State> {
        self.state.as_ref().ok_or(Error::NotInitialized)
    }

    fn ready_mut(&mut self) -> Result<&mut State> {
        self.state.as_mut().ok_or(Error::NotInitialized)
    }

    /// Initialize the context, deriving the base directory from `argv0`.
    ///
    /// Fails with [`Error::IsInitialized`] if called twice without an
    /// intervening [`deinit`](Vfs::deinit).
    pub fn init(&mut self, argv0: &str) -> Result<()> {
        let result = self.init_inner(argv0);
        self.record(result)
    }

    fn init_inner(&mut self, argv0: &str) -> Result<()> {
        if self.state.is_some() {
            return Err(Error::IsInitialized);
        }
        if argv0.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let base_dir = platform::base_dir(argv0)?;
        self.state = Some(State {
            base_dir,
            user_dir: OnceLock::new(),
            allow_symlinks: false,
            search: SearchPath::default(),
            write: WriteRoot::default(),
        });
        Ok(())
    }

    /// Tear the context down: clear the search path and write root, release
    /// the error slots, return to the uninitialized state.
    ///
    /// Refused with [`Error::FilesStillOpen`] while any handle opened
    /// through this context is alive: a handle only carries counters, so
    /// tearing down under it cannot be done safely on its behalf. Dropping
    /// the `Vfs` instead tears down unconditionally.
    pub fn deinit(&mut self) -> Result<()> {
        let result = self.deinit_inner();
        self.record(result)
    }

    fn deinit_inner(&mut self) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;
        if state.search.open_handles() > 0 || state.write.open_writers() > 0 {
            return Err(Error::FilesStillOpen);
        }
        state.write.set(None)?;
        state.search.clear();
        self.state = None;
        self.errors.clear();
        Ok(())
    }

    /// Whether [`init`](Vfs::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Register an archive format; later mounts probe it after the ones
    /// already registered. The directory backend stays the last resort.
    pub fn register_format(&mut self, format: &'static dyn ArchiveFormat) {
        self.formats.push(format);
    }

    /// Descriptors of the registered archive formats, in probe order.
    pub fn supported_archive_types(&self) -> Vec<&'static ArchiveInfo> {
        self.formats.iter().map(|format| format.info()).collect()
    }

    /// Consume and return the calling thread's pending error message.
    ///
    /// Destructive: a second call without an intervening failure returns
    /// `None`. Successful operations leave the slot untouched.
    pub fn last_error(&self) -> Option<String> {
        self.errors.take()
    }

    /// Directory the program was started from.
    pub fn base_dir(&self) -> Result<&Path> {
        let result = self.ready().map(|state| state.base_dir.as_path());
        self.record(result)
    }

    /// Directory where per-user data belongs.
    ///
    /// The platform's notion of the user's home wins; failing that `$HOME`;
    /// failing that `users/<name>` under the base directory. Computed once
    /// and memoized.
    pub fn user_dir(&self) -> Result<&Path> {
        let result = self
            .ready()
            .map(|state| state.user_dir.get_or_init(|| user_dir_for(&state.base_dir)).as_path());
        self.record(result)
    }

    /// Mount points of optical media currently visible. May block while
    /// the drive is probed.
    pub fn cd_rom_dirs(&self) -> Result<Vec<PathBuf>> {
        let result = self.ready().map(|_| platform::cd_roms());
        self.record(result)
    }

    /// The current write root, if one is configured.
    pub fn write_dir(&self) -> Result<Option<&Path>> {
        let result = self.ready().map(|state| state.write.get());
        self.record(result)
    }

    /// Point the write root at `dir`, creating it (recursively) if needed;
    /// `None` clears it, forbidding writes. Refused with
    /// [`Error::FilesStillOpenForWrite`] while writable handles are open.
    pub fn set_write_dir(&mut self, dir: Option<&Path>) -> Result<()> {
        let result = self.ready_mut().and_then(|state| state.write.set(dir));
        self.record(result)
    }

    /// Add `dir` to the search path, prepended (highest priority) or
    /// appended (lowest).
    ///
    /// The backend is chosen by probing the registered formats in order;
    /// a host directory that no format claims is mounted raw. Atomic: on
    /// failure the search path is unchanged and nothing is left open.
    pub fn add_search_path(&mut self, dir: impl AsRef<Path>, append: bool) -> Result<()> {
        let result = self.add_search_path_inner(dir.as_ref(), append);
        self.record(result)
    }

    fn add_search_path_inner(&mut self, dir: &Path, append: bool) -> Result<()> {
        if dir.as_os_str().is_empty() {
            return Err(Error::InvalidArgument);
        }
        let state = self.state.as_mut().ok_or(Error::NotInitialized)?;
        let archive = registry::open_backend(&self.formats, dir, state.allow_symlinks)?;
        state.search.add(Mount::new(dir.to_path_buf(), archive), append);
        debug!("mounted {dir:?} ({})", if append { "appended" } else { "prepended" });
        Ok(())
    }

    /// Remove `dir` from the search path and close its archive.
    ///
    /// Refused with [`Error::FilesStillOpen`] while handles opened through
    /// this mount are alive; [`Error::NotInSearchPath`] if nothing matches.
    pub fn remove_search_path(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let result = self.remove_search_path_inner(dir.as_ref());
        self.record(result)
    }

    fn remove_search_path_inner(&mut self, dir: &Path) -> Result<()> {
        self.ready_mut()?.search.remove(dir)?;
        debug!("unmounted {dir:?}");
        Ok(())
    }

    /// Snapshot of the search path, in priority order.
    pub fn search_path(&self) -> Result<Vec<PathBuf>> {
        let result = self.ready().map(|state| state.search.list());
        self.record(result)
    }

    /// Allow or forbid resolving through symbolic links. Off by default;
    /// affects subsequent operations only.
    pub fn permit_symbolic_links(&mut self, allow: bool) -> Result<()> {
        let result = self.ready_mut().map(|state| state.allow_symlinks = allow);
        self.record(result)
    }

    /// Open the first match for `path` in search-path order for reading.
    pub fn open_read(&self, path: &str) -> Result<File> {
        let result = self.open_read_inner(path);
        self.record(result)
    }

    fn open_read_inner(&self, path: &str) -> Result<File> {
        let state = self.ready()?;
        let logical = LogicalPath::new(path)?;
        state.search.open_read(logical, state.allow_symlinks)
    }

    /// Open `path` under the write root for writing, truncating any
    /// existing content. Missing parent directories are created.
    ///
    /// Opening the same logical path for writing twice at once is a caller
    /// error; the handles would race on the same host file.
    pub fn open_write(&self, path: &str) -> Result<File> {
        let result = self.open_output(path, false);
        self.record(result)
    }

    /// Open `path` under the write root with the offset at the current end
    /// of the file; nothing is truncated.
    pub fn open_append(&self, path: &str) -> Result<File> {
        let result = self.open_output(path, true);
        self.record(result)
    }

    fn open_output(&self, path: &str, append: bool) -> Result<File> {
        let state = self.ready()?;
        let logical = LogicalPath::new(path)?;
        state.write.open_write(logical, append)
    }

    /// Create a directory (and missing intermediates) under the write
    /// root. Succeeds if it already exists.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let result = self.mkdir_inner(path);
        self.record(result)
    }

    fn mkdir_inner(&self, path: &str) -> Result<()> {
        let state = self.ready()?;
        let logical = LogicalPath::new(path)?;
        state.write.mkdir(logical)
    }

    /// Delete a file or empty directory under the write root.
    pub fn delete(&self, path: &str) -> Result<()> {
        let result = self.delete_inner(path);
        self.record(result)
    }

    fn delete_inner(&self, path: &str) -> Result<()> {
        let state = self.ready()?;
        let logical = LogicalPath::new(path)?;
        state.write.delete(logical)
    }

    /// Union listing of `dir` across every mount, deduplicated preserving
    /// first-occurrence order.
    pub fn enumerate(&self, dir: &str) -> Result<Vec<String>> {
        let result = self.enumerate_inner(dir);
        self.record(result)
    }

    fn enumerate_inner(&self, dir: &str) -> Result<Vec<String>> {
        let state = self.ready()?;
        let logical = LogicalPath::new(dir)?;
        Ok(state.search.enumerate(logical))
    }

    /// Host label of the search-path entry a read of `path` would come
    /// from.
    pub fn real_dir(&self, path: &str) -> Result<PathBuf> {
        let result = self.real_dir_inner(path);
        self.record(result)
    }

    fn real_dir_inner(&self, path: &str) -> Result<PathBuf> {
        let state = self.ready()?;
        let logical = LogicalPath::new(path)?;
        state.search.real_dir(logical, state.allow_symlinks)
    }
}

impl Default for Vfs {
    fn default() -> Vfs {
        Vfs::new()
    }
}

fn user_dir_for(base_dir: &Path) -> PathBuf {
    if let Some(dir) = platform::user_dir() {
        return dir;
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home);
    }
    let name = platform::user_name().unwrap_or_else(|| "default".to_owned());
    base_dir.join("users").join(name)
}
