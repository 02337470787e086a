//! Logical path validation and translation to host-native form.
//!
//! A logical path is the `/`-separated, case-sensitive name a resource has
//! inside the virtual tree. Validation happens once, at the API boundary;
//! everything past that point works with the borrowed [`LogicalPath`]
//! newtype and can rely on the invariants it carries: no empty components,
//! no `.` or `..`, no `\` or `:` bytes, no absolute prefix. That is what
//! makes [`LogicalPath::to_native`] containment-safe without any post-hoc
//! checking.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use memchr::memchr2;
use ref_cast::RefCast;
use smallvec::SmallVec;

use crate::error::Error;
use crate::error::Result;

/// A validated `/`-separated path in the virtual namespace.
///
/// The empty path names the virtual root and is accepted wherever a
/// directory is expected. UTF-8 passes through opaquely; the logical layer
/// never folds case.
#[derive(Debug, PartialEq, Eq, Hash, RefCast)]
#[repr(transparent)]
pub struct LogicalPath(str);

impl LogicalPath {
    /// Validate `path` and borrow it as a `LogicalPath`.
    ///
    /// Rejects `\` and `:` anywhere, a leading `/`, and any component that
    /// is empty, `.`, or `..`.
    pub fn new(path: &str) -> Result<&LogicalPath> {
        if memchr2(b'\\', b':', path.as_bytes()).is_some() {
            return Err(Error::InvalidArgument);
        }
        if path.starts_with('/') {
            return Err(Error::InvalidArgument);
        }
        if !path.is_empty() {
            for component in path.split('/') {
                if component.is_empty() || component == "." || component == ".." {
                    return Err(Error::InvalidArgument);
                }
            }
        }
        Ok(LogicalPath::ref_cast(path))
    }

    /// The path as originally given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty path, which names the virtual root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the path's components in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|component| !component.is_empty())
    }

    /// Collect the components without touching the heap for short paths.
    pub fn split(&self) -> SmallVec<[&str; 8]> {
        self.components().collect()
    }

    /// Final component, if the path is not the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() { None } else { self.0.rsplit('/').next() }
    }

    /// Translate to a host path rooted at `root`.
    ///
    /// Each component is appended with the host separator. Because `..`
    /// never survives validation, the result always lies under `root`.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        let mut native = root.to_path_buf();
        for component in self.components() {
            native.push(component);
        }
        native
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
