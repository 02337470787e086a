//! File handles.
//!
//! Backends produce [`FileHandle`] implementations; the façade wraps them
//! in [`File`], which carries the RAII bookkeeping that ties a handle's
//! lifetime to its mount (or to the write root) without extending either.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use log::warn;

use crate::error::Error;
use crate::error::Result;

/// The capability set of an open file.
///
/// Each capability may be absent; the defaults report
/// [`Error::NotSupported`] instead of leaving holes for callers to probe.
/// Positions are absolute byte offsets.
pub trait FileHandle: fmt::Debug + Send {
    /// Read into `buf`, returning the number of bytes actually read.
    /// A short read is not an error.
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    /// Write from `buf`, returning the number of bytes actually written.
    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    /// Reposition to the absolute offset `pos`.
    ///
    /// Read handles reject positions past the end with [`Error::PastEof`];
    /// write handles may seek past the end where the host pads with zeros.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current absolute position.
    fn tell(&self) -> Result<u64>;

    /// Total length of the file in bytes.
    fn length(&self) -> Result<u64>;

    /// True once the position has reached the length.
    fn eof(&self) -> bool;

    /// Flush whatever the backend buffers. Called exactly once by the
    /// owning [`File`] before the handle is released; failure keeps the
    /// handle open.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Counter tied to a mount or to the write root; incremented while a handle
/// is alive, released exactly once on drop.
#[derive(Debug)]
pub(crate) struct HandleGuard {
    counter: Arc<AtomicUsize>,
}

impl HandleGuard {
    pub(crate) fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        HandleGuard { counter: Arc::clone(counter) }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An open file in the virtual tree, produced by
/// [`Vfs::open_read`](crate::Vfs::open_read),
/// [`Vfs::open_write`](crate::Vfs::open_write) or
/// [`Vfs::open_append`](crate::Vfs::open_append).
///
/// Dropping a `File` closes it best-effort; call [`close`](File::close) to
/// observe flush failures, which matters for anything opened for writing.
/// `std::io::{Read, Write, Seek}` adapters are provided for interop.
#[derive(Debug)]
pub struct File {
    handle: Option<Box<dyn FileHandle>>,
    writable: bool,
    _guard: Option<HandleGuard>,
}

impl File {
    pub(crate) fn read_only(handle: Box<dyn FileHandle>, guard: HandleGuard) -> Self {
        File { handle: Some(handle), writable: false, _guard: Some(guard) }
    }

    pub(crate) fn writable(handle: Box<dyn FileHandle>, guard: HandleGuard) -> Self {
        File { handle: Some(handle), writable: true, _guard: Some(guard) }
    }

    fn inner_mut(&mut self) -> Result<&mut (dyn FileHandle + 'static)> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_mut()),
            None => Err(Error::NotSupported),
        }
    }

    fn inner(&self) -> Result<&(dyn FileHandle + 'static)> {
        match self.handle.as_ref() {
            Some(handle) => Ok(handle.as_ref()),
            None => Err(Error::NotSupported),
        }
    }

    /// Whether this handle was opened for writing.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read into `buf`, returning the byte count actually read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner_mut()?.read(buf)
    }

    /// Write from `buf`, returning the byte count actually written.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner_mut()?.write(buf)
    }

    /// Reposition to the absolute offset `pos`.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner_mut()?.seek(pos)
    }

    /// Current absolute position.
    pub fn tell(&self) -> Result<u64> {
        self.inner()?.tell()
    }

    /// Total length in bytes.
    pub fn length(&self) -> Result<u64> {
        self.inner()?.length()
    }

    /// True once the position has reached the end of the file.
    pub fn eof(&self) -> bool {
        self.handle.as_deref().is_some_and(FileHandle::eof)
    }

    /// Close the handle, surfacing flush failures.
    ///
    /// On failure the handle stays open and is handed back together with
    /// the error, so the caller may retry or inspect it.
    pub fn close(mut self) -> Result<(), (File, Error)> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        match handle.close() {
            Ok(()) => {
                self.handle = None;
                Ok(())
            }
            Err(err) => Err((self, err)),
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(err) = handle.close() {
                warn!("closing dropped file failed: {err}");
            }
        }
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        File::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => offset,
            io::SeekFrom::End(delta) => seek_target(self.length()?, delta)?,
            io::SeekFrom::Current(delta) => seek_target(self.tell()?, delta)?,
        };
        File::seek(self, target)?;
        Ok(target)
    }
}

fn seek_target(base: u64, delta: i64) -> io::Result<u64> {
    base.checked_add_signed(delta)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"))
}
