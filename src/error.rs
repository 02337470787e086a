//! Error type and the per-thread last-error channel.
//!
//! Failures are surfaced twice: as the `Err` variant of the returning call,
//! and as a short message parked in a slot owned by the calling thread.
//! Callers that poll [`Vfs::last_error`](crate::Vfs::last_error) consume the
//! slot destructively, so one failure is reported at most once per thread.

use std::collections::HashMap;
use std::io;

use parking_lot::Mutex;
use thiserror::Error;

use crate::platform;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong inside the virtual filesystem.
///
/// The `Display` rendering of each variant is a stable identifier; host I/O
/// failures pass the operating system's message through verbatim.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The context has already been initialized.
    #[error("IsInitialized")]
    IsInitialized,
    /// The context has not been initialized yet.
    #[error("NotInitialized")]
    NotInitialized,
    /// A logical path or argument was malformed.
    #[error("InvalidArgument")]
    InvalidArgument,
    /// The write root cannot change while writable handles are open.
    #[error("FilesStillOpenForWrite")]
    FilesStillOpenForWrite,
    /// A mount cannot be removed (or the context torn down) while handles
    /// opened through it are still alive.
    #[error("FilesStillOpen")]
    FilesStillOpen,
    /// A write operation was attempted with no write root configured.
    #[error("NoWriteDir")]
    NoWriteDir,
    /// A directory could not be created on the host.
    #[error("NoDirCreate")]
    NoDirCreate,
    /// An allocation failed.
    #[error("OutOfMemory")]
    OutOfMemory,
    /// The named directory is not part of the search path.
    #[error("NotInSearchPath")]
    NotInSearchPath,
    /// No registered archive format claims the host path, and it is not a
    /// directory either.
    #[error("UnsupportedArchive")]
    UnsupportedArchive,
    /// The backend does not implement the requested capability.
    #[error("NotSupported")]
    NotSupported,
    /// No mount contains the named file.
    #[error("NotFound")]
    NotFound,
    /// The logical path names something other than a regular file.
    #[error("NotAFile")]
    NotAFile,
    /// The host path names something other than a directory.
    #[error("NotADir")]
    NotADir,
    /// A read handle was asked to seek beyond the end of the file.
    #[error("PastEOF")]
    PastEof,
    /// Host filesystem failure, surfaced verbatim.
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(io) => io,
            other => io::Error::other(other),
        }
    }
}

/// Error messages longer than this are truncated before they are parked in
/// a thread's slot.
pub(crate) const MAX_ERROR_LEN: usize = 79;

#[derive(Debug, Default)]
struct Slot {
    available: bool,
    message: String,
}

/// One last-error slot per thread that has ever failed, keyed by the
/// platform thread id. Slots are created lazily under the table lock; each
/// slot is only ever read and written by its owning thread afterwards.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlots {
    slots: Mutex<HashMap<u64, Slot>>,
}

impl ErrorSlots {
    /// Park `err` in the calling thread's slot, replacing whatever was there.
    pub(crate) fn set(&self, err: &Error) {
        let message = truncate_message(err.to_string());
        let mut slots = self.slots.lock();
        let slot = slots.entry(platform::thread_id()).or_default();
        slot.available = true;
        slot.message = message;
    }

    /// Consume and return the calling thread's pending message, if any.
    pub(crate) fn take(&self) -> Option<String> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&platform::thread_id())?;
        if !slot.available {
            return None;
        }
        slot.available = false;
        Some(std::mem::take(&mut slot.message))
    }

    /// Release every slot.
    pub(crate) fn clear(&self) {
        self.slots.lock().clear();
    }
}

fn truncate_message(mut message: String) -> String {
    if message.len() > MAX_ERROR_LEN {
        let mut end = MAX_ERROR_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}
