//! Error taxonomy for the public API.
//!
//! The reference design returns negative sentinel integers; we model the
//! same taxonomy as a proper error enum instead, matching how the rest of
//! the crate avoids sentinel values in favor of explicit types (see
//! [`crate::fat`]'s use of `Option` rather than `-1`/`-2`).

use thiserror::Error;

/// Errors surfaced by the public [`crate::Sfs`] API.
///
/// `write` is the one call that does *not* use this type for allocation
/// exhaustion: a mid-call allocation failure truncates the write and
/// returns `Ok` with the number of bytes actually persisted, per the
/// on-disk contract described in [`crate::engine`].
#[derive(Debug, Error)]
pub enum SfsError {
    /// A named file, or a file descriptor, does not exist.
    #[error("no such file")]
    NotFound,
    /// The directory table, the FAT, or the free-block list is exhausted.
    #[error("out of space")]
    OutOfSpace,
    /// The open-file table is full.
    #[error("too many open files")]
    MaxOpen,
    /// A read walked past the terminal entry of a FAT chain.
    #[error("read past end of file")]
    UnknownPosition,
    /// The underlying block device returned an I/O error.
    #[error("device I/O error: {0}")]
    Device(#[from] std::io::Error),
}

// `std::io::Error` has no `PartialEq`, so this can't be derived; compare the
// I/O variant by its `ErrorKind` instead, which is as close to "the same
// error" as `io::Error` gets.
impl PartialEq for SfsError {
    fn eq(&self, other: &Self) -> bool {
        use SfsError::*;
        match (self, other) {
            (NotFound, NotFound)
            | (OutOfSpace, OutOfSpace)
            | (MaxOpen, MaxOpen)
            | (UnknownPosition, UnknownPosition) => true,
            (Device(a), Device(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl Eq for SfsError {}

pub type Result<T> = core::result::Result<T, SfsError>;
