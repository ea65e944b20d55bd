//! The open-file table: a bounded set of live file descriptors and the
//! read/write cursors each one carries.

use arrayvec::ArrayVec;

use crate::error::{Result, SfsError};
use crate::fat::Fat;
use crate::param::{BLOCK_SIZE, MAX_NAME_LEN, MAX_OPEN};

/// A position within a file's FAT chain: which entry, and how far into its
/// bound data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub fat_idx: u32,
    /// Always in `[0, BLOCK_SIZE]`. `BLOCK_SIZE` means "this block is
    /// exhausted, advance before the next I/O."
    pub byte_off: usize,
}

/// A single open-file record. Snapshots the directory entry's name and FAT
/// root at `open` time; both caches stay in sync because only `remove`
/// (which also closes the fd) ever changes them afterwards.
pub struct OpenFile {
    name: [u8; MAX_NAME_LEN],
    name_len: usize,
    pub dir_idx: u32,
    pub fat_root: u32,
    pub read_cur: Cursor,
    pub write_cur: Cursor,
}

impl OpenFile {
    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }
}

pub struct OpenFileTable {
    // Boxed for the same reason `Fat`/`Directory` box their backing arrays:
    // a `MAX_OPEN`-entry table of `OpenFile` records is large enough that it
    // should not live inline inside `Sfs`.
    slots: Box<ArrayVec<Option<OpenFile>, MAX_OPEN>>,
}

impl OpenFileTable {
    pub fn new_empty() -> Self {
        let mut slots = Box::new(ArrayVec::new());
        for _ in 0..MAX_OPEN {
            slots.push(None);
        }
        Self { slots }
    }

    /// Claims the first free descriptor for `dir_idx`, whose FAT root is
    /// `fat_root` and whose current size is `size` bytes. The read cursor
    /// starts at the beginning of the chain; the write cursor starts at
    /// end-of-file.
    pub fn create(&mut self, dir_idx: u32, name: &[u8], fat_root: u32, size: i64, fat: &Fat) -> Result<usize> {
        let fd = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(SfsError::MaxOpen)?;
        let mut name_buf = [0u8; MAX_NAME_LEN];
        name_buf[..name.len()].copy_from_slice(name);
        let tail = fat.tail(fat_root);
        self.slots[fd] = Some(OpenFile {
            name: name_buf,
            name_len: name.len(),
            dir_idx,
            fat_root,
            read_cur: Cursor {
                fat_idx: fat_root,
                byte_off: 0,
            },
            write_cur: Cursor {
                fat_idx: tail,
                byte_off: (size as usize) % BLOCK_SIZE,
            },
        });
        Ok(fd)
    }

    pub fn destroy(&mut self, fd: usize) -> Result<()> {
        let slot = self.slots.get_mut(fd).ok_or(SfsError::NotFound)?;
        if slot.is_none() {
            return Err(SfsError::NotFound);
        }
        *slot = None;
        Ok(())
    }

    pub fn find_by_name(&self, name: &[u8]) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|f| f.name() == name))
    }

    pub fn find_by_dir_idx(&self, dir_idx: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|f| f.dir_idx == dir_idx))
    }

    pub fn get(&self, fd: usize) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(|s| s.as_ref())
            .ok_or(SfsError::NotFound)
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(|s| s.as_mut())
            .ok_or(SfsError::NotFound)
    }
}
