//! The File Allocation Table: a table of `NDATA` entries, each describing
//! one link in a file's chain of data blocks.
//!
//! A file's storage is a singly linked list of FAT entries rooted at its
//! directory entry's `fat_root`. The on-disk record uses the sentinels
//! `END_OF_FILE = -1` and `NO_DATA = -2` described in the format, but the
//! in-memory representation models both as `Option` so that "is this index
//! real?" is a type-level question rather than an arithmetic one; the
//! sentinels are only materialized at the serialization boundary in
//! [`RawFatEntry::to_entry`]/[`RawFatEntry::from_entry`].

use array_macro::array;
use zerocopy::{AsBytes, FromBytes};

use crate::error::{Result, SfsError};
use crate::free_block_list::FreeBlockList;
use crate::param::{DATA_START, NDATA};

const END_OF_FILE: i32 = -1;
const NO_DATA: i32 = -2;

/// Bit-exact on-disk image of a single FAT entry.
#[repr(C)]
#[derive(Clone, Copy, AsBytes, FromBytes)]
pub struct RawFatEntry {
    pub used: u8,
    _padding: [u8; 3],
    pub data_block: i32,
    pub next: i32,
}

impl RawFatEntry {
    const FREE: Self = Self {
        used: 0,
        _padding: [0; 3],
        data_block: 0,
        next: 0,
    };

    fn to_entry(self) -> FatEntry {
        FatEntry {
            used: self.used != 0,
            data_block: match self.data_block {
                NO_DATA => None,
                n => Some(n as u32),
            },
            next: match self.next {
                END_OF_FILE => None,
                n => Some(n as u32),
            },
        }
    }

    fn from_entry(e: &FatEntry) -> Self {
        Self {
            used: e.used as u8,
            _padding: [0; 3],
            data_block: e.data_block.map_or(NO_DATA, |b| b as i32),
            next: e.next.map_or(END_OF_FILE, |n| n as i32),
        }
    }
}

/// In-memory view of a FAT entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FatEntry {
    pub used: bool,
    /// Absolute disk block index, or `None` if no block is bound yet.
    pub data_block: Option<u32>,
    /// Index of the next entry in the chain, or `None` at the chain's end.
    pub next: Option<u32>,
}

impl FatEntry {
    const fn free() -> Self {
        Self {
            used: false,
            data_block: None,
            next: None,
        }
    }
}

pub struct Fat {
    entries: Box<[FatEntry; NDATA]>,
}

impl Fat {
    pub fn new_empty() -> Self {
        Self {
            entries: Box::new(array![_ => FatEntry::free(); NDATA]),
        }
    }

    pub fn from_raw(raw: &[RawFatEntry; NDATA]) -> Self {
        let mut entries = Box::new(array![_ => FatEntry::free(); NDATA]);
        for (dst, src) in entries.iter_mut().zip(raw.iter()) {
            *dst = src.to_entry();
        }
        Self { entries }
    }

    /// Decodes the FAT from its flat on-disk byte image, one [`RawFatEntry`]
    /// per slot in ascending order.
    pub fn from_raw_bytes(bytes: &[u8]) -> Self {
        let entry_size = core::mem::size_of::<RawFatEntry>();
        let mut entries = Box::new(array![_ => FatEntry::free(); NDATA]);
        for (i, dst) in entries.iter_mut().enumerate() {
            let chunk = &bytes[i * entry_size..(i + 1) * entry_size];
            let raw = RawFatEntry::read_from(chunk).expect("FAT slot is entry-sized");
            *dst = raw.to_entry();
        }
        Self { entries }
    }

    /// Encodes the FAT as a flat byte image, one [`RawFatEntry`] per slot in
    /// ascending order.
    pub fn to_raw_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NDATA * core::mem::size_of::<RawFatEntry>());
        for entry in self.entries.iter() {
            bytes.extend_from_slice(RawFatEntry::from_entry(entry).as_bytes());
        }
        bytes
    }

    pub fn to_raw(&self) -> Box<[RawFatEntry; NDATA]> {
        let mut raw = Box::new(array![_ => RawFatEntry::FREE; NDATA]);
        for (dst, src) in raw.iter_mut().zip(self.entries.iter()) {
            *dst = RawFatEntry::from_entry(src);
        }
        raw
    }

    fn entry(&self, idx: u32) -> &FatEntry {
        &self.entries[idx as usize]
    }

    fn entry_mut(&mut self, idx: u32) -> &mut FatEntry {
        &mut self.entries[idx as usize]
    }

    pub fn is_used(&self, idx: u32) -> bool {
        self.entry(idx).used
    }

    pub fn data_block(&self, idx: u32) -> Option<u32> {
        self.entry(idx).data_block
    }

    pub fn next(&self, idx: u32) -> Option<u32> {
        self.entry(idx).next
    }

    /// Links entry `idx` to `next`. `next` must be `None` or index an
    /// already-used slot; the caller is responsible for never introducing a
    /// cycle.
    pub fn set_next(&mut self, idx: u32, next: Option<u32>) {
        if let Some(n) = next {
            debug_assert!(self.is_used(n), "set_next: target slot is not in use");
        }
        self.entry_mut(idx).next = next;
    }

    /// Claims the first unused slot and initializes it to an empty,
    /// terminal entry with no bound data block.
    pub fn create_entry(&mut self) -> Result<u32> {
        let idx = self
            .entries
            .iter()
            .position(|e| !e.used)
            .ok_or(SfsError::OutOfSpace)? as u32;
        *self.entry_mut(idx) = FatEntry {
            used: true,
            data_block: None,
            next: None,
        };
        Ok(idx)
    }

    /// Walks `next` pointers from `root` to the last entry in the chain.
    pub fn tail(&self, root: u32) -> u32 {
        let mut cur = root;
        while let Some(next) = self.next(cur) {
            cur = next;
        }
        cur
    }

    /// Binds a free data block to entry `idx`. A no-op if the entry is
    /// already bound.
    pub fn bind_data_block(&mut self, idx: u32, free_list: &mut FreeBlockList) -> Result<()> {
        if self.entry(idx).data_block.is_some() {
            return Ok(());
        }
        let slot = free_list.acquire_free_index()?;
        self.entry_mut(idx).data_block = Some(slot as u32 + DATA_START as u32);
        Ok(())
    }

    /// Discards an entry that was just claimed by `create_entry` but never
    /// attached to a chain (its `next` target never linked to it) and never
    /// bound to a data block. Used to roll back an extension whose data-block
    /// allocation failed: the entry must vanish rather than linger attached
    /// with no data, per the "tail never attached on failure" rule.
    pub fn discard_unattached(&mut self, idx: u32) {
        debug_assert!(self.entry(idx).data_block.is_none());
        *self.entry_mut(idx) = FatEntry::free();
    }

    /// Frees every entry in the chain rooted at `root`, releasing any bound
    /// data blocks back to `free_list`. Tolerates a chain of a single entry.
    pub fn free_chain(&mut self, root: u32, free_list: &mut FreeBlockList) {
        let mut cur = Some(root);
        while let Some(idx) = cur {
            let entry = *self.entry(idx);
            if let Some(block) = entry.data_block {
                free_list.release_index(block as usize - DATA_START);
            }
            cur = entry.next;
            *self.entry_mut(idx) = FatEntry::free();
        }
    }
}
