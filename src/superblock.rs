//! The super-block: a tiny fixed record describing the volume's geometry,
//! written to block 0.
//!
//! The first four fields are immutable once a volume is formatted; only
//! `num_free_blocks` changes, and it is refreshed from the
//! [`crate::free_block_list::FreeBlockList`] on every flush.

use zerocopy::{AsBytes, FromBytes};

use crate::param::{BLOCK_SIZE, DIRECTORY_BLOCKS, FAT_BLOCKS, TOTAL_DATA_BLOCKS};

/// Bit-exact on-disk image of the super-block.
#[repr(C)]
#[derive(Clone, Copy, AsBytes, FromBytes)]
pub struct RawSuperblock {
    pub block_size: u32,
    pub num_blocks_root: u32,
    pub num_blocks_fat: u32,
    pub num_data_blocks: u32,
    pub num_free_blocks: u32,
}

pub struct Superblock {
    raw: RawSuperblock,
}

impl Superblock {
    /// Builds the super-block for a freshly formatted volume: every data
    /// block counted as free.
    pub fn new_formatted() -> Self {
        Self {
            raw: RawSuperblock {
                block_size: BLOCK_SIZE as u32,
                num_blocks_root: DIRECTORY_BLOCKS as u32,
                num_blocks_fat: FAT_BLOCKS as u32,
                num_data_blocks: TOTAL_DATA_BLOCKS as u32,
                num_free_blocks: TOTAL_DATA_BLOCKS as u32,
            },
        }
    }

    /// Reconstructs a super-block from its on-disk image.
    pub fn from_raw(raw: RawSuperblock) -> Self {
        Self { raw }
    }

    /// Decodes a super-block from the leading bytes of block 0.
    pub fn from_raw_bytes(bytes: &[u8]) -> Self {
        let raw = RawSuperblock::read_from_prefix(bytes).expect("block 0 holds a super-block");
        Self { raw }
    }

    /// Encodes the super-block as its on-disk byte image.
    pub fn to_raw_bytes(&self) -> Vec<u8> {
        self.raw.as_bytes().to_vec()
    }

    pub fn num_free_blocks(&self) -> u32 {
        self.raw.num_free_blocks
    }

    /// Refreshes the cached free-block count ahead of a flush.
    pub fn set_num_free_blocks(&mut self, n: u32) {
        self.raw.num_free_blocks = n;
    }

    pub fn raw(&self) -> &RawSuperblock {
        &self.raw
    }
}
