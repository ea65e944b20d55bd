//! Compile-time layout parameters.
//!
//! These constants fix the on-disk geometry of a volume. Changing any of
//! them changes the on-disk format: existing images formatted under one set
//! of parameters cannot be mounted under another.

use crate::directory::RawDirEntry;
use crate::fat::RawFatEntry;

/// Size in bytes of a single disk block. All device I/O is block-granular.
pub const BLOCK_SIZE: usize = 512;

/// Number of blocks reserved for the directory table, starting right after
/// the super-block.
pub const DIRECTORY_BLOCKS: usize = 100;

/// Number of blocks occupied by the free-block bitmap. One bit is spent per
/// data block, so this also pins `TOTAL_DATA_BLOCKS` below.
pub const FREE_LIST_BLOCKS: usize = 1;

/// Total number of data blocks the volume can address. The free-block
/// bitmap stores exactly one bit per data block, so this is derived from
/// `FREE_LIST_BLOCKS` and `BLOCK_SIZE`.
pub const TOTAL_DATA_BLOCKS: usize = BLOCK_SIZE * 8 * FREE_LIST_BLOCKS;

/// Maximum length, in bytes, of a stored file name.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum number of simultaneously open files.
pub const MAX_OPEN: usize = 1000;

/// Number of FAT entries. The FAT has exactly one entry per data block so
/// that a chain of entries can claim every block in the volume.
pub const NDATA: usize = TOTAL_DATA_BLOCKS;

const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// On-disk size of a single FAT entry.
pub const FAT_ENTRY_SIZE: usize = core::mem::size_of::<RawFatEntry>();

/// Number of blocks occupied by the FAT.
pub const FAT_BLOCKS: usize = ceil_div(FAT_ENTRY_SIZE * NDATA, BLOCK_SIZE);

/// On-disk size of a single directory entry.
pub const DIR_ENTRY_SIZE: usize = core::mem::size_of::<RawDirEntry>();

/// Maximum number of directory entries the directory region can hold.
pub const MAX_DIR_ENTRIES: usize = (DIRECTORY_BLOCKS * BLOCK_SIZE) / DIR_ENTRY_SIZE;

/// Block index of the super-block. Always block 0.
pub const SUPERBLOCK_START: usize = 0;

/// First block of the directory table.
pub const DIRECTORY_START: usize = SUPERBLOCK_START + 1;

/// First block of the FAT.
pub const FAT_START: usize = DIRECTORY_START + DIRECTORY_BLOCKS;

/// First block of the free-block bitmap.
pub const FREE_LIST_START: usize = FAT_START + FAT_BLOCKS;

/// First block of the data region.
pub const DATA_START: usize = FREE_LIST_START + FREE_LIST_BLOCKS;

/// Total number of blocks a freshly formatted volume occupies.
pub const TOTAL_BLOCKS: usize = DATA_START + TOTAL_DATA_BLOCKS;

static_assertions::const_assert!(MAX_DIR_ENTRIES > 0);
static_assertions::const_assert!(FAT_BLOCKS > 0);
static_assertions::const_assert!(NDATA <= u32::MAX as usize);

// `RawDirEntry`/`RawFatEntry` list every field, including padding, so their
// `size_of` should equal the sum of their parts exactly — a mismatch means a
// field was added without an accompanying `_pad`.
static_assertions::const_assert_eq!(FAT_ENTRY_SIZE, 1 + 3 + 4 + 4);
static_assertions::const_assert_eq!(DIR_ENTRY_SIZE, 8 + MAX_NAME_LEN + 1 + 1 + 2 + 4);
