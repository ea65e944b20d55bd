//! A single-volume, flat-namespace file store over a fixed-size block
//! device, with chained-allocation storage and no concurrency contract.

mod bitfield;
mod block_device;
mod directory;
mod engine;
mod error;
mod fat;
mod free_block_list;
mod fs;
mod open_file;
mod param;
mod superblock;

pub use block_device::{BlockDevice, FileBlockDevice};
pub use error::{Result, SfsError};
pub use fs::{DirListing, Sfs};
pub use param::{BLOCK_SIZE, MAX_NAME_LEN, MAX_OPEN, TOTAL_DATA_BLOCKS};
