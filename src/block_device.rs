//! The block device: the host-file-backed collaborator the core reads and
//! writes through. Out of scope for the storage engine's own invariants, but
//! needed for anything to actually persist.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// Block-granular, synchronous storage. Every offset and count below is in
/// units of `block_size`, not bytes.
pub trait BlockDevice {
    fn read_blocks(&mut self, start: usize, count: usize, buf: &mut [u8]) -> Result<()>;
    fn write_blocks(&mut self, start: usize, count: usize, buf: &[u8]) -> Result<()>;
}

/// A [`BlockDevice`] backed by a single regular file on the host filesystem.
pub struct FileBlockDevice {
    file: File,
    block_size: usize,
}

impl FileBlockDevice {
    /// Truncates (or creates) the file at `path` and writes `n_blocks`
    /// zeroed blocks of `block_size` bytes each.
    pub fn init_fresh(path: impl AsRef<Path>, block_size: usize, n_blocks: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let zero_block = vec![0u8; block_size];
        for _ in 0..n_blocks {
            file.write_all(&zero_block)?;
        }
        file.flush()?;
        Ok(Self { file, block_size })
    }

    /// Opens an existing file at `path` without modifying its contents.
    pub fn init_existing(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file, block_size })
    }

    fn seek_to_block(&mut self, block: usize) -> Result<()> {
        self.file
            .seek(SeekFrom::Start((block * self.block_size) as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_blocks(&mut self, start: usize, count: usize, buf: &mut [u8]) -> Result<()> {
        debug_assert!(buf.len() >= count * self.block_size);
        self.seek_to_block(start)?;
        self.file.read_exact(&mut buf[..count * self.block_size])?;
        Ok(())
    }

    fn write_blocks(&mut self, start: usize, count: usize, buf: &[u8]) -> Result<()> {
        debug_assert!(buf.len() >= count * self.block_size);
        self.seek_to_block(start)?;
        self.file.write_all(&buf[..count * self.block_size])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_device_reads_back_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        let mut dev = FileBlockDevice::init_fresh(&path, 512, 4).unwrap();
        let mut buf = vec![0xffu8; 512];
        dev.read_blocks(0, 1, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_reopen_existing_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        {
            let mut dev = FileBlockDevice::init_fresh(&path, 512, 4).unwrap();
            let payload = vec![0xabu8; 512];
            dev.write_blocks(2, 1, &payload).unwrap();
        }
        let mut dev = FileBlockDevice::init_existing(&path, 512).unwrap();
        let mut buf = vec![0u8; 512];
        dev.read_blocks(2, 1, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xab));
    }
}
