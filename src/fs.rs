//! The public API façade and the mount/format driver that wires every cache
//! to the block device underneath it.

use std::path::Path;

use log::{debug, info};

use crate::block_device::{BlockDevice, FileBlockDevice};
use crate::directory::Directory;
use crate::engine;
use crate::error::Result;
use crate::fat::Fat;
use crate::free_block_list::FreeBlockList;
use crate::open_file::OpenFileTable;
use crate::param::{
    BLOCK_SIZE, DATA_START, DIRECTORY_START, FAT_START, FREE_LIST_BLOCKS, FREE_LIST_START,
    TOTAL_BLOCKS,
};
use crate::superblock::Superblock;

/// A directory entry as returned by [`Sfs::ls`].
pub struct DirListing {
    pub name: Vec<u8>,
    pub size: i64,
}

/// A mounted (or freshly formatted) volume. Owns the block device and every
/// process-wide cache; there is no hidden global state, so two `Sfs`
/// instances over two different paths never interfere with each other.
pub struct Sfs {
    device: Box<dyn BlockDevice>,
    superblock: Superblock,
    directory: Directory,
    fat: Fat,
    free_list: FreeBlockList,
    open_files: OpenFileTable,
}

impl Sfs {
    /// `fresh = true` formats a brand-new volume at `path`, discarding
    /// whatever was there. `fresh = false` mounts an existing one, loading
    /// every cache from its on-disk image.
    pub fn mksfs(path: impl AsRef<Path>, fresh: bool) -> Result<Self> {
        if fresh {
            Self::format(path)
        } else {
            Self::mount(path)
        }
    }

    fn format(path: impl AsRef<Path>) -> Result<Self> {
        info!("formatting new volume at {:?}", path.as_ref());
        let device = FileBlockDevice::init_fresh(path, BLOCK_SIZE, TOTAL_BLOCKS)?;
        let mut fs = Self {
            device: Box::new(device),
            superblock: Superblock::new_formatted(),
            directory: Directory::new_empty(),
            fat: Fat::new_empty(),
            free_list: FreeBlockList::new_empty(),
            open_files: OpenFileTable::new_empty(),
        };
        fs.flush()?;
        Ok(fs)
    }

    fn mount(path: impl AsRef<Path>) -> Result<Self> {
        info!("mounting existing volume at {:?}", path.as_ref());
        let mut device = FileBlockDevice::init_existing(path, BLOCK_SIZE)?;
        let mut image = vec![0u8; DATA_START * BLOCK_SIZE];
        device.read_blocks(0, DATA_START, &mut image)?;

        let superblock = Superblock::from_raw_bytes(&image[..BLOCK_SIZE]);
        let directory =
            Directory::from_raw_bytes(&image[DIRECTORY_START * BLOCK_SIZE..FAT_START * BLOCK_SIZE]);
        let fat = Fat::from_raw_bytes(&image[FAT_START * BLOCK_SIZE..FREE_LIST_START * BLOCK_SIZE]);
        let free_list = FreeBlockList::from_raw(
            &image[FREE_LIST_START * BLOCK_SIZE..DATA_START * BLOCK_SIZE],
        );

        Ok(Self {
            device: Box::new(device),
            superblock,
            directory,
            fat,
            free_list,
            open_files: OpenFileTable::new_empty(),
        })
    }

    /// Eager write-back of every metadata region, in the order: super-block,
    /// directory, FAT, free-block list. Called after every mutating API
    /// call; `read`, `seek`, and `close` never call it.
    fn flush(&mut self) -> Result<()> {
        self.superblock
            .set_num_free_blocks(self.free_list.num_free() as u32);

        self.device
            .write_blocks(0, 1, &pad_to_blocks(self.superblock.to_raw_bytes(), 1))?;
        self.device.write_blocks(
            DIRECTORY_START,
            FAT_START - DIRECTORY_START,
            &pad_to_blocks(self.directory.to_raw_bytes(), FAT_START - DIRECTORY_START),
        )?;
        self.device.write_blocks(
            FAT_START,
            FREE_LIST_START - FAT_START,
            &pad_to_blocks(self.fat.to_raw_bytes(), FREE_LIST_START - FAT_START),
        )?;
        self.device.write_blocks(
            FREE_LIST_START,
            FREE_LIST_BLOCKS,
            &pad_to_blocks(self.free_list.raw_bytes().to_vec(), FREE_LIST_BLOCKS),
        )?;
        debug!("flushed metadata, {} free blocks", self.superblock.num_free_blocks());
        Ok(())
    }

    /// Number of free data blocks, as of the last flush.
    pub fn num_free_blocks(&self) -> u32 {
        self.superblock.num_free_blocks()
    }

    /// Enumerates every directory entry, in ascending slot order.
    pub fn ls(&self) -> Vec<DirListing> {
        self.directory
            .iter_used()
            .map(|idx| DirListing {
                name: self.directory.name(idx).to_vec(),
                size: self.directory.size(idx),
            })
            .collect()
    }

    /// Opens `name`, creating it if it does not already exist. Returns the
    /// existing descriptor if `name` is already open.
    pub fn open(&mut self, name: &[u8]) -> Result<usize> {
        if let Some(fd) = self.open_files.find_by_name(name) {
            return Ok(fd);
        }

        let (dir_idx, created) = match self.directory.find(name) {
            Ok(idx) => (idx, false),
            Err(_) => (self.directory.create(name, &mut self.fat)?, true),
        };

        let size = self.directory.size(dir_idx);
        let fat_root = self.directory.fat_root(dir_idx);
        let fd = match self
            .open_files
            .create(dir_idx, name, fat_root, size, &self.fat)
        {
            Ok(fd) => fd,
            Err(e) => {
                // A freshly created directory entry must not outlive a
                // failed open: undo it so the failure leaves no dangling
                // directory or FAT entry behind.
                if created {
                    self.fat.free_chain(fat_root, &mut self.free_list);
                    self.directory.remove(dir_idx);
                }
                return Err(e);
            }
        };

        if created {
            self.flush()?;
        }
        Ok(fd)
    }

    /// Releases an open-file descriptor. A bad `fd` is silently ignored.
    pub fn close(&mut self, fd: usize) {
        let _ = self.open_files.destroy(fd);
    }

    /// Writes `buf` at `fd`'s write cursor. A mid-call allocation failure is
    /// not an error: the write is truncated and `Ok` reports the bytes
    /// actually persisted.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let dir_idx = self.open_files.get(fd)?.dir_idx;
        let written = {
            let file = self.open_files.get_mut(fd)?;
            engine::write(
                self.device.as_mut(),
                &mut self.fat,
                &mut self.free_list,
                file,
                buf,
            )?
        };
        self.directory.add_size(dir_idx, written as i64);
        self.flush()?;
        Ok(written)
    }

    /// Reads `buf.len()` bytes at `fd`'s read cursor. Fails with
    /// [`crate::error::SfsError::UnknownPosition`] on a read past the end of
    /// the file's chain.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<()> {
        let file = self.open_files.get_mut(fd)?;
        engine::read(self.device.as_mut(), &self.fat, file, buf)
    }

    /// Repositions both of `fd`'s cursors to absolute byte offset `loc`.
    pub fn seek(&mut self, fd: usize, loc: i64) -> Result<()> {
        let file = self.open_files.get_mut(fd)?;
        engine::seek(&self.fat, file, loc);
        Ok(())
    }

    /// Closes any open descriptor on `name`, frees its chain, clears its
    /// directory entry, and flushes.
    pub fn remove(&mut self, name: &[u8]) -> Result<()> {
        let dir_idx = self.directory.find(name)?;
        if let Some(fd) = self.open_files.find_by_dir_idx(dir_idx) {
            let _ = self.open_files.destroy(fd);
        }
        let fat_root = self.directory.fat_root(dir_idx);
        self.fat.free_chain(fat_root, &mut self.free_list);
        self.directory.remove(dir_idx);
        self.flush()
    }
}

fn pad_to_blocks(mut bytes: Vec<u8>, blocks: usize) -> Vec<u8> {
    bytes.resize(blocks * BLOCK_SIZE, 0);
    bytes
}
