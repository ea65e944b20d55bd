//! The read/write engine: splices byte-granular user requests into the
//! block-aligned I/O the device understands, extending a file's FAT chain
//! on demand as a write outgrows it.

use crate::block_device::BlockDevice;
use crate::error::{Result, SfsError};
use crate::fat::Fat;
use crate::free_block_list::FreeBlockList;
use crate::open_file::OpenFile;
use crate::param::BLOCK_SIZE;

/// Writes `buf` at the file's current write cursor, extending its chain and
/// allocating data blocks as needed. Returns the number of bytes actually
/// persisted: allocation exhaustion truncates the write rather than failing
/// it, per the on-disk contract — the caller still gets `Ok`.
pub fn write(
    device: &mut dyn BlockDevice,
    fat: &mut Fat,
    free_list: &mut FreeBlockList,
    file: &mut OpenFile,
    buf: &[u8],
) -> Result<usize> {
    let mut scratch = [0u8; BLOCK_SIZE];
    let mut written = 0usize;
    let mut remaining = buf.len();

    if file.write_cur.byte_off > 0 && file.write_cur.byte_off < BLOCK_SIZE {
        // A cursor can sit mid-block with its entry still unbound (a seek
        // onto an entry that was never written to). Bind it before splicing
        // rather than skipping the step: falling through to the main loop
        // would rebind this same entry and write at the wrong offset.
        let existing = fat.data_block(file.write_cur.fat_idx).is_some();
        if existing || fat.bind_data_block(file.write_cur.fat_idx, free_list).is_ok() {
            let block = fat
                .data_block(file.write_cur.fat_idx)
                .expect("bound immediately above");
            if existing {
                device.read_blocks(block as usize, 1, &mut scratch)?;
            }
            let n = remaining.min(BLOCK_SIZE - file.write_cur.byte_off);
            scratch[file.write_cur.byte_off..file.write_cur.byte_off + n]
                .copy_from_slice(&buf[written..written + n]);
            device.write_blocks(block as usize, 1, &scratch)?;
            file.write_cur.byte_off += n;
            written += n;
            remaining -= n;
        }
    }

    while remaining > 0 {
        if file.write_cur.byte_off == BLOCK_SIZE {
            file.write_cur.byte_off = 0;
            match fat.next(file.write_cur.fat_idx) {
                Some(next) => file.write_cur.fat_idx = next,
                None => match fat.create_entry() {
                    Ok(new_idx) => {
                        // Bind before attaching: a bind failure must discard
                        // the new entry outright rather than leave it linked
                        // into the chain with no data block (see
                        // `Fat::discard_unattached`). The linked prefix stays
                        // live and usable either way.
                        if fat.bind_data_block(new_idx, free_list).is_err() {
                            fat.discard_unattached(new_idx);
                            break;
                        }
                        fat.set_next(file.write_cur.fat_idx, Some(new_idx));
                        file.write_cur.fat_idx = new_idx;
                    }
                    Err(_) => break,
                },
            }
        }

        if fat.data_block(file.write_cur.fat_idx).is_none()
            && fat.bind_data_block(file.write_cur.fat_idx, free_list).is_err()
        {
            break;
        }

        let block = fat
            .data_block(file.write_cur.fat_idx)
            .expect("bound immediately above");
        let n = remaining.min(BLOCK_SIZE - file.write_cur.byte_off);

        if n == BLOCK_SIZE {
            device.write_blocks(block as usize, 1, &buf[written..written + n])?;
        } else {
            // The block is being created, not patched: zero the tail rather
            // than reuse whatever `scratch` held from an earlier block in
            // this same call (the head splice above, most recently).
            scratch[n..].fill(0);
            scratch[..n].copy_from_slice(&buf[written..written + n]);
            device.write_blocks(block as usize, 1, &scratch)?;
        }

        file.write_cur.byte_off += n;
        written += n;
        remaining -= n;
    }

    Ok(written)
}

/// Reads `buf.len()` bytes from the file's current read cursor. Never
/// allocates, never mutates any cache, and never extends a file: a cursor
/// that walks past the chain's terminal entry fails the whole call.
pub fn read(device: &mut dyn BlockDevice, fat: &Fat, file: &mut OpenFile, buf: &mut [u8]) -> Result<()> {
    let mut scratch = [0u8; BLOCK_SIZE];
    let mut filled = 0usize;
    let mut remaining = buf.len();

    while remaining > 0 {
        if file.read_cur.byte_off == BLOCK_SIZE {
            file.read_cur.byte_off = 0;
            match fat.next(file.read_cur.fat_idx) {
                Some(next) => file.read_cur.fat_idx = next,
                None => return Err(SfsError::UnknownPosition),
            }
        }

        if !fat.is_used(file.read_cur.fat_idx) {
            return Err(SfsError::UnknownPosition);
        }
        let block = fat
            .data_block(file.read_cur.fat_idx)
            .ok_or(SfsError::UnknownPosition)?;

        let n = remaining.min(BLOCK_SIZE - file.read_cur.byte_off);
        device.read_blocks(block as usize, 1, &mut scratch)?;
        buf[filled..filled + n]
            .copy_from_slice(&scratch[file.read_cur.byte_off..file.read_cur.byte_off + n]);

        file.read_cur.byte_off += n;
        filled += n;
        remaining -= n;
    }

    Ok(())
}

/// Repositions both cursors to absolute byte offset `loc`, walking at most
/// `loc / BLOCK_SIZE` links from the file's FAT root. A seek past the last
/// existing entry stops at that entry instead of failing; the requested
/// byte offset is kept verbatim, so a subsequent read from a too-far seek
/// fails exactly as the read algorithm dictates.
pub fn seek(fat: &Fat, file: &mut OpenFile, loc: i64) {
    let blocks = (loc / BLOCK_SIZE as i64).max(0) as usize;
    let byte_off = (loc.rem_euclid(BLOCK_SIZE as i64)) as usize;

    let mut idx = file.fat_root;
    for _ in 0..blocks {
        match fat.next(idx) {
            Some(next) => idx = next,
            None => break,
        }
    }

    let cursor = crate::open_file::Cursor { fat_idx: idx, byte_off };
    file.read_cur = cursor;
    file.write_cur = cursor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_device::FileBlockDevice;
    use crate::open_file::OpenFileTable;

    fn fresh_device() -> (tempfile::TempDir, FileBlockDevice) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.img");
        let dev = FileBlockDevice::init_fresh(&path, BLOCK_SIZE, 64).unwrap();
        (dir, dev)
    }

    #[test]
    fn write_then_read_round_trips_within_one_block() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();

        let payload = b"hello, sfs";
        let n = write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), payload).unwrap();
        assert_eq!(n, payload.len());

        seek(&fat, table.get_mut(fd).unwrap(), 0);
        let mut out = vec![0u8; payload.len()];
        read(&mut dev, &fat, table.get_mut(fd).unwrap(), &mut out).unwrap();
        assert_eq!(&out, payload);
    }

    #[test]
    fn write_spanning_multiple_blocks_extends_chain() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();

        let payload = vec![7u8; BLOCK_SIZE * 2 + 13];
        let n = write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), &payload).unwrap();
        assert_eq!(n, payload.len());
        assert_ne!(fat.next(root), None);

        seek(&fat, table.get_mut(fd).unwrap(), 0);
        let mut out = vec![0u8; payload.len()];
        read(&mut dev, &fat, table.get_mut(fd).unwrap(), &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn read_past_end_of_chain_fails() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();
        write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), b"abc").unwrap();

        seek(&fat, table.get_mut(fd).unwrap(), 0);
        let mut out = vec![0u8; BLOCK_SIZE + 1];
        let err = read(&mut dev, &fat, table.get_mut(fd).unwrap(), &mut out).unwrap_err();
        assert_eq!(err, SfsError::UnknownPosition);
    }

    #[test]
    fn seek_then_overwrite_middle() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();

        for _ in 0..10 {
            write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), b"0123456789").unwrap();
        }

        seek(&fat, table.get_mut(fd).unwrap(), 80);
        write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), b"9876543210").unwrap();

        seek(&fat, table.get_mut(fd).unwrap(), 85);
        let mut out = [0u8; 10];
        read(&mut dev, &fat, table.get_mut(fd).unwrap(), &mut out).unwrap();
        assert_eq!(&out, b"4321001234");
    }

    #[test]
    fn write_after_seek_into_unbound_block_lands_at_offset() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();

        // The root entry has no bound data block yet: `seek` onto a
        // mid-block offset leaves the cursor there regardless.
        seek(&fat, table.get_mut(fd).unwrap(), 5);
        let n = write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), b"XYZ").unwrap();
        assert_eq!(n, 3);

        seek(&fat, table.get_mut(fd).unwrap(), 0);
        let mut out = [0u8; 8];
        read(&mut dev, &fat, table.get_mut(fd).unwrap(), &mut out).unwrap();
        assert_eq!(&out, b"\0\0\0\0\0XYZ");
    }

    #[test]
    fn exhausted_chain_extension_leaves_no_dangling_tail() {
        let (_guard, mut dev) = fresh_device();
        let mut fat = Fat::new_empty();
        let mut free_list = FreeBlockList::new_empty();
        let mut table = OpenFileTable::new_empty();
        let root = fat.create_entry().unwrap();
        let fd = table.create(0, b"f", root, 0, &fat).unwrap();

        // Drain the free list down to exactly one block so the first write
        // succeeds and the second stalls mid-chain-extension.
        while free_list.num_free() > 1 {
            free_list.acquire_free_index().unwrap();
        }

        let payload = vec![9u8; BLOCK_SIZE * 2];
        let n = write(&mut dev, &mut fat, &mut free_list, table.get_mut(fd).unwrap(), &payload).unwrap();
        assert_eq!(n, BLOCK_SIZE);
        assert_eq!(free_list.num_free(), 0);

        // The one entry that exists is fully bound; no attached-but-unbound
        // orphan entry should have been left behind in the FAT.
        assert!(fat.data_block(root).is_some());
        assert_eq!(fat.next(root), None);
    }
}
