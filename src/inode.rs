//! The inode & addressing engine: read/write an inode by index, and
//! translate a file-logical block index into a physical data-block
//! pointer through 11 direct pointers and one single-indirect block.

use vdisk::BlockDevice;

use crate::block::{self, Inode};
use crate::{Error, FileSystem, DIRECT_POINTERS, INDIRECT_PTRS_PER_BLOCK, INODES_PER_BLOCK, MAX_FILE_BYTES};

enum Slot {
    Direct(usize),
    Indirect(usize),
}

fn logical_slot(logical: usize) -> Result<Slot, Error> {
    if logical < DIRECT_POINTERS {
        Ok(Slot::Direct(logical))
    } else if logical < DIRECT_POINTERS + INDIRECT_PTRS_PER_BLOCK {
        Ok(Slot::Indirect(logical - DIRECT_POINTERS))
    } else {
        Err(Error::FileTooLarge { max: MAX_FILE_BYTES })
    }
}

impl<D: BlockDevice> FileSystem<D> {
    fn inode_location(&self, idx: u32) -> Result<(u32, usize), Error> {
        let sb = self.superblock()?;
        let block_num = sb.inode_table_start + idx / INODES_PER_BLOCK as u32;
        let slot = (idx % INODES_PER_BLOCK as u32) as usize;
        Ok((block_num, slot))
    }

    pub(crate) fn read_inode(&mut self, idx: u32) -> Result<Inode, Error> {
        let (block_num, slot) = self.inode_location(idx)?;
        let mut buf = [0u8; vdisk::BLOCK_SIZE];
        self.device.read_block(block_num, &mut buf)?;
        Ok(block::read_inode_slot(&buf, slot))
    }

    pub(crate) fn write_inode(&mut self, idx: u32, inode: &Inode) -> Result<(), Error> {
        let (block_num, slot) = self.inode_location(idx)?;
        let mut buf = [0u8; vdisk::BLOCK_SIZE];
        self.device.read_block(block_num, &mut buf)?;
        block::write_inode_slot(&mut buf, slot, inode);
        self.device.write_block(block_num, &buf)?;
        Ok(())
    }

    /// Allocates a fresh inode (lowest free index), marks it in the inode
    /// bitmap, and persists a zeroed inode of the given kind.
    pub(crate) fn alloc_inode(&mut self, is_directory: bool) -> Result<u32, Error> {
        let idx = {
            let (_, mount) = self.parts()?;
            mount.inode_bitmap.find_first_free("inode")?
        };
        {
            let (device, mount) = self.parts()?;
            mount.inode_bitmap.mark(idx);
            mount.inode_bitmap.flush(device)?;
        }
        self.write_inode(idx, &Inode::new(is_directory))?;
        log::trace!("alloc_inode: {idx} (directory={is_directory})");
        Ok(idx)
    }

    pub(crate) fn free_inode(&mut self, idx: u32) -> Result<(), Error> {
        let (device, mount) = self.parts()?;
        mount.inode_bitmap.clear(idx);
        mount.inode_bitmap.flush(device)?;
        log::trace!("free_inode: {idx}");
        Ok(())
    }

    /// Allocates the lowest free data block, zeroing it before handing it
    /// back — writes never see stale bytes from a block's previous life.
    pub(crate) fn alloc_data_block(&mut self) -> Result<u32, Error> {
        let idx = {
            let (_, mount) = self.parts()?;
            mount.block_bitmap.find_first_free("data block")?
        };
        {
            let (device, mount) = self.parts()?;
            mount.block_bitmap.mark(idx);
            mount.block_bitmap.flush(device)?;
        }
        self.device.write_block(idx, &block::zero_block())?;
        Ok(idx)
    }

    pub(crate) fn free_data_block(&mut self, block_num: u32) -> Result<(), Error> {
        let (device, mount) = self.parts()?;
        mount.block_bitmap.clear(block_num);
        mount.block_bitmap.flush(device)?;
        Ok(())
    }

    /// Returns the physical block backing logical block `logical` of
    /// `inode`, or 0 if unassigned. Never allocates — callers only see a 0
    /// pointer below `size` if an invariant was already broken elsewhere,
    /// since this file system never leaves holes below `size`.
    pub(crate) fn block_for_read(&mut self, inode: &Inode, logical: usize) -> Result<u32, Error> {
        match logical_slot(logical)? {
            Slot::Direct(i) => Ok(inode.direct[i]),
            Slot::Indirect(i) => {
                if inode.single_indirect == 0 {
                    return Ok(0);
                }
                let mut buf = [0u8; vdisk::BLOCK_SIZE];
                self.device.read_block(inode.single_indirect, &mut buf)?;
                Ok(block::read_pointers(&buf)[i])
            }
        }
    }

    /// Returns the physical block backing logical block `logical` of
    /// `inode`, allocating it (and the indirect block itself, the first
    /// time a slot `>= DIRECT_POINTERS` is needed) if it does not exist
    /// yet. Mutates `inode.direct`/`inode.single_indirect` in place; the
    /// caller is responsible for persisting `inode` afterwards.
    pub(crate) fn ensure_block_for_write(
        &mut self,
        inode: &mut Inode,
        logical: usize,
    ) -> Result<u32, Error> {
        match logical_slot(logical)? {
            Slot::Direct(i) => {
                if inode.direct[i] == 0 {
                    inode.direct[i] = self.alloc_data_block()?;
                }
                Ok(inode.direct[i])
            }
            Slot::Indirect(i) => {
                if inode.single_indirect == 0 {
                    inode.single_indirect = self.alloc_data_block()?;
                }
                let indirect_block = inode.single_indirect;
                let mut buf = [0u8; vdisk::BLOCK_SIZE];
                self.device.read_block(indirect_block, &mut buf)?;
                let mut ptrs = block::read_pointers(&buf);
                if ptrs[i] == 0 {
                    ptrs[i] = self.alloc_data_block()?;
                    block::write_pointers(&mut buf, &ptrs);
                    self.device.write_block(indirect_block, &buf)?;
                }
                Ok(ptrs[i])
            }
        }
    }

    /// Frees every data block reachable from `inode` (direct pointers,
    /// then the indirect block's pointers, then the indirect block
    /// itself) and zeroes the pointers in `inode`. Caller persists `inode`.
    pub(crate) fn free_all_blocks(&mut self, inode: &mut Inode) -> Result<(), Error> {
        for ptr in inode.direct.iter_mut() {
            if *ptr != 0 {
                self.free_data_block(*ptr)?;
                *ptr = 0;
            }
        }
        if inode.single_indirect != 0 {
            let mut buf = [0u8; vdisk::BLOCK_SIZE];
            self.device.read_block(inode.single_indirect, &mut buf)?;
            for &p in block::read_pointers(&buf).iter() {
                if p != 0 {
                    self.free_data_block(p)?;
                }
            }
            self.free_data_block(inode.single_indirect)?;
            inode.single_indirect = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdisk::FileBlockDevice;

    fn mounted_fs(nblocks: u32, name: &str) -> (FileSystem<FileBlockDevice>, std::path::PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("blockfs-inode-test-{name}-{:?}", std::thread::current().id()));
        let device = FileBlockDevice::init(&path, nblocks).unwrap();
        let mut fs = FileSystem::new(device);
        fs.format().unwrap();
        fs.mount().unwrap();
        (fs, path)
    }

    #[test]
    fn addressing_spans_direct_and_indirect_ranges() {
        let (mut fs, path) = mounted_fs(1100, "addr");
        let mut inode = Inode::new(false);
        // one block in the direct range, one past it
        let a = fs.ensure_block_for_write(&mut inode, 0).unwrap();
        let b = fs.ensure_block_for_write(&mut inode, 11).unwrap();
        assert_ne!(a, b);
        assert_ne!(inode.single_indirect, 0);
        assert_eq!(fs.block_for_read(&inode, 0).unwrap(), a);
        assert_eq!(fs.block_for_read(&inode, 11).unwrap(), b);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn block_beyond_max_file_size_is_rejected() {
        let (mut fs, path) = mounted_fs(1100, "toolarge");
        let mut inode = Inode::new(false);
        assert!(matches!(
            fs.ensure_block_for_write(&mut inode, DIRECT_POINTERS + INDIRECT_PTRS_PER_BLOCK),
            Err(Error::FileTooLarge { .. })
        ));
        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn free_all_blocks_clears_direct_and_indirect() {
        let (mut fs, path) = mounted_fs(1100, "free");
        let mut inode = Inode::new(false);
        fs.ensure_block_for_write(&mut inode, 0).unwrap();
        fs.ensure_block_for_write(&mut inode, 20).unwrap();
        assert_ne!(inode.single_indirect, 0);

        fs.free_all_blocks(&mut inode).unwrap();
        assert_eq!(inode.direct, [0; DIRECT_POINTERS]);
        assert_eq!(inode.single_indirect, 0);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
