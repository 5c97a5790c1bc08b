//! `format` / `mount` / `unmount` / `stat` — spec.md §4.10.

use vdisk::BlockDevice;

use crate::block::{self, Superblock};
use crate::bitmap::Bitmap;
use crate::{layout, Error, FileSystem, Mount, Stat, INODES_PER_BLOCK, ROOT_INODE};

impl<D: BlockDevice> FileSystem<D> {
    /// Lays out a fresh file system across the whole device: computes the
    /// region map, zeros and pre-marks both bitmaps, and writes the
    /// superblock plus the inode-table block holding the root directory.
    /// Succeeds whether or not the device was previously mounted here.
    pub fn format(&mut self) -> Result<(), Error> {
        let total_blocks = self.device.size();
        let superblock = layout::plan(total_blocks)?;

        let mut block_bitmap = Bitmap::zeroed(superblock.block_bitmap, superblock.blocks_count);
        let mut inode_bitmap = Bitmap::zeroed(superblock.inode_bitmap, superblock.inodes_count);

        // Metadata blocks (superblock, both bitmaps, the whole inode table)
        // are permanently allocated — I2.
        for b in 0..superblock.data_blocks_start {
            block_bitmap.mark(b);
        }
        // Inode 0 is a reserved sentinel, inode 1 is the root directory — I3.
        inode_bitmap.mark(0);
        inode_bitmap.mark(ROOT_INODE);

        block_bitmap.flush(&mut self.device)?;
        inode_bitmap.flush(&mut self.device)?;

        self.device.write_block(0, &superblock.encode())?;

        let table_block = superblock.inode_table_start + ROOT_INODE / INODES_PER_BLOCK as u32;
        let slot = (ROOT_INODE % INODES_PER_BLOCK as u32) as usize;
        let mut buf = block::zero_block();
        block::write_inode_slot(&mut buf, slot, &block::Inode::new(true));
        self.device.write_block(table_block, &buf)?;

        log::info!(
            "format: {} blocks, {} inodes, data starts at block {}",
            superblock.blocks_count, superblock.inodes_count, superblock.data_blocks_start
        );
        Ok(())
    }

    /// Reads the superblock and both bitmaps into memory and marks the
    /// file system mounted. Fails with [`Error::NotFormatted`] if the
    /// superblock does not look like layout::plan ever produced it.
    pub fn mount(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; vdisk::BLOCK_SIZE];
        self.device.read_block(0, &mut buf)?;
        let superblock = Superblock::decode(&buf);
        if !superblock.looks_valid() {
            return Err(Error::NotFormatted);
        }

        let block_bitmap = Bitmap::load(&mut self.device, superblock.block_bitmap, superblock.blocks_count)?;
        let inode_bitmap = Bitmap::load(&mut self.device, superblock.inode_bitmap, superblock.inodes_count)?;

        log::debug!(
            "mount: {} blocks, {} inodes, data starts at block {}",
            superblock.blocks_count, superblock.inodes_count, superblock.data_blocks_start
        );
        self.mount = Some(Mount {
            superblock,
            block_bitmap,
            inode_bitmap,
        });
        Ok(())
    }

    /// Flushes dirty bitmaps and clears the mounted state. A no-op (with a
    /// warning) if the file system was not mounted.
    pub fn unmount(&mut self) -> Result<(), Error> {
        match self.mount.take() {
            None => {
                log::warn!("unmount: file system was not mounted");
                Ok(())
            }
            Some(mut mount) => {
                mount.block_bitmap.flush(&mut self.device)?;
                mount.inode_bitmap.flush(&mut self.device)?;
                Ok(())
            }
        }
    }

    /// The four key superblock fields, or `None` if not mounted.
    pub fn stat(&self) -> Option<Stat> {
        self.mount.as_ref().map(|mount| Stat {
            blocks_count: mount.superblock.blocks_count,
            inodes_count: mount.superblock.inodes_count,
            inode_table_start: mount.superblock.inode_table_start,
            data_blocks_start: mount.superblock.data_blocks_start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdisk::FileBlockDevice;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("blockfs-mount-test-{name}-{:?}", std::thread::current().id()));
        p
    }

    #[test]
    fn format_then_mount_reports_expected_stat() {
        for (n, expected_data_start) in [(16u32, 4u32), (100, 5), (1000, 19)] {
            let path = temp_path(&format!("fmt-{n}"));
            let device = FileBlockDevice::init(&path, n).unwrap();
            let mut fs = FileSystem::new(device);
            fs.format().unwrap();
            fs.mount().unwrap();
            let stat = fs.stat().unwrap();
            assert_eq!(stat.blocks_count, n);
            assert_eq!(stat.inodes_count, n);
            assert_eq!(stat.inode_table_start, 3);
            assert_eq!(stat.data_blocks_start, expected_data_start);
            fs.unmount().unwrap();
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn mount_without_format_fails() {
        let path = temp_path("unformatted");
        let device = FileBlockDevice::init(&path, 16).unwrap();
        let mut fs = FileSystem::new(device);
        assert!(matches!(fs.mount(), Err(Error::NotFormatted)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unmount_without_mount_warns_but_succeeds() {
        let path = temp_path("unmount-noop");
        let device = FileBlockDevice::init(&path, 16).unwrap();
        let mut fs = FileSystem::new(device);
        assert!(fs.unmount().is_ok());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ops_require_mount() {
        let path = temp_path("not-mounted");
        let device = FileBlockDevice::init(&path, 16).unwrap();
        let mut fs = FileSystem::new(device);
        fs.format().unwrap();
        assert!(matches!(fs.create("/a", false), Err(Error::NotMounted)));
        let _ = std::fs::remove_file(&path);
    }
}
