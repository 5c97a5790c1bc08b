//! Directory contents: a directory's data blocks hold a flat, unsorted
//! array of [`DirEntry`] slots. Entries are never reordered and a removed
//! entry's slot is simply zeroed — the directory never shrinks, matching
//! the reference's append-only `dirlink`/`unlink`.

use vdisk::BlockDevice;

use crate::block::{self, DirEntry, Inode};
use crate::{DirListEntry, Error, FileSystem, DIR_ENTRIES_PER_BLOCK};

impl<D: BlockDevice> FileSystem<D> {
    /// Looks up `name` among `dir_inode`'s entries, returning the child's
    /// inode number if found.
    pub(crate) fn dir_lookup(&mut self, dir_inode: &Inode, name: &str) -> Result<Option<u32>, Error> {
        let block_count = blocks_in_use(dir_inode);
        for logical in 0..block_count {
            let physical = self.block_for_read(dir_inode, logical)?;
            if physical == 0 {
                continue;
            }
            let mut buf = [0u8; vdisk::BLOCK_SIZE];
            self.device.read_block(physical, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let entry = block::read_dir_entry(&buf, slot);
                if !entry.is_free() && entry.name == name {
                    return Ok(Some(entry.inode_number));
                }
            }
        }
        Ok(None)
    }

    /// Inserts `{child_inode, name}` into `dir_inode`'s entries, reusing a
    /// free slot in an existing block before allocating a new one. Updates
    /// `dir_inode.size` to cover every block the directory now spans.
    pub(crate) fn dir_insert(&mut self, dir_inode: &mut Inode, name: &str, child_inode: u32) -> Result<(), Error> {
        let block_count = blocks_in_use(dir_inode);
        let entry = DirEntry {
            inode_number: child_inode,
            name: name.to_string(),
        };

        for logical in 0..block_count {
            let physical = self.block_for_read(dir_inode, logical)?;
            let mut buf = [0u8; vdisk::BLOCK_SIZE];
            self.device.read_block(physical, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                if block::read_dir_entry(&buf, slot).is_free() {
                    block::write_dir_entry(&mut buf, slot, &entry);
                    self.device.write_block(physical, &buf)?;
                    return Ok(());
                }
            }
        }

        // No free slot anywhere: grow the directory by one block.
        let logical = block_count;
        let physical = self.ensure_block_for_write(dir_inode, logical)?;
        let mut buf = [0u8; vdisk::BLOCK_SIZE];
        self.device.read_block(physical, &mut buf)?;
        block::write_dir_entry(&mut buf, 0, &entry);
        self.device.write_block(physical, &buf)?;

        dir_inode.size = ((logical + 1) * vdisk::BLOCK_SIZE) as u64;
        Ok(())
    }

    /// Zeroes the entry named `name`, freeing its slot for reuse. The
    /// directory's block count and recorded size are left unchanged —
    /// spec.md §9's resolved open question: directories never shrink.
    pub(crate) fn dir_remove_entry(&mut self, dir_inode: &Inode, name: &str) -> Result<bool, Error> {
        let block_count = blocks_in_use(dir_inode);
        for logical in 0..block_count {
            let physical = self.block_for_read(dir_inode, logical)?;
            if physical == 0 {
                continue;
            }
            let mut buf = [0u8; vdisk::BLOCK_SIZE];
            self.device.read_block(physical, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let entry = block::read_dir_entry(&buf, slot);
                if !entry.is_free() && entry.name == name {
                    block::write_dir_entry(&mut buf, slot, &DirEntry { inode_number: 0, name: String::new() });
                    self.device.write_block(physical, &buf)?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// All non-free entries in `dir_inode`, in on-disk order.
    pub(crate) fn dir_entries(&mut self, dir_inode: &Inode) -> Result<Vec<DirEntry>, Error> {
        let block_count = blocks_in_use(dir_inode);
        let mut out = Vec::new();
        for logical in 0..block_count {
            let physical = self.block_for_read(dir_inode, logical)?;
            if physical == 0 {
                continue;
            }
            let mut buf = [0u8; vdisk::BLOCK_SIZE];
            self.device.read_block(physical, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let entry = block::read_dir_entry(&buf, slot);
                if !entry.is_free() {
                    out.push(entry);
                }
            }
        }
        Ok(out)
    }

    /// `dir_entries` plus each child's size, for `fs_list`.
    pub(crate) fn dir_listing(&mut self, dir_inode: &Inode) -> Result<Vec<DirListEntry>, Error> {
        let entries = self.dir_entries(dir_inode)?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let child = self.read_inode(entry.inode_number)?;
            out.push(DirListEntry {
                name: entry.name,
                size: child.size,
            });
        }
        Ok(out)
    }
}

/// Number of logical blocks a directory's recorded size spans. A brand new
/// directory inode has `size == 0` and so owns zero blocks.
fn blocks_in_use(dir_inode: &Inode) -> usize {
    let size = dir_inode.size as usize;
    if size == 0 {
        0
    } else {
        (size + vdisk::BLOCK_SIZE - 1) / vdisk::BLOCK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdisk::FileBlockDevice;

    fn mounted_fs(name: &str) -> (FileSystem<FileBlockDevice>, std::path::PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("blockfs-dir-test-{name}-{:?}", std::thread::current().id()));
        let device = FileBlockDevice::init(&path, 200).unwrap();
        let mut fs = FileSystem::new(device);
        fs.format().unwrap();
        fs.mount().unwrap();
        (fs, path)
    }

    #[test]
    fn insert_lookup_and_remove() {
        let (mut fs, path) = mounted_fs("basic");
        let mut dir = Inode::new(true);
        let child = fs.alloc_inode(false).unwrap();
        fs.dir_insert(&mut dir, "hello.txt", child).unwrap();

        assert_eq!(fs.dir_lookup(&dir, "hello.txt").unwrap(), Some(child));
        assert_eq!(fs.dir_lookup(&dir, "missing").unwrap(), None);

        assert!(fs.dir_remove_entry(&dir, "hello.txt").unwrap());
        assert_eq!(fs.dir_lookup(&dir, "hello.txt").unwrap(), None);
        assert!(!fs.dir_remove_entry(&dir, "hello.txt").unwrap());

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn removed_slot_is_reused_before_growing() {
        let (mut fs, path) = mounted_fs("reuse");
        let mut dir = Inode::new(true);
        let a = fs.alloc_inode(false).unwrap();
        fs.dir_insert(&mut dir, "a", a).unwrap();
        fs.dir_remove_entry(&dir, "a").unwrap();

        let size_before = dir.size;
        let b = fs.alloc_inode(false).unwrap();
        fs.dir_insert(&mut dir, "b", b).unwrap();
        assert_eq!(dir.size, size_before);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn insert_beyond_one_block_allocates_a_second_block() {
        let (mut fs, path) = mounted_fs("grow");
        let mut dir = Inode::new(true);
        for i in 0..(DIR_ENTRIES_PER_BLOCK + 1) {
            let child = fs.alloc_inode(false).unwrap();
            fs.dir_insert(&mut dir, &format!("f{i}"), child).unwrap();
        }
        assert_eq!(dir.size, 2 * vdisk::BLOCK_SIZE as u64);
        assert_eq!(fs.dir_entries(&dir).unwrap().len(), DIR_ENTRIES_PER_BLOCK + 1);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
