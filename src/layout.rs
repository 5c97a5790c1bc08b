//! The layout planner: a pure function from a block count to a region map.
//!
//! Kept free of any I/O so it can be unit-tested against the exact numbers
//! spec.md's own test table asserts, and so `format` and `mount` share one
//! source of truth for where each region starts.

use crate::block::Superblock;
use crate::error::Error;
use crate::{BITMAP_MAX_BITS, INODES_PER_BLOCK};

/// Block 1 always holds the block bitmap, block 2 the inode bitmap, and
/// the inode table starts at block 3 — fixed regardless of disk size.
pub const BLOCK_BITMAP_BLOCK: u32 = 1;
pub const INODE_BITMAP_BLOCK: u32 = 2;
pub const INODE_TABLE_START: u32 = 3;

/// Computes the region map for a disk of `total_blocks` blocks.
///
/// Policy: one potential inode per block (`inodes_count = total_blocks`).
/// Rejects disks with no room for at least one data block, and disks too
/// large for a single bitmap block to index (spec.md §9's open question,
/// resolved here by capping supported size rather than extending the
/// bitmap layout).
pub fn plan(total_blocks: u32) -> Result<Superblock, Error> {
    if total_blocks > BITMAP_MAX_BITS {
        return Err(Error::DiskTooLarge {
            blocks: total_blocks,
            max: BITMAP_MAX_BITS,
        });
    }

    let inodes_count = total_blocks;
    let per_block = INODES_PER_BLOCK as u32;
    let inode_table_blocks = (inodes_count + per_block - 1) / per_block;
    let data_blocks_start = INODE_TABLE_START + inode_table_blocks;

    if total_blocks < data_blocks_start + 1 {
        return Err(Error::OutOfSpace { kind: "data block" });
    }

    Ok(Superblock {
        blocks_count: total_blocks,
        inodes_count,
        block_bitmap: BLOCK_BITMAP_BLOCK,
        inode_bitmap: INODE_BITMAP_BLOCK,
        inode_table_start: INODE_TABLE_START,
        data_blocks_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_sizes() {
        assert_eq!(plan(16).unwrap().data_blocks_start, 4);
        assert_eq!(plan(100).unwrap().data_blocks_start, 5);
        assert_eq!(plan(1000).unwrap().data_blocks_start, 19);
    }

    #[test]
    fn full_superblock_for_16_blocks() {
        let sb = plan(16).unwrap();
        assert_eq!(sb.blocks_count, 16);
        assert_eq!(sb.inodes_count, 16);
        assert_eq!(sb.block_bitmap, 1);
        assert_eq!(sb.inode_bitmap, 2);
        assert_eq!(sb.inode_table_start, 3);
        assert_eq!(sb.data_blocks_start, 4);
    }

    #[test]
    fn rejects_disk_with_no_room_for_data() {
        assert!(plan(3).is_err());
    }

    #[test]
    fn rejects_disk_beyond_bitmap_capacity() {
        assert!(plan(BITMAP_MAX_BITS + 1).is_err());
    }
}
