//! A fixed-count, fixed-size block device backed by a host file.
//!
//! This is the "external collaborator" the file-system layer is built on:
//! a thin sector-addressable store exposing `read`/`write`/size, with the
//! single invariant that every block is zero-filled until first written.
//! It knows nothing about superblocks, bitmaps or inodes — that is
//! `blockfs`'s job, reached only through the [`BlockDevice`] trait below.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Bytes per block. Every read/write on a [`BlockDevice`] moves exactly
/// one block.
pub const BLOCK_SIZE: usize = 4096;

/// A single block's worth of bytes.
pub type BlockBuf = [u8; BLOCK_SIZE];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("block {blocknum} is out of range (disk has {blocks_count} blocks)")]
    OutOfRange { blocknum: u32, blocks_count: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The block-device contract consumed by the file-system layer. Kept as a
/// trait so `blockfs` never depends on the concrete host-file storage.
pub trait BlockDevice {
    /// Number of blocks addressable on this device.
    fn size(&self) -> u32;

    /// Reads exactly one block into `buf`.
    fn read_block(&mut self, blocknum: u32, buf: &mut BlockBuf) -> Result<(), Error>;

    /// Writes exactly one block from `buf`.
    fn write_block(&mut self, blocknum: u32, buf: &BlockBuf) -> Result<(), Error>;
}

/// A virtual disk whose block image lives in a single regular host file.
pub struct FileBlockDevice {
    file: File,
    blocks_count: u32,
    reads: u64,
    writes: u64,
}

impl FileBlockDevice {
    /// Creates (or truncates, mirroring the reference's `fopen(path, "w+")`)
    /// the host file at `path` and zero-fills `nblocks` blocks into it.
    pub fn init(path: impl AsRef<Path>, nblocks: u32) -> Result<Self, Error> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let zero = [0u8; BLOCK_SIZE];
        for _ in 0..nblocks {
            file.write_all(&zero)?;
        }
        file.flush()?;

        log::debug!("vdisk: initialised {nblocks} zero-filled blocks");
        Ok(Self {
            file,
            blocks_count: nblocks,
            reads: 0,
            writes: 0,
        })
    }

    /// Re-opens an already-formatted disk image without touching its
    /// contents. `nblocks` must match what the image was created with —
    /// callers normally learn this from a superblock read performed before
    /// any other block I/O.
    pub fn open(path: impl AsRef<Path>, nblocks: u32) -> Result<Self, Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            blocks_count: nblocks,
            reads: 0,
            writes: 0,
        })
    }

    fn sanity_check(&self, blocknum: u32) -> Result<(), Error> {
        if blocknum >= self.blocks_count {
            return Err(Error::OutOfRange {
                blocknum,
                blocks_count: self.blocks_count,
            });
        }
        Ok(())
    }

    /// Flushes and closes the disk. If `log` is set, returns the number of
    /// block reads/writes performed so the caller can report them — the
    /// device itself never prints, unlike the reference `disk_close`.
    pub fn close(mut self, log: bool) -> Result<(u64, u64), Error> {
        self.file.flush()?;
        if log {
            log::info!("vdisk: {} reads, {} writes", self.reads, self.writes);
        }
        Ok((self.reads, self.writes))
    }
}

impl BlockDevice for FileBlockDevice {
    fn size(&self) -> u32 {
        self.blocks_count
    }

    fn read_block(&mut self, blocknum: u32, buf: &mut BlockBuf) -> Result<(), Error> {
        self.sanity_check(blocknum)?;
        self.file
            .seek(SeekFrom::Start(blocknum as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)?;
        self.reads += 1;
        Ok(())
    }

    fn write_block(&mut self, blocknum: u32, buf: &BlockBuf) -> Result<(), Error> {
        self.sanity_check(blocknum)?;
        self.file
            .seek(SeekFrom::Start(blocknum as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        self.writes += 1;
        Ok(())
    }
}
