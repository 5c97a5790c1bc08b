//! Byte-granular file I/O: `read` and `write` over the block addressing
//! engine, each one translating a byte range into the logical blocks that
//! cover it.

use vdisk::BlockDevice;

use crate::ops::Create;
use crate::{Error, FileSystem, MAX_FILE_BYTES};

impl<D: BlockDevice> FileSystem<D> {
    /// Reads up to `buf.len()` bytes of `path` starting at `offset`.
    /// Returns the number of bytes actually read — 0 once `offset` is at
    /// or past the file's size, short of `buf.len()` if the file ends
    /// first.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        self.require_mount_ref()?;
        let idx = self.resolve(path, Create::Never)?;
        let inode = self.read_inode(idx)?;
        if inode.is_directory {
            return Err(Error::IsADirectory { path: path.to_string() });
        }

        if offset >= inode.size {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(inode.size - offset) as usize;

        let mut done = 0;
        while done < want {
            let file_pos = offset + done as u64;
            let logical = (file_pos / vdisk::BLOCK_SIZE as u64) as usize;
            let within = (file_pos % vdisk::BLOCK_SIZE as u64) as usize;
            let chunk = (vdisk::BLOCK_SIZE - within).min(want - done);

            let physical = self.block_for_read(&inode, logical)?;
            let mut block_buf = [0u8; vdisk::BLOCK_SIZE];
            if physical != 0 {
                self.device.read_block(physical, &mut block_buf)?;
            }
            buf[done..done + chunk].copy_from_slice(&block_buf[within..within + chunk]);
            done += chunk;
        }
        Ok(done)
    }

    /// Writes `data` to `path` starting at `offset`, growing the file and
    /// allocating blocks as needed. `path` is created (along with any
    /// missing intermediate directories) if it does not already exist.
    /// Overwriting never truncates: bytes beyond `offset + data.len()` that
    /// already belonged to the file are left untouched.
    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> Result<usize, Error> {
        self.require_mount_ref()?;
        let idx = match self.resolve(path, Create::Never) {
            Ok(idx) => idx,
            Err(Error::NotFound { .. }) => self.create(path, false)?,
            Err(e) => return Err(e),
        };
        let mut inode = self.read_inode(idx)?;
        if inode.is_directory {
            return Err(Error::IsADirectory { path: path.to_string() });
        }

        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(Error::FileTooLarge { max: MAX_FILE_BYTES })?;
        if end > MAX_FILE_BYTES {
            return Err(Error::FileTooLarge { max: MAX_FILE_BYTES });
        }

        let mut done = 0;
        while done < data.len() {
            let file_pos = offset + done as u64;
            let logical = (file_pos / vdisk::BLOCK_SIZE as u64) as usize;
            let within = (file_pos % vdisk::BLOCK_SIZE as u64) as usize;
            let chunk = (vdisk::BLOCK_SIZE - within).min(data.len() - done);

            let physical = self.ensure_block_for_write(&mut inode, logical)?;
            let mut block_buf = [0u8; vdisk::BLOCK_SIZE];
            // Partial-block writes must preserve the rest of the block's
            // existing contents.
            if within != 0 || chunk != vdisk::BLOCK_SIZE {
                self.device.read_block(physical, &mut block_buf)?;
            }
            block_buf[within..within + chunk].copy_from_slice(&data[done..done + chunk]);
            self.device.write_block(physical, &block_buf)?;
            done += chunk;
        }

        if end > inode.size {
            inode.size = end;
        }
        self.write_inode(idx, &inode)?;
        log::trace!("write: {path} +{} bytes at offset {offset}", data.len());
        Ok(done)
    }

    /// Appends `data` to the end of `path`, creating it first if needed.
    pub fn append(&mut self, path: &str, data: &[u8]) -> Result<usize, Error> {
        let idx = match self.resolve(path, Create::Never) {
            Ok(idx) => idx,
            Err(Error::NotFound { .. }) => self.create(path, false)?,
            Err(e) => return Err(e),
        };
        let size = self.read_inode(idx)?.size;
        self.write(path, data, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdisk::FileBlockDevice;

    fn mounted_fs(name: &str, blocks: u32) -> (FileSystem<FileBlockDevice>, std::path::PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("blockfs-io-test-{name}-{:?}", std::thread::current().id()));
        let device = FileBlockDevice::init(&path, blocks).unwrap();
        let mut fs = FileSystem::new(device);
        fs.format().unwrap();
        fs.mount().unwrap();
        (fs, path)
    }

    #[test]
    fn write_then_read_small_file_roundtrips() {
        let (mut fs, path) = mounted_fs("small", 200);
        let data = b"hello, block filesystem";
        fs.write("/greeting.txt", data, 0).unwrap();

        let mut out = [0u8; 128];
        let n = fs.read("/greeting.txt", &mut out, 0).unwrap();
        assert_eq!(&out[..n], data);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_spanning_two_blocks_roundtrips() {
        let (mut fs, path) = mounted_fs("two-block", 200);
        let data: Vec<u8> = (0..(vdisk::BLOCK_SIZE + 500)).map(|i| (i % 251) as u8).collect();
        fs.write("/big.bin", &data, 0).unwrap();

        let mut out = vec![0u8; data.len()];
        let n = fs.read("/big.bin", &mut out, 0).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn append_grows_the_file_without_disturbing_earlier_bytes() {
        let (mut fs, path) = mounted_fs("append", 200);
        fs.append("/log.txt", b"first ").unwrap();
        fs.append("/log.txt", b"second").unwrap();

        let mut out = [0u8; 64];
        let n = fs.read("/log.txt", &mut out, 0).unwrap();
        assert_eq!(&out[..n], b"first second");

        let listing = fs.list("/").unwrap();
        assert_eq!(listing[0].size, 12);

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn overwrite_does_not_truncate_trailing_bytes() {
        let (mut fs, path) = mounted_fs("overwrite", 200);
        fs.write("/f.txt", b"AAAAAAAAAA", 0).unwrap();
        fs.write("/f.txt", b"BB", 0).unwrap();

        let mut out = [0u8; 16];
        let n = fs.read("/f.txt", &mut out, 0).unwrap();
        assert_eq!(&out[..n], b"BBAAAAAAAA");

        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_creates_missing_parents_implicitly() {
        let (mut fs, path) = mounted_fs("write-implicit", 200);
        fs.write("/a/b/c.txt", b"x", 0).unwrap();
        let listing = fs.list("/a/b").unwrap();
        assert_eq!(listing[0].name, "c.txt");
        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reading_a_directory_is_rejected() {
        let (mut fs, path) = mounted_fs("read-dir", 200);
        fs.create("/d", true).unwrap();
        let mut out = [0u8; 4];
        assert!(matches!(fs.read("/d", &mut out, 0), Err(Error::IsADirectory { .. })));
        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_beyond_max_file_size_is_rejected() {
        let (mut fs, path) = mounted_fs("toolarge", 200);
        let data = [0u8; 1];
        assert!(matches!(
            fs.write("/huge.bin", &data, MAX_FILE_BYTES),
            Err(Error::FileTooLarge { .. })
        ));
        fs.unmount().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
