//! The namespace engine: path resolution and the public
//! `create`/`remove`/`list` operations built on top of it.

use vdisk::BlockDevice;

use crate::block::Inode;
use crate::{path, DirListEntry, Error, FileSystem, ROOT_INODE};

/// What to do when resolution reaches a path component that does not exist.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Create {
    /// Fail with `Error::NotFound` — used by lookups, `remove`, `list`.
    Never,
    /// Create every missing directory on the way down, including the last
    /// component of the path handed to `resolve` — used exclusively via
    /// `resolve_parent`, which has already stripped the caller's own final
    /// component off before calling `resolve`, so every component `resolve`
    /// still sees here is itself an intermediate directory to auto-create
    /// (spec.md §4.4/§4.9).
    IntermediateDirs,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Resolves an absolute path to an inode number, following
    /// `components` one at a time from the root.
    pub(crate) fn resolve(&mut self, path: &str, on_missing: Create) -> Result<u32, Error> {
        let components = path::split(path)?;
        let mut current = ROOT_INODE;

        for name in &components {
            let current_inode = self.read_inode(current)?;
            if !current_inode.is_directory {
                return Err(Error::NotADirectory { path: path.to_string() });
            }

            match self.dir_lookup(&current_inode, name)? {
                Some(child) => current = child,
                None => {
                    if on_missing == Create::IntermediateDirs {
                        let mut parent = current_inode;
                        let child_idx = self.alloc_inode(true)?;
                        self.dir_insert(&mut parent, name, child_idx)?;
                        self.write_inode(current, &parent)?;
                        current = child_idx;
                    } else {
                        return Err(Error::NotFound { path: path.to_string() });
                    }
                }
            }
        }

        Ok(current)
    }

    /// Resolves the parent directory of `path`'s final component,
    /// auto-creating missing intermediate directories, and returns
    /// `(parent_inode_number, final_component_name)`.
    pub(crate) fn resolve_parent(&mut self, path: &str) -> Result<(u32, String), Error> {
        let components = path::split(path)?;
        let name = components
            .last()
            .cloned()
            .ok_or_else(|| Error::InvalidPath {
                path: path.to_string(),
                reason: "root has no parent".to_string(),
            })?;
        let parent_path = if components.len() == 1 {
            "/".to_string()
        } else {
            format!("/{}", components[..components.len() - 1].join("/"))
        };
        let parent = self.resolve(&parent_path, Create::IntermediateDirs)?;
        Ok((parent, name))
    }

    /// Creates a file or (empty) directory at `path`. Missing intermediate
    /// directories are created implicitly; `path` itself must not already
    /// exist (`Error::AlreadyExists`).
    pub fn create(&mut self, path: &str, is_directory: bool) -> Result<u32, Error> {
        self.require_mount_ref()?;
        let (parent_idx, name) = self.resolve_parent(path)?;
        let mut parent = self.read_inode(parent_idx)?;
        if !parent.is_directory {
            return Err(Error::NotADirectory { path: path.to_string() });
        }

        if self.dir_lookup(&parent, &name)?.is_some() {
            return Err(Error::AlreadyExists { path: path.to_string() });
        }

        let child_idx = self.alloc_inode(is_directory)?;
        self.dir_insert(&mut parent, &name, child_idx)?;
        self.write_inode(parent_idx, &parent)?;
        log::debug!("create: {path} -> inode {child_idx} (directory={is_directory})");
        Ok(child_idx)
    }

    /// Removes the file or directory at `path`. Removing a non-empty
    /// directory recursively removes its contents first.
    pub fn remove(&mut self, path: &str) -> Result<(), Error> {
        self.require_mount_ref()?;
        if path::split(path)?.is_empty() {
            return Err(Error::InvalidPath {
                path: path.to_string(),
                reason: "cannot remove the root directory".to_string(),
            });
        }

        let target_idx = self.resolve(path, Create::Never)?;
        self.remove_tree(target_idx)?;

        let (parent_idx, name) = self.resolve_parent(path)?;
        let parent = self.read_inode(parent_idx)?;
        self.dir_remove_entry(&parent, &name)?;
        Ok(())
    }

    /// Frees `inode_idx` and everything it owns: its data blocks, and
    /// (recursively, depth-first) every child if it is a directory.
    fn remove_tree(&mut self, inode_idx: u32) -> Result<(), Error> {
        let mut inode = self.read_inode(inode_idx)?;
        if inode.is_directory {
            let children = self.dir_entries(&inode)?;
            for child in children {
                self.remove_tree(child.inode_number)?;
            }
        }
        self.free_all_blocks(&mut inode)?;
        self.write_inode(inode_idx, &Inode::EMPTY)?;
        self.free_inode(inode_idx)?;
        log::debug!("remove_tree: freed inode {inode_idx}");
        Ok(())
    }

    /// Lists the entries of the directory at `path`.
    pub fn list(&mut self, path: &str) -> Result<Vec<DirListEntry>, Error> {
        self.require_mount_ref()?;
        let idx = self.resolve(path, Create::Never)?;
        let inode = self.read_inode(idx)?;
        if !inode.is_directory {
            return Err(Error::NotADirectory { path: path.to_string() });
        }
        self.dir_listing(&inode)
    }
}
