//! The error taxonomy every `blockfs` operation reports through.
//!
//! The reference C implementation collapses all of this into a bare `-1`
//! return. Rust gives us a typed enum instead; the variants below are a
//! one-to-one mapping of that taxonomy, not an invention of our own.

use crate::DIR_NAME_MAX;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file system is not mounted")]
    NotMounted,

    #[error("disk is not formatted (or its superblock is invalid)")]
    NotFormatted,

    #[error("{path} already exists")]
    AlreadyExists { path: String },

    #[error("{path} not found")]
    NotFound { path: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("{path} is a directory")]
    IsADirectory { path: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path {path:?} has more than the allowed {limit} components")]
    TooDeep { path: String, limit: usize },

    #[error("path component {component:?} is longer than {max} bytes", max = DIR_NAME_MAX - 1)]
    NameTooLong { component: String },

    #[error("out of space (no free {kind})")]
    OutOfSpace { kind: &'static str },

    #[error("file would exceed the maximum size of {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("disk of {blocks} blocks exceeds the single-bitmap-block capacity of {max}")]
    DiskTooLarge { blocks: u32, max: u32 },

    #[error("i/o error: {0}")]
    Io(#[from] vdisk::Error),
}
