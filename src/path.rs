//! Path parsing and validation.
//!
//! An absolute path is split on `/` into components; each component is
//! checked against the rules in spec.md §4.4 up front, so every caller
//! downstream of [`split`] can assume a list of short, non-empty,
//! non-`.`/`..` names.

use crate::error::Error;
use crate::{DIR_DEPTH_LIMIT, DIR_NAME_MAX};

/// Splits an absolute path into validated components. `/` itself yields an
/// empty vector (it resolves directly to the root inode).
pub fn split(path: &str) -> Result<Vec<String>, Error> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "path must be absolute".to_string(),
        });
    }

    let rest = &path[1..];
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let components: Vec<&str> = rest.split('/').collect();

    for c in &components {
        if c.is_empty() {
            return Err(Error::InvalidPath {
                path: path.to_string(),
                reason: "empty path component".to_string(),
            });
        }
        if *c == "." || *c == ".." {
            return Err(Error::InvalidPath {
                path: path.to_string(),
                reason: format!("{c:?} is not a valid path component"),
            });
        }
        if c.len() > DIR_NAME_MAX - 1 {
            return Err(Error::NameTooLong {
                component: c.to_string(),
            });
        }
    }

    if components.len() > DIR_DEPTH_LIMIT {
        return Err(Error::TooDeep {
            path: path.to_string(),
            limit: DIR_DEPTH_LIMIT,
        });
    }

    Ok(components.into_iter().map(str::to_string).collect())
}
