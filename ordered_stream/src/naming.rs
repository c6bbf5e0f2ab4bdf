//! Name-based archive checks.
//!
//! Suffixes only decide whether a name "looks like" an archive; they never
//! select the codec.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::codec::Codec;

/// Suffixes recognized as archive names. Matching is case-sensitive.
pub const ARCHIVE_SUFFIXES: [&str; 7] = [".gz", ".zip", ".rar", ".7z", ".tar", ".bz2", ".zst"];

pub fn is_archive(path: &Path) -> bool {
    let name = path.as_os_str().to_string_lossy();
    ARCHIVE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Appends the codec's suffix unless the name already ends in a recognized one.
pub fn with_archive_suffix(path: &Path, codec: Codec) -> PathBuf {
    if is_archive(path) {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(codec.suffix());
    PathBuf::from(name)
}
