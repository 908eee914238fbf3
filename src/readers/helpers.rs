// src/readers/helpers.rs

//! Miscellaneous helper functions for _Readers_ and _Collectors_.

use std;

use crate::common::FPath;

/// Return the basename of an `FPath`.
pub fn basename(path: &FPath) -> FPath {
    let mut riter = path.rsplit('/');

    FPath::from(riter.next().unwrap_or(""))
}

/// Helper function for a slightly annoying set of calls.
pub fn path_to_fpath(path: &std::path::Path) -> FPath {
    (*(path.to_string_lossy())).to_string()
}
