// src/collectors/mod.rs

//! "Collectors" for _faelib_: candidate discovery.
//!
//! * The [`Collector`] walks a filesystem view breadth-first, optionally
//!   filtered by [`FindSpec`]s and optionally across volume-shadow
//!   snapshot stores, pushing discovered [`PathSpec`]s onto the bounded
//!   task queue.
//! * The [`classifier`] inspects byte-stream headers for embedded
//!   container formats (ZIP, TAR, GZIP) and yields derived `PathSpec`s
//!   for their members, bounded by [`MAX_FILE_DEPTH`].
//!
//! [`Collector`]: crate::collectors::collector::Collector
//! [`FindSpec`]: crate::collectors::findspec::FindSpec
//! [`PathSpec`]: crate::data::pathspec::PathSpec
//! [`classifier`]: crate::collectors::classifier
//! [`MAX_FILE_DEPTH`]: crate::common::MAX_FILE_DEPTH

pub mod classifier;
pub mod collector;
pub mod findspec;
