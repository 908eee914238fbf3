// src/readers/mod.rs

//! "Readers" for _faelib_: the path-spec resolver capability.
//!
//! The resolver turns a [`PathSpec`] chain into an openable
//! [`FileEntry`], decompressing GZIP streams and extracting TAR and ZIP
//! members along the way, through the [`FileSystem`] trait that abstracts
//! the concrete evidence backend (host filesystem, disk image, shadow
//! store).
//!
//! Each extraction worker owns an independent [`Resolver`] context with a
//! small bounded cache of open container handles; resolver contexts are
//! never shared across workers.
//!
//! _These are not rust "Readers"; these structs do not implement the trait
//! [`Read`]. These are "readers" in an informal sense._
//!
//! [`PathSpec`]: crate::data::pathspec::PathSpec
//! [`FileEntry`]: crate::readers::resolver::FileEntry
//! [`FileSystem`]: crate::readers::resolver::FileSystem
//! [`Resolver`]: crate::readers::resolver::Resolver
//! [`Read`]: std::io::Read

pub mod helpers;
pub mod resolver;
