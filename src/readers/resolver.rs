// src/readers/resolver.rs

//! The path-spec resolver: [`FileSystem`] and [`FileEntry`] capability
//! traits, the host-OS implementation [`OsFileSystem`], and the per-worker
//! [`Resolver`] context that materializes nested [`PathSpec`] chains
//! (GZIP streams, TAR members, ZIP members).
//!
//! [`PathSpec`]: crate::data::pathspec::PathSpec

use std::fmt::Debug;
use std::io::{Cursor, Error, ErrorKind, Read, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ::flate2::read::GzDecoder;
use ::lru::LruCache;
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Bytes, FPath, FileSz, FILE_SYSTEM_CACHE_SZ};
use crate::data::pathspec::{PathSpec, PathSpecP, TypeIndicator};
use crate::readers::helpers::{basename, path_to_fpath};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// capability traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Seconds and nanoseconds since the Unix epoch.
pub type TimeSpec = (i64, u32);

/// Stat view of a resolved file entry. Timestamp fields are `None` when
/// the backend does not track them (e.g. archive members).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EntryStat {
    pub filesz: FileSz,
    /// Backend file identifier (inode number on POSIX backends;
    /// `0` when not tracked).
    pub inode: u64,
    /// Last-access time.
    pub atime: Option<TimeSpec>,
    /// Last-modification time.
    pub mtime: Option<TimeSpec>,
    /// Metadata-change time.
    pub ctime: Option<TimeSpec>,
    /// Creation time.
    pub crtime: Option<TimeSpec>,
}

/// A resolved, openable view of a [`PathSpec`]: stat, stream, children.
///
/// Borrowed for the duration of one extraction; never cached by name
/// across workers.
///
/// [`PathSpec`]: crate::data::pathspec::PathSpec
pub trait FileEntry {
    /// The entry's name (final path segment).
    fn name(&self) -> FPath;
    fn pathspec(&self) -> &PathSpecP;
    fn is_file(&self) -> bool;
    fn is_directory(&self) -> bool;
    fn is_device(&self) -> bool {
        false
    }
    fn is_symlink(&self) -> bool {
        false
    }
    /// Is the entry allocated? Filesystem backends recovering deleted
    /// entries may return `false`; such entries are skipped by the
    /// collector.
    fn is_allocated(&self) -> bool {
        true
    }
    fn stat(&self) -> Result<EntryStat>;
    /// Open the entry's content as a byte stream.
    fn open_stream(&self) -> Result<Box<dyn Read + '_>>;
    /// Enumerate child entries of a directory. Errors for non-directories.
    fn sub_entries(&self) -> Result<Vec<Box<dyn FileEntry>>>;
}

/// An evidence backend: host filesystem, disk image volume, or mounted
/// directory. One `FileSystem` value per resolver context; implementations
/// must not share mutable caches behind this trait.
pub trait FileSystem: Send {
    /// The root directory entry of this filesystem view.
    fn open_root(&self) -> Result<Box<dyn FileEntry>>;
    /// Resolve an [`TypeIndicator::Os`]-typed `PathSpec` to an entry.
    ///
    /// [`TypeIndicator::Os`]: crate::data::pathspec::TypeIndicator
    fn open_file_entry(
        &self,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>>;
    /// Number of volume-shadow snapshot stores this backend exposes.
    fn shadow_store_count(&self) -> usize {
        0
    }
    /// Open shadow store `store_index` (zero-based) as an independent
    /// filesystem view.
    fn open_shadow_store(
        &self,
        store_index: usize,
    ) -> Result<Box<dyn FileSystem>> {
        Err(Error::new(
            ErrorKind::Unsupported,
            format!("backend has no shadow store {}", store_index),
        ))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OsFileSystem
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// [`FileSystem`] over the host operating system filesystem, rooted at a
/// directory or a single file.
#[derive(Debug)]
pub struct OsFileSystem {
    root: FPath,
}

impl OsFileSystem {
    pub fn new(root: FPath) -> OsFileSystem {
        OsFileSystem { root }
    }
}

impl FileSystem for OsFileSystem {
    fn open_root(&self) -> Result<Box<dyn FileEntry>> {
        let pathspec: PathSpecP = Arc::new(PathSpec::from_os_path(self.root.clone()));
        OsFileEntry::new(pathspec).map(|entry| Box::new(entry) as Box<dyn FileEntry>)
    }

    fn open_file_entry(
        &self,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        if pathspec.type_indicator != TypeIndicator::Os {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("OsFileSystem cannot open type {:?}", pathspec.type_indicator),
            ));
        }
        OsFileEntry::new(pathspec.clone()).map(|entry| Box::new(entry) as Box<dyn FileEntry>)
    }
}

/// [`FileEntry`] backed by one host path.
pub struct OsFileEntry {
    path: PathBuf,
    pathspec: PathSpecP,
    metadata: std::fs::Metadata,
}

impl OsFileEntry {
    pub fn new(pathspec: PathSpecP) -> Result<OsFileEntry> {
        let path: PathBuf = PathBuf::from(&pathspec.location);
        // symlink_metadata so symlinks are reported as such, not followed
        let metadata: std::fs::Metadata = std::fs::symlink_metadata(&path)?;
        Ok(OsFileEntry {
            path,
            pathspec,
            metadata,
        })
    }
}

fn systemtime_to_timespec(st: SystemTime) -> Option<TimeSpec> {
    match st.duration_since(UNIX_EPOCH) {
        Ok(dur) => Some((dur.as_secs() as i64, dur.subsec_nanos())),
        Err(_) => None,
    }
}

impl FileEntry for OsFileEntry {
    fn name(&self) -> FPath {
        basename(&self.pathspec.location)
    }

    fn pathspec(&self) -> &PathSpecP {
        &self.pathspec
    }

    fn is_file(&self) -> bool {
        self.metadata.is_file()
    }

    fn is_directory(&self) -> bool {
        self.metadata.is_dir()
    }

    fn is_device(&self) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            let ft = self.metadata.file_type();
            return ft.is_block_device() || ft.is_char_device();
        }
        #[allow(unreachable_code)]
        false
    }

    fn is_symlink(&self) -> bool {
        self.metadata.file_type().is_symlink()
    }

    fn stat(&self) -> Result<EntryStat> {
        let inode: u64;
        let ctime: Option<TimeSpec>;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            inode = self.metadata.ino();
            ctime = Some((self.metadata.ctime(), self.metadata.ctime_nsec() as u32));
        }
        #[cfg(not(unix))]
        {
            inode = 0;
            ctime = None;
        }
        Ok(EntryStat {
            filesz: self.metadata.len(),
            inode,
            atime: self.metadata.accessed().ok().and_then(systemtime_to_timespec),
            mtime: self.metadata.modified().ok().and_then(systemtime_to_timespec),
            ctime,
            crtime: self.metadata.created().ok().and_then(systemtime_to_timespec),
        })
    }

    fn open_stream(&self) -> Result<Box<dyn Read + '_>> {
        let file = std::fs::File::open(&self.path)?;
        Ok(Box::new(file))
    }

    fn sub_entries(&self) -> Result<Vec<Box<dyn FileEntry>>> {
        defn!("({:?})", self.path);
        if !self.is_directory() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("not a directory {:?}", self.path),
            ));
        }
        let mut entries: Vec<Box<dyn FileEntry>> = Vec::new();
        for dirent in std::fs::read_dir(&self.path)? {
            let dirent = match dirent {
                Ok(val) => val,
                Err(_err) => {
                    defo!("read_dir entry Err {:?}", _err);
                    continue;
                }
            };
            let child_path: FPath = path_to_fpath(&dirent.path());
            // keep the same parent chain (e.g. an enclosing shadow store)
            let child_spec = PathSpec {
                type_indicator: TypeIndicator::Os,
                location: child_path,
                store_index: None,
                parent: self.pathspec.parent.clone(),
            };
            match OsFileEntry::new(Arc::new(child_spec)) {
                Ok(entry) => entries.push(Box::new(entry)),
                Err(_err) => {
                    defo!("OsFileEntry::new Err {:?}", _err);
                    continue;
                }
            }
        }
        defx!("return {} entries", entries.len());
        Ok(entries)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemFileEntry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared byte buffer of an extracted container member.
pub type BytesP = Arc<Bytes>;

/// A [`FileEntry`] materialized in memory: a decompressed GZIP stream or
/// an extracted TAR/ZIP member.
pub struct MemFileEntry {
    name: FPath,
    pathspec: PathSpecP,
    bytes: BytesP,
}

impl MemFileEntry {
    pub fn new(
        name: FPath,
        pathspec: PathSpecP,
        bytes: BytesP,
    ) -> MemFileEntry {
        MemFileEntry {
            name,
            pathspec,
            bytes,
        }
    }
}

impl FileEntry for MemFileEntry {
    fn name(&self) -> FPath {
        self.name.clone()
    }

    fn pathspec(&self) -> &PathSpecP {
        &self.pathspec
    }

    fn is_file(&self) -> bool {
        true
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn stat(&self) -> Result<EntryStat> {
        Ok(EntryStat {
            filesz: self.bytes.len() as FileSz,
            ..EntryStat::default()
        })
    }

    fn open_stream(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }

    fn sub_entries(&self) -> Result<Vec<Box<dyn FileEntry>>> {
        Err(Error::new(ErrorKind::InvalidInput, "archive member has no sub entries"))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-worker resolver context.
///
/// Resolves nested `PathSpec` chains against a [`FileSystem`], keeping a
/// bounded LRU of opened container content (capacity
/// [`FILE_SYSTEM_CACHE_SZ`]) so that a worker pulling several members of
/// the same archive does not re-open and re-decompress it each time.
/// One `Resolver` per worker; never shared.
///
/// [`FILE_SYSTEM_CACHE_SZ`]: crate::common::FILE_SYSTEM_CACHE_SZ
pub struct Resolver {
    container_cache: LruCache<PathSpec, BytesP>,
}

impl Default for Resolver {
    fn default() -> Resolver {
        Resolver::new()
    }
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            container_cache: LruCache::new(
                NonZeroUsize::new(FILE_SYSTEM_CACHE_SZ).unwrap(),
            ),
        }
    }

    /// Resolve `pathspec` to an openable [`FileEntry`], recursing through
    /// the parent chain as needed.
    pub fn open_file_entry(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        defn!("({})", pathspec);
        let result = match pathspec.type_indicator {
            TypeIndicator::Os => self.open_os_entry(fs, pathspec),
            TypeIndicator::VShadow => {
                let store_index: usize = pathspec.store_index.ok_or_else(|| {
                    Error::new(ErrorKind::InvalidInput, "VShadow pathspec missing store index")
                })?;
                fs.open_shadow_store(store_index)?.open_root()
            }
            TypeIndicator::Gzip => self.open_gzip_stream(fs, pathspec),
            TypeIndicator::Tar => self.open_tar_member(fs, pathspec),
            TypeIndicator::Zip => self.open_zip_member(fs, pathspec),
        };
        defx!();
        result
    }

    /// Read the full content of the container at `pathspec`, through the
    /// LRU cache.
    pub fn container_bytes(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<BytesP> {
        if let Some(bytes) = self.container_cache.get(pathspec.as_ref()) {
            defñ!("cache hit {}", pathspec);
            return Ok(bytes.clone());
        }
        let entry = self.open_file_entry(fs, pathspec)?;
        let mut bytes: Bytes = Bytes::new();
        entry.open_stream()?.read_to_end(&mut bytes)?;
        let bytesp: BytesP = Arc::new(bytes);
        self.container_cache.put((**pathspec).clone(), bytesp.clone());
        Ok(bytesp)
    }

    fn parent_of<'a>(pathspec: &'a PathSpecP) -> Result<&'a PathSpecP> {
        pathspec.parent.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("nested pathspec missing parent: {}", pathspec),
            )
        })
    }

    fn open_os_entry(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        // an OS path parented on a shadow store resolves within that store
        if let Some(parent) = &pathspec.parent {
            if parent.type_indicator == TypeIndicator::VShadow {
                let store_index: usize = parent.store_index.ok_or_else(|| {
                    Error::new(ErrorKind::InvalidInput, "VShadow pathspec missing store index")
                })?;
                return fs
                    .open_shadow_store(store_index)?
                    .open_file_entry(pathspec);
            }
        }
        fs.open_file_entry(pathspec)
    }

    fn open_gzip_stream(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        let parent: &PathSpecP = Self::parent_of(pathspec)?;
        let compressed: BytesP = self.container_bytes(fs, parent)?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut decoded: Bytes = Bytes::new();
        decoder.read_to_end(&mut decoded)?;
        let name: FPath = match pathspec.location.is_empty() {
            // a GZIP stream has no member name of its own
            true => basename(&parent.location),
            false => pathspec.location.clone(),
        };
        Ok(Box::new(MemFileEntry::new(name, pathspec.clone(), Arc::new(decoded))))
    }

    fn open_tar_member(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        let parent: &PathSpecP = Self::parent_of(pathspec)?;
        let archive_bytes: BytesP = self.container_bytes(fs, parent)?;
        let mut archive = ::tar::Archive::new(Cursor::new(archive_bytes.as_slice()));
        for entry_res in archive.entries()? {
            let mut entry = entry_res?;
            let member_path: FPath = match entry.path() {
                Ok(val) => (*(val.to_string_lossy())).to_string(),
                Err(_) => continue,
            };
            if member_path != pathspec.location {
                continue;
            }
            let mut bytes: Bytes = Bytes::new();
            entry.read_to_end(&mut bytes)?;
            let name: FPath = basename(&member_path);
            return Ok(Box::new(MemFileEntry::new(name, pathspec.clone(), Arc::new(bytes))));
        }
        Err(Error::new(
            ErrorKind::NotFound,
            format!("tar member not found: {}", pathspec.location),
        ))
    }

    fn open_zip_member(
        &mut self,
        fs: &dyn FileSystem,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        let parent: &PathSpecP = Self::parent_of(pathspec)?;
        let archive_bytes: BytesP = self.container_bytes(fs, parent)?;
        let mut archive = ::zip::ZipArchive::new(Cursor::new(archive_bytes.as_slice()))
            .map_err(|err| Error::new(ErrorKind::InvalidData, err.to_string()))?;
        let mut member = archive
            .by_name(pathspec.location.as_str())
            .map_err(|err| Error::new(ErrorKind::NotFound, err.to_string()))?;
        let mut bytes: Bytes = Bytes::new();
        member.read_to_end(&mut bytes)?;
        let name: FPath = basename(&pathspec.location);
        Ok(Box::new(MemFileEntry::new(name, pathspec.clone(), Arc::new(bytes))))
    }
}
