// src/tests/common.rs

//! Shared test fixtures: an in-memory evidence backend with optional
//! shadow stores, archive byte builders, and sample log content.

#![allow(non_upper_case_globals)]

use std::collections::BTreeMap;
use std::io::{Cursor, Error, ErrorKind, Read, Result, Write};
use std::sync::Arc;

use crate::common::{FPath, FileSz};
use crate::data::pathspec::{PathSpec, PathSpecP, TypeIndicator};
use crate::readers::resolver::{EntryStat, FileEntry, FileSystem, TimeSpec};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sample log content
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Yearless syslog lines spanning a December to January boundary.
pub const SYSLOG_LINES: &str = "\
Dec 30 08:01:02 host1 sshd[42]: Accepted password for root
Dec 31 09:00:00 host1 cron: (root) CMD (true)
Jan  1 00:00:10 host1 kernel: Linux version 5.15.0
";

pub const DPKG_LINES: &str = "\
2016-08-03 15:25:53 startup archives unpack
2016-08-03 15:25:54 install base-passwd:amd64 <none> 3.5.39
2016-08-03 15:25:57 status half-installed base-passwd:amd64 3.5.39
";

pub const APT_HISTORY_RECORDS: &str = "\
Start-Date: 2019-07-10  16:38:12
Commandline: apt-get install rolldice
Install: rolldice:amd64 (1.16-1build1)
End-Date: 2019-07-10  16:38:14

Start-Date: 2019-07-12  09:00:00
Remove: rolldice:amd64 (1.16-1build1)
End-Date: 2019-07-12  09:00:02
";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// pathspec helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn os_pathspec(path: &str) -> PathSpecP {
    Arc::new(PathSpec::from_os_path(path.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// archive builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn gzip_bytes(content: &[u8]) -> Vec<u8> {
    let mut encoder =
        ::flate2::write::GzEncoder::new(Vec::new(), ::flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

pub fn tar_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (name, content) in members.iter() {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = ::zip::write::FileOptions::default();
    for (name, content) in members.iter() {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A `.tgz`: TAR wrapped in GZIP.
pub fn tgz_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    gzip_bytes(&tar_bytes(members))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MockFileSystem
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct MockFile {
    pub bytes: Arc<Vec<u8>>,
    pub inode: u64,
    pub mtime: Option<TimeSpec>,
}

/// One volume's worth of files, keyed by root-relative `/`-separated
/// path. Directories are implied by the keys.
#[derive(Default)]
pub struct MockVolume {
    pub files: BTreeMap<FPath, MockFile>,
}

impl MockVolume {
    pub fn new() -> MockVolume {
        MockVolume::default()
    }

    pub fn add_file(
        &mut self,
        path: &str,
        bytes: &[u8],
    ) {
        let inode: u64 = self.files.len() as u64 + 1;
        self.add_file_full(path, bytes, inode, Some((1_000 + inode as i64, 0)));
    }

    pub fn add_file_full(
        &mut self,
        path: &str,
        bytes: &[u8],
        inode: u64,
        mtime: Option<TimeSpec>,
    ) {
        self.files.insert(
            path.to_string(),
            MockFile {
                bytes: Arc::new(bytes.to_vec()),
                inode,
                mtime,
            },
        );
    }
}

/// In-memory [`FileSystem`] with optional shadow stores. Entry locations
/// are root-relative; the root entry's location is the empty string.
///
/// [`FileSystem`]: crate::readers::resolver::FileSystem
pub struct MockFileSystem {
    volume: Arc<MockVolume>,
    stores: Vec<Arc<MockVolume>>,
    /// Parent of every entry's pathspec; a VShadow spec for store views.
    parent_spec: Option<PathSpecP>,
}

impl MockFileSystem {
    pub fn new(volume: MockVolume) -> MockFileSystem {
        MockFileSystem {
            volume: Arc::new(volume),
            stores: Vec::new(),
            parent_spec: None,
        }
    }

    pub fn with_stores(
        volume: MockVolume,
        stores: Vec<MockVolume>,
    ) -> MockFileSystem {
        MockFileSystem {
            volume: Arc::new(volume),
            stores: stores.into_iter().map(Arc::new).collect(),
            parent_spec: None,
        }
    }

    fn entry_at(
        &self,
        location: FPath,
        pathspec: PathSpecP,
    ) -> MockEntry {
        MockEntry {
            volume: self.volume.clone(),
            location,
            parent_spec: self.parent_spec.clone(),
            pathspec,
        }
    }
}

impl FileSystem for MockFileSystem {
    fn open_root(&self) -> Result<Box<dyn FileEntry>> {
        let pathspec: PathSpecP = Arc::new(PathSpec {
            type_indicator: TypeIndicator::Os,
            location: FPath::new(),
            store_index: None,
            parent: self.parent_spec.clone(),
        });
        Ok(Box::new(self.entry_at(FPath::new(), pathspec)))
    }

    fn open_file_entry(
        &self,
        pathspec: &PathSpecP,
    ) -> Result<Box<dyn FileEntry>> {
        if pathspec.type_indicator != TypeIndicator::Os {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("MockFileSystem cannot open type {:?}", pathspec.type_indicator),
            ));
        }
        let location: FPath = pathspec.location.trim_start_matches('/').to_string();
        let is_file: bool = self.volume.files.contains_key(&location);
        let is_dir: bool = location.is_empty()
            || self
                .volume
                .files
                .keys()
                .any(|key| key.starts_with(&format!("{}/", location)));
        if !is_file && !is_dir {
            return Err(Error::new(ErrorKind::NotFound, format!("no entry {:?}", location)));
        }
        Ok(Box::new(self.entry_at(location, pathspec.clone())))
    }

    fn shadow_store_count(&self) -> usize {
        self.stores.len()
    }

    fn open_shadow_store(
        &self,
        store_index: usize,
    ) -> Result<Box<dyn FileSystem>> {
        let volume: &Arc<MockVolume> = self.stores.get(store_index).ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                format!("no shadow store {}", store_index),
            )
        })?;
        let primary_root: PathSpecP = Arc::new(PathSpec::from_os_path(FPath::new()));
        let store_spec: PathSpecP =
            Arc::new(PathSpec::shadow_store_of(&primary_root, store_index));
        Ok(Box::new(MockFileSystem {
            volume: volume.clone(),
            stores: Vec::new(),
            parent_spec: Some(store_spec),
        }))
    }
}

pub struct MockEntry {
    volume: Arc<MockVolume>,
    location: FPath,
    parent_spec: Option<PathSpecP>,
    pathspec: PathSpecP,
}

impl MockEntry {
    fn file(&self) -> Option<&MockFile> {
        self.volume.files.get(&self.location)
    }
}

impl FileEntry for MockEntry {
    fn name(&self) -> FPath {
        match self.location.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => self.location.clone(),
        }
    }

    fn pathspec(&self) -> &PathSpecP {
        &self.pathspec
    }

    fn is_file(&self) -> bool {
        self.file().is_some()
    }

    fn is_directory(&self) -> bool {
        if self.is_file() {
            return false;
        }
        self.location.is_empty()
            || self
                .volume
                .files
                .keys()
                .any(|key| key.starts_with(&format!("{}/", self.location)))
    }

    fn stat(&self) -> Result<EntryStat> {
        match self.file() {
            Some(file) => Ok(EntryStat {
                filesz: file.bytes.len() as FileSz,
                inode: file.inode,
                atime: None,
                mtime: file.mtime,
                ctime: None,
                crtime: None,
            }),
            None => Ok(EntryStat::default()),
        }
    }

    fn open_stream(&self) -> Result<Box<dyn Read + '_>> {
        match self.file() {
            Some(file) => Ok(Box::new(Cursor::new(file.bytes.as_slice()))),
            None => Err(Error::new(ErrorKind::InvalidInput, "not a file")),
        }
    }

    fn sub_entries(&self) -> Result<Vec<Box<dyn FileEntry>>> {
        if !self.is_directory() {
            return Err(Error::new(ErrorKind::InvalidInput, "not a directory"));
        }
        let prefix: FPath = match self.location.is_empty() {
            true => FPath::new(),
            false => format!("{}/", self.location),
        };
        let mut seen: Vec<FPath> = Vec::new();
        let mut entries: Vec<Box<dyn FileEntry>> = Vec::new();
        for key in self.volume.files.keys() {
            let rest: &str = match key.strip_prefix(&prefix) {
                Some(val) => val,
                None => continue,
            };
            let child_segment: &str = match rest.split('/').next() {
                Some(val) if !val.is_empty() => val,
                _ => continue,
            };
            let child_location: FPath = format!("{}{}", prefix, child_segment);
            if seen.contains(&child_location) {
                continue;
            }
            seen.push(child_location.clone());
            let child_spec: PathSpecP = Arc::new(PathSpec {
                type_indicator: TypeIndicator::Os,
                location: child_location.clone(),
                store_index: None,
                parent: self.parent_spec.clone(),
            });
            entries.push(Box::new(MockEntry {
                volume: self.volume.clone(),
                location: child_location,
                parent_spec: self.parent_spec.clone(),
                pathspec: child_spec,
            }));
        }
        Ok(entries)
    }
}
