// src/collectors/classifier.rs

//! The container classifier: magic-signature detection of embedded
//! archive/compression formats and bounded recursive expansion of their
//! members into derived [`PathSpec`]s.
//!
//! Misclassification must never abort extraction: a malformed or
//! truncated archive of a detected type is treated as "not actually a
//! container" and simply yields no members.
//!
//! [`PathSpec`]: crate::data::pathspec::PathSpec

use std::io::{Cursor, Read};
use std::sync::Arc;

use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{FPath, MAX_FILE_DEPTH};
use crate::data::pathspec::{PathSpec, PathSpecP, TypeIndicator};
use crate::readers::resolver::{BytesP, FileEntry, FileSystem, Resolver};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// signatures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A container format recognizable by magic signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerFormat {
    Gzip,
    Tar,
    Zip,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = b"\x1f\x8b";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Longest byte prefix any signature check needs.
pub const SIGNATURE_READ_SZ: usize = TAR_MAGIC_OFFSET + TAR_MAGIC.len();

/// ZIP member sub-extensions never expanded (bundled code containers,
/// not evidence).
const ZIP_EXCLUDED_EXTENSIONS: [&str; 3] = ["jar", "sym", "xpi"];

/// Match the header bytes against the signature table.
/// `prior_type` is the type indicator of the entry's own `PathSpec`;
/// a GZIP-typed entry is never re-classified as GZIP (that would be a
/// degenerate self-expansion loop).
pub fn classify_header(
    header: &[u8],
    prior_type: TypeIndicator,
) -> Option<ContainerFormat> {
    defñ!("({} bytes, prior {:?})", header.len(), prior_type);
    if header.starts_with(ZIP_MAGIC) {
        return Some(ContainerFormat::Zip);
    }
    if header.starts_with(GZIP_MAGIC) && prior_type != TypeIndicator::Gzip {
        return Some(ContainerFormat::Gzip);
    }
    if header.len() >= TAR_MAGIC_OFFSET + TAR_MAGIC.len()
        && &header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()] == TAR_MAGIC
    {
        return Some(ContainerFormat::Tar);
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// expansion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classify an opened `entry` and, if it is a container, yield one
/// derived `PathSpec` per member, parented on the entry's own `PathSpec`.
///
/// Yields nothing once `depth >= MAX_FILE_DEPTH`, a hard cutoff that
/// stops archive-bomb style unbounded nesting. All archive-reader errors
/// (bad header, decompression failure, truncation) are treated as "not a
/// container" and yield nothing; they never propagate.
pub fn classify_and_expand(
    entry: &dyn FileEntry,
    depth: usize,
) -> Vec<PathSpecP> {
    defn!("({}, depth {})", entry.pathspec(), depth);
    if depth >= MAX_FILE_DEPTH {
        defx!("depth {} >= MAX_FILE_DEPTH {}; yield nothing", depth, MAX_FILE_DEPTH);
        return Vec::new();
    }
    let mut header: Vec<u8> = vec![0u8; SIGNATURE_READ_SZ];
    let n_read: usize = {
        let mut stream = match entry.open_stream() {
            Ok(val) => val,
            Err(_err) => {
                defx!("open_stream Err {:?}; yield nothing", _err);
                return Vec::new();
            }
        };
        match read_up_to(stream.as_mut(), &mut header) {
            Ok(val) => val,
            Err(_err) => {
                defx!("header read Err {:?}; yield nothing", _err);
                return Vec::new();
            }
        }
    };
    header.truncate(n_read);
    let format: ContainerFormat =
        match classify_header(&header, entry.pathspec().type_indicator) {
            Some(val) => val,
            None => {
                defx!("no signature match; yield nothing");
                return Vec::new();
            }
        };
    defo!("classified {:?}", format);
    let members: Vec<PathSpecP> = match format {
        ContainerFormat::Gzip => expand_gzip(entry.pathspec()),
        ContainerFormat::Tar => expand_tar(entry),
        ContainerFormat::Zip => expand_zip(entry),
    };
    defx!("return {} members", members.len());
    members
}

/// Classify `pathspec` and expand members recursively, depth-first, with
/// `depth+1` per nesting level. Used by the collector when container
/// classification is enabled: every returned `PathSpec` is a candidate
/// for the task queue.
pub fn classify_and_expand_recursive(
    resolver: &mut Resolver,
    fs: &dyn FileSystem,
    pathspec: &PathSpecP,
    depth: usize,
) -> Vec<PathSpecP> {
    defn!("({}, depth {})", pathspec, depth);
    let entry = match resolver.open_file_entry(fs, pathspec) {
        Ok(val) => val,
        Err(_err) => {
            defx!("open_file_entry Err {:?}; yield nothing", _err);
            return Vec::new();
        }
    };
    let mut expanded: Vec<PathSpecP> = Vec::new();
    for member in classify_and_expand(entry.as_ref(), depth).into_iter() {
        let nested: Vec<PathSpecP> =
            classify_and_expand_recursive(resolver, fs, &member, depth + 1);
        expanded.push(member);
        expanded.extend(nested);
    }
    defx!("return {} pathspecs", expanded.len());
    expanded
}

/// A GZIP file holds exactly one compressed stream; one derived member.
fn expand_gzip(pathspec: &PathSpecP) -> Vec<PathSpecP> {
    vec![Arc::new(PathSpec::child_of(pathspec, TypeIndicator::Gzip, FPath::new()))]
}

fn expand_tar(entry: &dyn FileEntry) -> Vec<PathSpecP> {
    defn!("({})", entry.pathspec());
    let bytes: BytesP = match read_all(entry) {
        Ok(val) => val,
        Err(_err) => {
            defx!("read Err {:?}; yield nothing", _err);
            return Vec::new();
        }
    };
    let mut members: Vec<PathSpecP> = Vec::new();
    let mut archive = ::tar::Archive::new(Cursor::new(bytes.as_slice()));
    let entry_iter = match archive.entries() {
        Ok(val) => val,
        Err(_err) => {
            defx!("tar entries Err {:?}; yield nothing", _err);
            return Vec::new();
        }
    };
    for entry_res in entry_iter {
        let tar_entry = match entry_res {
            Ok(val) => val,
            Err(_err) => {
                defo!("tar entry Err {:?}; stop yielding", _err);
                break;
            }
        };
        if !tar_entry.header().entry_type().is_file() {
            continue;
        }
        if tar_entry.size() == 0 {
            defo!("skip zero-length member");
            continue;
        }
        let member_path: FPath = match tar_entry.path() {
            Ok(val) => (*(val.to_string_lossy())).to_string(),
            Err(_err) => {
                defo!("tar entry path Err {:?}", _err);
                continue;
            }
        };
        members.push(Arc::new(PathSpec::child_of(
            entry.pathspec(),
            TypeIndicator::Tar,
            member_path,
        )));
    }
    defx!("return {} members", members.len());
    members
}

fn expand_zip(entry: &dyn FileEntry) -> Vec<PathSpecP> {
    defn!("({})", entry.pathspec());
    let bytes: BytesP = match read_all(entry) {
        Ok(val) => val,
        Err(_err) => {
            defx!("read Err {:?}; yield nothing", _err);
            return Vec::new();
        }
    };
    let mut archive = match ::zip::ZipArchive::new(Cursor::new(bytes.as_slice())) {
        Ok(val) => val,
        Err(_err) => {
            defx!("ZipArchive Err {:?}; yield nothing", _err);
            return Vec::new();
        }
    };
    let mut members: Vec<PathSpecP> = Vec::new();
    for index in 0..archive.len() {
        let member = match archive.by_index(index) {
            Ok(val) => val,
            Err(_err) => {
                defo!("zip member {} Err {:?}; stop yielding", index, _err);
                break;
            }
        };
        if member.is_dir() || member.size() == 0 {
            defo!("skip directory or zero-length member {:?}", member.name());
            continue;
        }
        let member_path: FPath = member.name().to_string();
        if zip_extension_excluded(&member_path) {
            defo!("skip excluded extension {:?}", member_path);
            continue;
        }
        members.push(Arc::new(PathSpec::child_of(
            entry.pathspec(),
            TypeIndicator::Zip,
            member_path,
        )));
    }
    defx!("return {} members", members.len());
    members
}

fn zip_extension_excluded(member_path: &str) -> bool {
    let extension: &str = match member_path.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return false,
    };
    ZIP_EXCLUDED_EXTENSIONS
        .iter()
        .any(|excluded| extension.eq_ignore_ascii_case(excluded))
}

fn read_all(entry: &dyn FileEntry) -> std::io::Result<BytesP> {
    let mut bytes: Vec<u8> = Vec::new();
    entry.open_stream()?.read_to_end(&mut bytes)?;
    Ok(Arc::new(bytes))
}

/// `read` until `buf` is full or EOF; returns count of bytes read.
/// (`Read::read` may return short counts before EOF.)
fn read_up_to(
    reader: &mut dyn Read,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut total: usize = 0;
    while total < buf.len() {
        let n: usize = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}
