// src/tests/classifier_tests.rs

//! tests for `classifier.rs`

use ::test_case::test_case;

use crate::collectors::classifier::{
    classify_and_expand_recursive,
    classify_header,
    ContainerFormat,
};
use crate::data::pathspec::{PathSpecP, TypeIndicator};
use crate::readers::resolver::Resolver;
use crate::tests::common::{
    gzip_bytes,
    os_pathspec,
    tar_bytes,
    tgz_bytes,
    zip_bytes,
    MockFileSystem,
    MockVolume,
    SYSLOG_LINES,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// signature matching
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn tar_header() -> Vec<u8> {
    tar_bytes(&[("member", b"x")])
}

#[test]
fn test_classify_header_zip() {
    assert_eq!(
        classify_header(b"PK\x03\x04rest-of-archive", TypeIndicator::Os),
        Some(ContainerFormat::Zip),
    );
}

#[test]
fn test_classify_header_gzip() {
    assert_eq!(
        classify_header(b"\x1f\x8b\x08\x00", TypeIndicator::Os),
        Some(ContainerFormat::Gzip),
    );
}

/// A GZIP-typed entry is never re-classified as GZIP.
#[test]
fn test_classify_header_gzip_self_reference_guard() {
    assert_eq!(classify_header(b"\x1f\x8b\x08\x00", TypeIndicator::Gzip), None);
}

#[test]
fn test_classify_header_tar() {
    let header: Vec<u8> = tar_header();
    assert_eq!(classify_header(&header, TypeIndicator::Os), Some(ContainerFormat::Tar));
}

#[test_case(b"plain text file content"; "text")]
#[test_case(b""; "empty")]
#[test_case(b"PK"; "short zip prefix")]
fn test_classify_header_none(header: &[u8]) {
    assert_eq!(classify_header(header, TypeIndicator::Os), None);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// recursive expansion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn expand(
    volume: MockVolume,
    location: &str,
) -> Vec<PathSpecP> {
    let fs = MockFileSystem::new(volume);
    let mut resolver = Resolver::new();
    let pathspec: PathSpecP = os_pathspec(location);
    classify_and_expand_recursive(&mut resolver, &fs, &pathspec, 0)
}

/// Expansion of adversarially nested archives terminates at the depth
/// cap: a 4-deep nesting yields members for 3 levels only.
#[test]
fn test_expansion_depth_cutoff() {
    let level4: Vec<u8> = zip_bytes(&[("file.txt", b"innermost")]);
    let level3: Vec<u8> = zip_bytes(&[("l3.zip", &level4)]);
    let level2: Vec<u8> = zip_bytes(&[("l2.zip", &level3)]);
    let level1: Vec<u8> = zip_bytes(&[("l1.zip", &level2)]);
    let mut volume = MockVolume::new();
    volume.add_file("bomb.zip", &level1);
    let members: Vec<PathSpecP> = expand(volume, "bomb.zip");
    assert_eq!(members.len(), 3);
    assert!(members.iter().all(|spec| spec.location != "file.txt"));
}

/// A GZIP stream that itself contains GZIP bytes must not self-expand.
#[test]
fn test_expansion_gzip_not_self_expanded() {
    let double: Vec<u8> = gzip_bytes(&gzip_bytes(b"log line\n"));
    let mut volume = MockVolume::new();
    volume.add_file("data.gz", &double);
    let members: Vec<PathSpecP> = expand(volume, "data.gz");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].type_indicator, TypeIndicator::Gzip);
}

#[test]
fn test_expansion_zip_skips_excluded_extensions() {
    let archive: Vec<u8> = zip_bytes(&[
        ("syslog.txt", b"content" as &[u8]),
        ("bundle.jar", b"content"),
        ("symbols.SYM", b"content"),
        ("addon.xpi", b"content"),
    ]);
    let mut volume = MockVolume::new();
    volume.add_file("archive.zip", &archive);
    let members: Vec<PathSpecP> = expand(volume, "archive.zip");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].location, "syslog.txt");
}

#[test]
fn test_expansion_tar_skips_zero_length_members() {
    let archive: Vec<u8> = tar_bytes(&[
        ("empty.log", b"" as &[u8]),
        ("real.log", b"content"),
    ]);
    let mut volume = MockVolume::new();
    volume.add_file("archive.tar", &archive);
    let members: Vec<PathSpecP> = expand(volume, "archive.tar");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].location, "real.log");
}

/// A corrupt archive with a valid magic is "not actually a container".
#[test]
fn test_expansion_corrupt_archive_yields_nothing() {
    let mut volume = MockVolume::new();
    volume.add_file("fake.zip", b"PK\x03\x04 but then not actually a zip archive");
    let members: Vec<PathSpecP> = expand(volume, "fake.zip");
    assert!(members.is_empty());
}

#[test]
fn test_expansion_plain_file_yields_nothing() {
    let mut volume = MockVolume::new();
    volume.add_file("syslog", SYSLOG_LINES.as_bytes());
    assert!(expand(volume, "syslog").is_empty());
}

/// A `.tgz` is GZIP wrapping TAR: the GZIP stream, then the TAR members
/// inside it, each parented on the previous level.
#[test]
fn test_expansion_tgz_chain() {
    let archive: Vec<u8> = tgz_bytes(&[("syslog.1", SYSLOG_LINES.as_bytes())]);
    let mut volume = MockVolume::new();
    volume.add_file("sys.tgz", &archive);
    let members: Vec<PathSpecP> = expand(volume, "sys.tgz");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].type_indicator, TypeIndicator::Gzip);
    assert_eq!(members[1].type_indicator, TypeIndicator::Tar);
    assert_eq!(members[1].location, "syslog.1");
    assert_eq!(
        members[1].display_name(),
        "OS:sys.tgz|GZIP:|TAR:syslog.1",
    );
}
