// src/tests/pathspec_tests.rs

//! tests for `pathspec.rs`

use std::sync::Arc;

use ::test_case::test_case;

use crate::data::pathspec::{PathSpec, PathSpecP, TypeIndicator};
use crate::tests::common::os_pathspec;

fn nested_chain() -> PathSpecP {
    // OS:/var/log/sys.tgz | GZIP: | TAR:syslog.1
    let os: PathSpecP = os_pathspec("/var/log/sys.tgz");
    let gz: PathSpecP = Arc::new(PathSpec::child_of(&os, TypeIndicator::Gzip, String::new()));
    Arc::new(PathSpec::child_of(&gz, TypeIndicator::Tar, "syslog.1".to_string()))
}

#[test]
fn test_chain_len() {
    let chain: PathSpecP = nested_chain();
    assert_eq!(chain.chain_len(), 3);
    assert_eq!(chain.outermost().chain_len(), 1);
}

#[test]
fn test_outermost() {
    let chain: PathSpecP = nested_chain();
    let outermost: &PathSpec = chain.outermost();
    assert_eq!(outermost.type_indicator, TypeIndicator::Os);
    assert_eq!(outermost.location, "/var/log/sys.tgz");
}

#[test_case(TypeIndicator::Os, true)]
#[test_case(TypeIndicator::Gzip, true)]
#[test_case(TypeIndicator::Tar, true)]
#[test_case(TypeIndicator::Zip, false)]
#[test_case(TypeIndicator::VShadow, false)]
fn test_chain_contains(
    type_indicator: TypeIndicator,
    expected: bool,
) {
    assert_eq!(nested_chain().chain_contains(type_indicator), expected);
}

#[test]
fn test_display_name_nested() {
    assert_eq!(
        nested_chain().display_name(),
        "OS:/var/log/sys.tgz|GZIP:|TAR:syslog.1",
    );
}

#[test]
fn test_display_name_shadow_store() {
    let root: PathSpecP = os_pathspec("/");
    let store: PathSpecP = Arc::new(PathSpec::shadow_store_of(&root, 0));
    let file: PathSpecP = Arc::new(PathSpec {
        type_indicator: TypeIndicator::Os,
        location: "var/log/syslog".to_string(),
        store_index: None,
        parent: Some(store),
    });
    assert_eq!(file.display_name(), "OS:/|VSHADOW:0|OS:var/log/syslog");
}

/// Equality is structural across the whole chain.
#[test]
fn test_structural_equality() {
    assert_eq!(nested_chain(), nested_chain());
    let other: PathSpecP = os_pathspec("/var/log/sys.tgz");
    assert_ne!(*nested_chain(), *other);
}
