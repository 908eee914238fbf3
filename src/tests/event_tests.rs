// src/tests/event_tests.rs

//! tests for `event.rs`

use crate::data::event::{EventData, Timestamp, Value, RESERVED_ATTRIBUTES};
use crate::tests::common::os_pathspec;

fn sample_event() -> EventData {
    let mut event = EventData::new("linux:syslog:line", Timestamp::At(1_500_000_000_000_000));
    event.set_attr("hostname", Value::from("host1"));
    event.set_attr("reporter", Value::from("sshd"));
    event.set_attr("body", Value::from("Accepted password for root"));
    event
}

#[test]
fn test_set_attr_replaces_by_name() {
    let mut event = sample_event();
    event.set_attr("hostname", Value::from("host2"));
    assert_eq!(event.attr("hostname"), Some(&Value::String("host2".to_string())));
    // no duplicate entries
    let count: usize = event
        .attributes()
        .iter()
        .filter(|(name, _)| name == "hostname")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn test_duplicates_identical() {
    assert!(sample_event().is_duplicate_of(&sample_event()));
    assert_eq!(sample_event().dedup_key(), sample_event().dedup_key());
}

/// Reserved attributes are excluded from duplicate identity.
#[test]
fn test_duplicates_ignore_reserved_attributes() {
    let mut a = sample_event();
    let mut b = sample_event();
    a.set_attr("inode", Value::Int(12));
    a.set_attr("display_name", Value::from("OS:/var/log/syslog"));
    b.set_attr("inode", Value::Int(99));
    b.set_attr("vss_store_number", Value::Int(2));
    assert!(a.is_duplicate_of(&b));
    assert_eq!(a.dedup_key(), b.dedup_key());
}

#[test]
fn test_not_duplicates_different_timestamp() {
    let a = sample_event();
    let mut b = sample_event();
    b.timestamp = Timestamp::At(1_500_000_000_000_001);
    assert!(!a.is_duplicate_of(&b));
}

#[test]
fn test_not_duplicates_different_attribute() {
    let a = sample_event();
    let mut b = sample_event();
    b.set_attr("body", Value::from("Failed password for root"));
    assert!(!a.is_duplicate_of(&b));
    assert_ne!(a.dedup_key(), b.dedup_key());
}

/// Attribute order does not affect duplicate identity.
#[test]
fn test_duplicates_attribute_order_independent() {
    let mut a = EventData::new("t", Timestamp::At(1));
    a.set_attr("x", Value::Int(1));
    a.set_attr("y", Value::Int(2));
    let mut b = EventData::new("t", Timestamp::At(1));
    b.set_attr("y", Value::Int(2));
    b.set_attr("x", Value::Int(1));
    assert!(a.is_duplicate_of(&b));
    assert_eq!(a.dedup_key(), b.dedup_key());
}

#[test]
fn test_reserved_attribute_names() {
    for name in ["inode", "pathspec", "filename", "display_name", "vss_store_number"] {
        assert!(RESERVED_ATTRIBUTES.contains(&name), "{} missing", name);
    }
}

#[test]
fn test_parse_error_display() {
    let error = crate::data::event::ParseError {
        plugin: "syslog".to_string(),
        pathspec: Some(os_pathspec("/var/log/syslog")),
        message: "invalid date".to_string(),
    };
    let rendered: String = format!("{}", error);
    assert!(rendered.contains("syslog"));
    assert!(rendered.contains("invalid date"));
}
