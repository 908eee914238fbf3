// src/data/event.rs

//! The normalized output records of the engine: [`EventData`] and
//! [`ParseError`].
//!
//! An `EventData` is created by a format plugin during extraction,
//! enriched by the worker's mediator (hostname, display name, inode),
//! and immutable thereafter. Attribute values use the closed [`Value`]
//! sum type; there are no dynamically-typed attributes.
//!
//! [`EventData`]: EventData
//! [`ParseError`]: ParseError

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::common::FPath;
use crate::data::datetime::EpochMicros;
use crate::data::pathspec::PathSpecP;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Value
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Closed sum type of event attribute values.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    /// A datetime value distinct from the event's own timestamp,
    /// e.g. an expiry time carried inside a record.
    DateTime(EpochMicros),
    List(Vec<Value>),
    /// An open-ended format-specific key/value dump. Ordered; ordering is
    /// the order the format presented the keys.
    Map(Vec<(String, Value)>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(us) => write!(f, "@{}", us),
            Value::List(vals) => {
                write!(f, "[")?;
                for (i, val) in vals.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, val)) in entries.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventData
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Timestamp of an event record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Timestamp {
    /// Sentinel for records whose timestamp could not be resolved to an
    /// absolute instant yet (e.g. placeholder expansion still pending).
    NotYetResolved,
    /// Resolved instant, microseconds since the Unix epoch.
    At(EpochMicros),
}

/// Attributes that identify *where* a record was found, not *what* it
/// records. Excluded from the duplicate-merge identity so the same logical
/// record recovered from two shadow snapshots compares equal.
pub const RESERVED_ATTRIBUTES: [&str; 7] = [
    "inode",
    "pathspec",
    "filename",
    "display_name",
    "vss_store_number",
    "tag",
    "uuid",
];

/// One normalized event record. See the [module documentation].
///
/// [module documentation]: self
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventData {
    /// Discriminant tag naming the record shape, e.g. `"syslog:line"`.
    pub data_type: String,
    pub timestamp: Timestamp,
    /// Ordered named attributes.
    attributes: Vec<(String, Value)>,
}

impl EventData {
    pub fn new(
        data_type: &str,
        timestamp: Timestamp,
    ) -> EventData {
        EventData {
            data_type: data_type.to_string(),
            timestamp,
            attributes: Vec::new(),
        }
    }

    /// Set attribute `name` to `value`, replacing any prior value of the
    /// same name.
    pub fn set_attr(
        &mut self,
        name: &str,
        value: Value,
    ) {
        for (name_, value_) in self.attributes.iter_mut() {
            if name_ == name {
                *value_ = value;
                return;
            }
        }
        self.attributes.push((name.to_string(), value));
    }

    /// The value of attribute `name`, if set.
    pub fn attr(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(name_, _)| name_ == name)
            .map(|(_, value)| value)
    }

    /// All attributes in insertion order.
    pub fn attributes(&self) -> &[(String, Value)] {
        &self.attributes
    }

    /// Are `self` and `other` duplicates eligible for merging?
    ///
    /// Duplicates have the same `data_type`, the same `timestamp`, and
    /// equal attribute sets excluding [`RESERVED_ATTRIBUTES`]. Attribute
    /// order does not matter.
    pub fn is_duplicate_of(
        &self,
        other: &EventData,
    ) -> bool {
        if self.data_type != other.data_type || self.timestamp != other.timestamp {
            return false;
        }
        self.dedup_key() == other.dedup_key()
    }

    /// Grouping key for downstream deduplication: a hash over
    /// `data_type`, `timestamp`, and the name-sorted non-reserved
    /// attributes. Cross-file output order is not guaranteed, so merging
    /// must key on this value explicitly rather than assume adjacency.
    pub fn dedup_key(&self) -> u64 {
        let mut attrs: Vec<&(String, Value)> = self
            .attributes
            .iter()
            .filter(|(name, _)| !RESERVED_ATTRIBUTES.contains(&name.as_str()))
            .collect();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut hasher = DefaultHasher::new();
        self.data_type.hash(&mut hasher);
        self.timestamp.hash(&mut hasher);
        for (name, value) in attrs.into_iter() {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ParseError
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An error record produced when a plugin fails on a file. Pushed onto the
/// result queue alongside event records; a failing plugin never terminates
/// a worker.
#[derive(Clone, Debug)]
pub struct ParseError {
    /// Name of the plugin that raised the failure.
    pub plugin: FPath,
    pub pathspec: Option<PathSpecP>,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match &self.pathspec {
            Some(pathspec) => {
                write!(f, "plugin {} failed on {}: {}", self.plugin, pathspec, self.message)
            }
            None => write!(f, "plugin {} failed: {}", self.plugin, self.message),
        }
    }
}

/// One record on the result queue: a normalized event or a parse error.
#[derive(Clone, Debug)]
pub enum ExtractionRecord {
    Event(EventData),
    Error(ParseError),
}
