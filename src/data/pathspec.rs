// src/data/pathspec.rs

//! A [`PathSpec`] is an immutable, possibly-nested descriptor of a location
//! within an evidence source.
//!
//! Nesting models "file inside archive inside shadow store inside image":
//! each `PathSpec` may have a parent `PathSpec`, forming a chain from the
//! outermost location (an OS path) down to the innermost (e.g. an archive
//! member name). A `PathSpec` is created by the collector or the classifier
//! when a candidate is discovered, consumed exactly once by a worker to open
//! a file entry, and never mutated after creation.
//!
//! [`PathSpec`]: PathSpec

use std::fmt;
use std::sync::Arc;

use crate::common::FPath;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PathSpec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared-ownership `PathSpec`. Discovered path-specs travel from the
/// collector through the task queue to a worker; `Arc` avoids copying the
/// parent chain at every hop.
pub type PathSpecP = Arc<PathSpec>;

/// Discriminant of one `PathSpec` segment; what kind of location the
/// `location` field names.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TypeIndicator {
    /// A path on the host operating system filesystem.
    Os,
    /// The (single) decompressed stream of a GZIP file.
    Gzip,
    /// A member of a TAR archive, named by member path.
    Tar,
    /// A member of a ZIP archive, named by member path.
    Zip,
    /// A volume shadow snapshot of the parent volume, addressed by
    /// zero-based store index.
    VShadow,
}

impl TypeIndicator {
    /// Short lowercase name, used in display names and summaries.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TypeIndicator::Os => "OS",
            TypeIndicator::Gzip => "GZIP",
            TypeIndicator::Tar => "TAR",
            TypeIndicator::Zip => "ZIP",
            TypeIndicator::VShadow => "VSHADOW",
        }
    }
}

/// One segment of a nested location descriptor. See the [module
/// documentation].
///
/// Equality and hashing are structural across the entire parent chain.
///
/// [module documentation]: self
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathSpec {
    /// What kind of location this segment is.
    pub type_indicator: TypeIndicator,
    /// Location within the parent: an OS path for [`TypeIndicator::Os`],
    /// a member path for archive types, empty for [`TypeIndicator::Gzip`].
    pub location: FPath,
    /// Zero-based store index; only meaningful for
    /// [`TypeIndicator::VShadow`].
    pub store_index: Option<usize>,
    /// The enclosing location, if any. `None` for an outermost OS path.
    pub parent: Option<PathSpecP>,
}

impl PathSpec {
    /// Create an outermost OS-path `PathSpec`.
    pub fn from_os_path(location: FPath) -> PathSpec {
        PathSpec {
            type_indicator: TypeIndicator::Os,
            location,
            store_index: None,
            parent: None,
        }
    }

    /// Create a child `PathSpec` inside `parent`.
    pub fn child_of(
        parent: &PathSpecP,
        type_indicator: TypeIndicator,
        location: FPath,
    ) -> PathSpec {
        PathSpec {
            type_indicator,
            location,
            store_index: None,
            parent: Some(parent.clone()),
        }
    }

    /// Create a shadow-store `PathSpec` for zero-based `store_index`
    /// within `parent` (the primary volume).
    pub fn shadow_store_of(
        parent: &PathSpecP,
        store_index: usize,
    ) -> PathSpec {
        PathSpec {
            type_indicator: TypeIndicator::VShadow,
            location: FPath::new(),
            store_index: Some(store_index),
            parent: Some(parent.clone()),
        }
    }

    /// Number of segments in the chain, including this one.
    pub fn chain_len(&self) -> usize {
        let mut len: usize = 1;
        let mut parent_opt: &Option<PathSpecP> = &self.parent;
        while let Some(parent) = parent_opt {
            len += 1;
            parent_opt = &parent.parent;
        }
        len
    }

    /// The outermost segment of the chain (`self` when there is no parent).
    pub fn outermost(&self) -> &PathSpec {
        let mut cur: &PathSpec = self;
        while let Some(parent) = &cur.parent {
            cur = parent;
        }
        cur
    }

    /// Is any segment of the chain, including this one, of
    /// `type_indicator`?
    pub fn chain_contains(
        &self,
        type_indicator: TypeIndicator,
    ) -> bool {
        let mut cur: &PathSpec = self;
        loop {
            if cur.type_indicator == type_indicator {
                return true;
            }
            match &cur.parent {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Human-readable rendition of the full chain, outermost first, e.g.
    /// `OS:/var/log/sys.tgz|GZIP:|TAR:syslog.1`.
    pub fn display_name(&self) -> FPath {
        let mut segments: Vec<&PathSpec> = Vec::with_capacity(self.chain_len());
        let mut cur: &PathSpec = self;
        loop {
            segments.push(cur);
            match &cur.parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        let mut out = FPath::new();
        for (i, segment) in segments.iter().rev().enumerate() {
            if i != 0 {
                out.push('|');
            }
            out.push_str(segment.type_indicator.as_str());
            out.push(':');
            match segment.store_index {
                Some(index) => out.push_str(index.to_string().as_str()),
                None => out.push_str(segment.location.as_str()),
            }
        }
        out
    }
}

impl fmt::Display for PathSpec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
