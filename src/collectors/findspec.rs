// src/collectors/findspec.rs

//! [`FindSpec`]s: compiled path filters used to prune a collector walk.
//!
//! A filter file holds one absolute-path-style pattern per line; each
//! pattern is split on `/` into per-segment matchers compiled as
//! case-insensitive regular expressions. `#`-prefixed comment lines are
//! ignored. Malformed lines are logged and skipped; loading never fails
//! because of one bad pattern.
//!
//! [`FindSpec`]: FindSpec

use std::io::{BufReader, Error, ErrorKind, Result};

use ::regex::{Regex, RegexBuilder};
use ::si_trace_print::{defn, defo, defx};

use crate::common::FPath;
use crate::de_wrn;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FindSpec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type FindSpecs = Vec<FindSpec>;

/// One compiled path filter: an ordered list of path-segment matchers.
/// Built once, immutable, shared read-only across a walk.
#[derive(Clone, Debug)]
pub struct FindSpec {
    /// The source pattern, for diagnostics.
    pub pattern: FPath,
    segment_matchers: Vec<Regex>,
}

impl FindSpec {
    /// Compile one pattern line. Fails if any segment is not a valid
    /// regular expression.
    pub fn compile(pattern: &str) -> Result<FindSpec> {
        defn!("({:?})", pattern);
        let trimmed: &str = pattern.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty pattern"));
        }
        let mut segment_matchers: Vec<Regex> = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("empty path segment in pattern {:?}", pattern),
                ));
            }
            // anchor each segment matcher to the whole segment
            let anchored: String = format!("^(?:{})$", segment);
            let re: Regex = RegexBuilder::new(anchored.as_str())
                .case_insensitive(true)
                .build()
                .map_err(|err| Error::new(ErrorKind::InvalidInput, err.to_string()))?;
            segment_matchers.push(re);
        }
        defx!("compiled {} segment matchers", segment_matchers.len());
        Ok(FindSpec {
            pattern: pattern.to_string(),
            segment_matchers,
        })
    }

    /// Does a path, split into `segments` relative to the walk root,
    /// match this spec? Every segment matcher must match its
    /// corresponding path segment and the segment counts must agree.
    pub fn matches(
        &self,
        segments: &[&str],
    ) -> bool {
        if segments.len() != self.segment_matchers.len() {
            return false;
        }
        self.segment_matchers
            .iter()
            .zip(segments.iter())
            .all(|(matcher, segment)| matcher.is_match(segment))
    }

    /// Could a directory at `segments` (relative to the walk root) still
    /// lead to a match? Used to prune subtrees during the walk.
    pub fn matches_prefix(
        &self,
        segments: &[&str],
    ) -> bool {
        if segments.len() >= self.segment_matchers.len() {
            return false;
        }
        self.segment_matchers
            .iter()
            .zip(segments.iter())
            .all(|(matcher, segment)| matcher.is_match(segment))
    }
}

/// Load and compile all patterns from filter-file content.
/// Malformed lines are logged and skipped.
pub fn compile_filter_lines(content: &str) -> FindSpecs {
    defn!();
    let mut specs: FindSpecs = FindSpecs::new();
    for (_lineno, line) in content.lines().enumerate() {
        let trimmed: &str = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match FindSpec::compile(trimmed) {
            Ok(spec) => {
                defo!("compiled {:?}", trimmed);
                specs.push(spec);
            }
            Err(_err) => {
                de_wrn!("skipping malformed filter line {}: {:?} ({})", _lineno + 1, trimmed, _err);
            }
        }
    }
    defx!("return {} find specs", specs.len());
    specs
}

/// Load and compile a filter file at `path`.
/// A missing or unreadable file is a configuration error; malformed lines
/// within a readable file are not.
pub fn load_filter_file(path: &FPath) -> Result<FindSpecs> {
    defn!("({:?})", path);
    let file = std::fs::File::open(path)?;
    let mut content = String::new();
    let mut reader = BufReader::new(file);
    std::io::Read::read_to_string(&mut reader, &mut content)?;
    let specs: FindSpecs = compile_filter_lines(content.as_str());
    defx!("return {} find specs", specs.len());
    Ok(specs)
}
