// src/parsers/mod.rs

//! The grammar engine and its format plugins.
//!
//! Three parser strategies, each implementing the same
//! verify → parse-record → produce-event contract:
//!
//! * [`textparser`]: single-line declarative grammars, one physical line
//!   at a time.
//! * [`multiline`]: buffered declarative grammars for logical records
//!   spanning physical lines.
//! * [`lexer`]: a token state machine with incremental verification for
//!   formats too irregular for one grammar per line.
//!
//! Concrete formats ([`syslog`], [`apt_history`], [`dpkg`]) wrap one of
//! the strategies. The registry is an explicit ordered list built by
//! [`build_registry`]; there is no self-registration side table.
//!
//! [`textparser`]: crate::parsers::textparser
//! [`multiline`]: crate::parsers::multiline
//! [`lexer`]: crate::parsers::lexer
//! [`syslog`]: crate::parsers::syslog
//! [`apt_history`]: crate::parsers::apt_history
//! [`dpkg`]: crate::parsers::dpkg
//! [`build_registry`]: build_registry

pub mod apt_history;
pub mod dpkg;
pub mod lexer;
pub mod multiline;
pub mod syslog;
pub mod textparser;

use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::Count;
use crate::data::event::{EventData, ParseError};
use crate::data::pathspec::PathSpecP;
use crate::engine::knowledge::KnowledgeBase;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parser contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Most records a strategy considers when deciding whether a file is of
/// its format. Also sets the lexer strategy's rejection budget,
/// `2 * MAX_LINES` errors before the first successful line.
pub const MAX_LINES: usize = 15;

/// Read-only context handed to every parser call.
pub struct ParseContext<'a> {
    pub knowledge: &'a KnowledgeBase,
    pub pathspec: &'a PathSpecP,
}

/// Accumulated output of parsing one file.
#[derive(Default)]
pub struct ParseOutput {
    pub events: Vec<EventData>,
    pub errors: Vec<ParseError>,
    /// Physical lines (or records) skipped as unparseable.
    pub skipped: Count,
}

impl ParseOutput {
    pub fn new() -> ParseOutput {
        ParseOutput::default()
    }
}

/// One registered format parser. Strategy-agnostic: the worker only sees
/// this contract.
pub trait ParserPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    /// The `data_type` discriminant of events this parser produces.
    fn data_type(&self) -> &'static str;
    /// Is `content` of this parser's format? Must be side-effect-free
    /// with respect to emitted events: the driver calls this across the
    /// whole registry before committing to a winner.
    fn check_required_format(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> bool;
    /// Parse the whole file content. Only called after
    /// `check_required_format` accepted.
    fn parse(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> ParseOutput;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type ParserRegistry = Vec<Box<dyn ParserPlugin>>;

/// Named preset groups accepted by [`select_parsers`].
///
/// [`select_parsers`]: select_parsers
const PRESETS: [(&str, &[&str]); 1] = [("linux", &["syslog", "apt_history", "dpkg"])];

/// Build the full parser registry. The order here is the deterministic
/// verification priority: when multiple verifiers could accept a file,
/// the earliest entry wins.
pub fn build_registry() -> ParserRegistry {
    defñ!();
    vec![
        Box::new(apt_history::AptHistoryParser::new()),
        Box::new(dpkg::DpkgParser::new()),
        Box::new(syslog::SyslogParser::new()),
    ]
}

/// Select a subset of `registry` by a textual filter expression:
/// comma-separated entries, each an exact name, a `*` glob, or a preset
/// name; a `-` prefix excludes. An empty/absent expression selects all.
pub fn select_parsers(
    registry: ParserRegistry,
    filter_expression: Option<&str>,
) -> ParserRegistry {
    let expression: &str = match filter_expression {
        Some(val) if !val.trim().is_empty() => val,
        _ => return registry,
    };
    defn!("({:?})", expression);
    let mut includes: Vec<String> = Vec::new();
    let mut excludes: Vec<String> = Vec::new();
    for entry in expression.split(',') {
        let entry: &str = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (exclude, pattern) = match entry.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, entry),
        };
        // a preset expands to its member names
        let expanded: Vec<String> = match PRESETS
            .iter()
            .find(|(preset, _)| *preset == pattern)
        {
            Some((_, members)) => members.iter().map(|name| name.to_string()).collect(),
            None => vec![pattern.to_string()],
        };
        match exclude {
            true => excludes.extend(expanded),
            false => includes.extend(expanded),
        }
    }
    let selected: ParserRegistry = registry
        .into_iter()
        .filter(|parser| {
            let name: &str = parser.name();
            if excludes.iter().any(|pattern| glob_match(pattern, name)) {
                return false;
            }
            includes.is_empty() || includes.iter().any(|pattern| glob_match(pattern, name))
        })
        .collect();
    defx!("selected {} parsers", selected.len());
    selected
}

/// Minimal glob: `*` matches any run of characters; everything else is
/// literal.
fn glob_match(
    pattern: &str,
    name: &str,
) -> bool {
    fn match_at(
        pattern: &[u8],
        name: &[u8],
    ) -> bool {
        match pattern.first() {
            None => name.is_empty(),
            Some(b'*') => {
                (0..=name.len()).any(|skip| match_at(&pattern[1..], &name[skip..]))
            }
            Some(ch) => name.first() == Some(ch) && match_at(&pattern[1..], &name[1..]),
        }
    }
    match_at(pattern.as_bytes(), name.as_bytes())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Try every registered verifier in registry order; on the first
/// acceptance, parse with that parser. Returns `None` when no verifier
/// accepts; the file is then reported as unparsed, which is not an error
/// since most files are simply not of interest to most parsers.
pub fn parse_with_registry(
    registry: &ParserRegistry,
    context: &ParseContext,
    content: &[u8],
) -> Option<(&'static str, ParseOutput)> {
    defn!("({})", context.pathspec);
    for parser in registry.iter() {
        if !parser.check_required_format(context, content) {
            continue;
        }
        defo!("parser {:?} accepted", parser.name());
        let output: ParseOutput = parser.parse(context, content);
        defx!(
            "parser {:?}: {} events, {} errors, {} skipped",
            parser.name(), output.events.len(), output.errors.len(), output.skipped,
        );
        return Some((parser.name(), output));
    }
    defx!("no parser accepted");
    None
}
