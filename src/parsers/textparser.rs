// src/parsers/textparser.rs

//! Single-line declarative-grammar strategy: an ordered list of
//! `(key, grammar)` pairs tried against each physical line in priority
//! order, first whole-line match wins.
//!
//! Verification runs once against the first line only, and the matched
//! line's time elements must also parse; a grammar that matches the text
//! shape but yields an unparseable date is a verification failure, not a
//! parse-time skip, because dates are required to trust the file type.

use ::memchr::memchr;
use ::regex::{Captures, Regex};
use ::si_trace_print::{defn, defo, defx};

use crate::common::{MAX_LINE_SZ, NLu8};
use crate::data::datetime::YearTracker;
use crate::data::event::{EventData, ParseError};
use crate::parsers::{ParseContext, ParseOutput};

/// One `(key, grammar)` pair; the key names the record shape for
/// `parse_record` dispatch.
pub struct LineGrammar {
    pub key: &'static str,
    pub regex: Regex,
}

impl LineGrammar {
    pub fn new(
        key: &'static str,
        pattern: &str,
    ) -> LineGrammar {
        // grammars must match the entire line
        debug_assert!(pattern.starts_with('^') && pattern.ends_with('$'));
        LineGrammar {
            key,
            // patterns are compile-time constants of the format
            regex: Regex::new(pattern).unwrap(),
        }
    }
}

/// A single-line log format: its grammars and how a matched line becomes
/// an event.
pub trait SingleLineFormat: Send + Sync {
    fn name(&self) -> &'static str;
    /// Grammars in priority order.
    fn grammars(&self) -> &[LineGrammar];
    /// Year-inference seed for this file (formats with in-band years can
    /// return any value; it will be unused).
    fn initial_year(
        &self,
        context: &ParseContext,
    ) -> YearTracker;
    /// Build one event from a matched line. An `Err` means the line's
    /// time elements did not form a valid instant.
    fn parse_record(
        &self,
        context: &ParseContext,
        key: &'static str,
        captures: &Captures,
        year: &mut YearTracker,
    ) -> Result<EventData, String>;
}

/// The strategy engine: generic over one [`SingleLineFormat`].
///
/// [`SingleLineFormat`]: SingleLineFormat
pub struct SingleLineParser<F: SingleLineFormat> {
    format: F,
}

impl<F: SingleLineFormat> SingleLineParser<F> {
    pub fn new(format: F) -> SingleLineParser<F> {
        SingleLineParser { format }
    }

    /// Verify against the first line only: some grammar must match the
    /// entire line and that line's time elements must parse.
    pub fn check_required_format(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> bool {
        defn!("({:?})", self.format.name());
        let line: &str = match first_line(content) {
            Some(val) => val,
            None => {
                defx!("no decodable first line; reject");
                return false;
            }
        };
        let mut year: YearTracker = self.format.initial_year(context);
        for grammar in self.format.grammars().iter() {
            let captures: Captures = match grammar.regex.captures(line) {
                Some(val) => val,
                None => continue,
            };
            match self.format.parse_record(context, grammar.key, &captures, &mut year) {
                Ok(_) => {
                    defx!("grammar {:?} verified", grammar.key);
                    return true;
                }
                Err(_err) => {
                    // shape matched but the date did not
                    defo!("grammar {:?} matched but time elements failed: {}", grammar.key, _err);
                }
            }
        }
        defx!("no grammar verified; reject");
        false
    }

    pub fn parse(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> ParseOutput {
        defn!("({:?}, {} bytes)", self.format.name(), content.len());
        let mut output: ParseOutput = ParseOutput::new();
        let mut year: YearTracker = self.format.initial_year(context);
        let mut offset: usize = 0;
        while offset < content.len() {
            let line_end: usize = match memchr(NLu8, &content[offset..]) {
                Some(val) => offset + val,
                None => content.len(),
            };
            let line_bytes: &[u8] = &content[offset..line_end];
            offset = line_end + 1;
            if line_bytes.len() >= MAX_LINE_SZ {
                // bounded memory on pathological input; diagnostic only
                defo!("line of {} bytes reaches the line-length cap", line_bytes.len());
            }
            let line: &str = match std::str::from_utf8(line_bytes) {
                Ok(val) => val.trim_end_matches('\r'),
                Err(_err) => {
                    defo!("undecodable line skipped");
                    output.skipped += 1;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match self.parse_line(context, line, &mut year) {
                Some(Ok(event)) => output.events.push(event),
                Some(Err(message)) => {
                    // the record is bad, the file is not
                    defo!("record failed: {}", message);
                    output.errors.push(ParseError {
                        plugin: self.format.name().to_string(),
                        pathspec: Some(context.pathspec.clone()),
                        message,
                    });
                    output.skipped += 1;
                }
                None => {
                    defo!("no grammar matched line; skipped");
                    output.skipped += 1;
                }
            }
        }
        defx!("{} events, {} skipped", output.events.len(), output.skipped);
        output
    }

    /// Try each grammar in priority order until one matches the entire
    /// line. `None` when no grammar matches.
    fn parse_line(
        &self,
        context: &ParseContext,
        line: &str,
        year: &mut YearTracker,
    ) -> Option<Result<EventData, String>> {
        for grammar in self.format.grammars().iter() {
            if let Some(captures) = grammar.regex.captures(line) {
                return Some(self.format.parse_record(context, grammar.key, &captures, year));
            }
        }
        None
    }
}

/// The first `\n`-terminated (or only) line of `content` as UTF-8.
fn first_line(content: &[u8]) -> Option<&str> {
    let end: usize = match memchr(NLu8, content) {
        Some(val) => val,
        None => content.len(),
    };
    match std::str::from_utf8(&content[..end]) {
        Ok(line) => Some(line.trim_end_matches('\r')),
        Err(_) => None,
    }
}
