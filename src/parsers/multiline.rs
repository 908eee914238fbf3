// src/parsers/multiline.rs

//! Multi-line buffered declarative-grammar strategy, for formats whose
//! logical records span physical lines (continuation-style blocks).
//!
//! The engine maintains a growing window over the decoded content,
//! refilled in fixed-size chunks. A grammar match is accepted only when
//! it starts at offset 0 of the window; on acceptance the window
//! advances past the matched span. With no zero-offset match and no more
//! content to grow into, the window advances past one physical line
//! (diagnostic, not fatal). The cost of this strategy is that a corrupt
//! line can only be skipped one physical line at a time rather than one
//! logical record at a time.

use ::encoding_rs::Encoding;
use ::regex::{Captures, Match, Regex};
use ::si_trace_print::{defn, defo, defx};

use crate::data::event::{EventData, ParseError};
use crate::parsers::{ParseContext, ParseOutput};

/// Window refill increment, in bytes of decoded text.
pub const CHUNK_SZ: usize = 4096;

/// One `(key, grammar)` pair whose regex may span physical lines.
pub struct RecordGrammar {
    pub key: &'static str,
    pub regex: Regex,
}

impl RecordGrammar {
    pub fn new(
        key: &'static str,
        pattern: &str,
    ) -> RecordGrammar {
        RecordGrammar {
            key,
            // patterns are compile-time constants of the format
            regex: Regex::new(pattern).unwrap(),
        }
    }
}

/// A multi-line log format: its record grammars, an optional declared
/// text encoding, and how a matched record becomes an event.
pub trait MultiLineFormat: Send + Sync {
    fn name(&self) -> &'static str;
    /// Declared text encoding label (for [`encoding_rs`]); `None` means
    /// UTF-8.
    ///
    /// [`encoding_rs`]: ::encoding_rs
    fn encoding(&self) -> Option<&'static str> {
        None
    }
    /// Grammars in priority order.
    fn grammars(&self) -> &[RecordGrammar];
    /// Build one event from a matched record.
    fn parse_record(
        &self,
        context: &ParseContext,
        key: &'static str,
        captures: &Captures,
    ) -> Result<EventData, String>;
}

/// The strategy engine: generic over one [`MultiLineFormat`].
///
/// [`MultiLineFormat`]: MultiLineFormat
pub struct MultiLineParser<F: MultiLineFormat> {
    format: F,
}

impl<F: MultiLineFormat> MultiLineParser<F> {
    pub fn new(format: F) -> MultiLineParser<F> {
        MultiLineParser { format }
    }

    /// Decode `content` as a unit per the format's declared encoding.
    fn decode(
        &self,
        content: &[u8],
    ) -> String {
        match self.format.encoding() {
            Some(label) => match Encoding::for_label(label.as_bytes()) {
                Some(encoding) => {
                    let (decoded, _, _) = encoding.decode(content);
                    decoded.into_owned()
                }
                None => {
                    defo!("unknown encoding label {:?}; falling back to UTF-8", label);
                    String::from_utf8_lossy(content).into_owned()
                }
            },
            None => String::from_utf8_lossy(content).into_owned(),
        }
    }

    /// Verify: the content must begin with a complete record (a grammar
    /// match at offset 0 whose record parses).
    pub fn check_required_format(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> bool {
        defn!("({:?})", self.format.name());
        let decoded: String = self.decode(content);
        for grammar in self.format.grammars().iter() {
            let captures: Captures = match grammar.regex.captures(decoded.as_str()) {
                Some(val) => val,
                None => continue,
            };
            if captures.get(0).map(|m| m.start()) != Some(0) {
                continue;
            }
            if self.format.parse_record(context, grammar.key, &captures).is_ok() {
                defx!("grammar {:?} verified", grammar.key);
                return true;
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
        let decoded: String = self.decode(content);
        let mut pos: usize = 0;
        let mut window_end: usize = char_boundary_at(&decoded, CHUNK_SZ);
        while pos < decoded.len() {
            let window: &str = &decoded[pos..window_end];
            match self.match_window(window) {
                Some((key, span_end)) => {
                    let captures: Captures = self
                        .grammar_by_key(key)
                        .regex
                        .captures(window)
                        .unwrap();
                    match self.format.parse_record(context, key, &captures) {
                        Ok(event) => {
                            output.events.push(event);
                            pos += span_end;
                        }
                        Err(message) => {
                            // resynchronize to the next line boundary
                            defo!("record failed: {}", message);
                            output.errors.push(ParseError {
                                plugin: self.format.name().to_string(),
                                pathspec: Some(context.pathspec.clone()),
                                message,
                            });
                            pos = advance_one_line(&decoded, pos);
                            output.skipped += 1;
                        }
                    }
                }
                None => {
                    if window_end < decoded.len() {
                        // the record may extend beyond the window; refill
                        window_end = char_boundary_at(&decoded, window_end + CHUNK_SZ);
                        continue;
                    }
                    defo!("no zero-offset match; advancing one line");
                    pos = advance_one_line(&decoded, pos);
                    output.skipped += 1;
                }
            }
            if window_end < pos {
                window_end = char_boundary_at(&decoded, pos + CHUNK_SZ);
            }
            if window_end < decoded.len() && window_end - pos < CHUNK_SZ {
                window_end = char_boundary_at(&decoded, pos + CHUNK_SZ);
            }
        }
        defx!("{} events, {} skipped", output.events.len(), output.skipped);
        output
    }

    /// Scan the window for the first grammar match anywhere, but accept
    /// only a match starting at offset 0. Returns the matched key and the
    /// span end.
    fn match_window(
        &self,
        window: &str,
    ) -> Option<(&'static str, usize)> {
        for grammar in self.format.grammars().iter() {
            let matched: Match = match grammar.regex.find(window) {
                Some(val) => val,
                None => continue,
            };
            if matched.start() != 0 {
                continue;
            }
            return Some((grammar.key, matched.end()));
        }
        None
    }

    fn grammar_by_key(
        &self,
        key: &'static str,
    ) -> &RecordGrammar {
        self.format
            .grammars()
            .iter()
            .find(|grammar| grammar.key == key)
            .unwrap()
    }
}

/// The smallest char boundary at or after `at`, capped to the string
/// length.
fn char_boundary_at(
    text: &str,
    at: usize,
) -> usize {
    let mut at: usize = at.min(text.len());
    while !text.is_char_boundary(at) {
        at += 1;
    }
    at
}

/// Position just past the next `\n` at or after `pos` (end of text when
/// there is none).
fn advance_one_line(
    text: &str,
    pos: usize,
) -> usize {
    match text[pos..].find('\n') {
        Some(offset) => pos + offset + 1,
        None => text.len(),
    }
}
