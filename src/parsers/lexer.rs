// src/parsers/lexer.rs

//! Lexer-driven line-parser strategy: a state machine over an ordered
//! token table `(state, regex, action, next_state)`. Each step consumes
//! the longest-matching prefix of the remaining input, applies the
//! token's action to an attribute accumulator, and transitions state;
//! a line is complete when an emitting token fires.
//!
//! Verification is implicit and incremental: an error counter rejects
//! the whole file once `2 * MAX_LINES` lexer errors accumulate before
//! any line has parsed successfully; after the first success, per-line
//! failures are logged and skipped. Strict before first success avoids
//! wasting work on the wrong format; lenient after tolerates isolated
//! corruption.

use ::regex::Regex;
use ::si_trace_print::{defn, defo, defx};

use crate::data::datetime::{month_from_name, Month, Year, YearTracker};
use crate::data::event::{EventData, ParseError};
use crate::parsers::{ParseContext, ParseOutput, MAX_LINES};

/// The machine's start state, re-entered at every line boundary.
pub const STATE_INITIAL: &str = "INITIAL";

/// What a matched token contributes to the line accumulator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenAction {
    SetYear,
    /// Month as an English name or abbreviation.
    SetMonthName,
    /// Month as a two-digit ordinal.
    SetMonthDigits,
    SetDay,
    /// `HH:MM:SS` clock time.
    SetTime,
    SetHostname,
    SetReporter,
    AppendBody,
    /// Terminal: the accumulated line is ready to become an event.
    EmitLine,
    /// Consume without contributing (separators).
    Ignore,
}

/// One row of the token table. The regex must be `^`-anchored; a token
/// only matches at the current input position.
pub struct LexToken {
    pub state: &'static str,
    pub regex: Regex,
    pub action: TokenAction,
    pub next_state: &'static str,
}

impl LexToken {
    pub fn new(
        state: &'static str,
        pattern: &str,
        action: TokenAction,
        next_state: &'static str,
    ) -> LexToken {
        debug_assert!(pattern.starts_with('^'));
        LexToken {
            state,
            // patterns are compile-time constants of the format
            regex: Regex::new(pattern).unwrap(),
            action,
            next_state,
        }
    }
}

/// Attribute accumulator for the line being lexed.
#[derive(Clone, Debug, Default)]
pub struct LineAccumulator {
    pub year: Option<Year>,
    pub month: Option<Month>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub hostname: Option<String>,
    pub reporter: Option<String>,
    pub body: String,
}

impl LineAccumulator {
    fn clear(&mut self) {
        *self = LineAccumulator::default();
    }
}

/// A lexer-driven log format: its token table and how an accumulated
/// line becomes an event.
pub trait LexerFormat: Send + Sync {
    fn name(&self) -> &'static str;
    fn tokens(&self) -> &[LexToken];
    fn initial_year(
        &self,
        context: &ParseContext,
    ) -> YearTracker;
    /// Build one event from a completed line. An `Err` means the
    /// accumulated time elements did not form a valid instant.
    fn build_event(
        &self,
        context: &ParseContext,
        accumulator: &LineAccumulator,
        year: &mut YearTracker,
    ) -> Result<EventData, String>;
}

/// The strategy engine: generic over one [`LexerFormat`].
///
/// [`LexerFormat`]: LexerFormat
pub struct LexerParser<F: LexerFormat> {
    format: F,
}

impl<F: LexerFormat> LexerParser<F> {
    pub fn new(format: F) -> LexerParser<F> {
        LexerParser { format }
    }

    /// Run the machine until the first successful line or the rejection
    /// budget; acceptance is "some line parsed before the budget".
    pub fn check_required_format(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> bool {
        defn!("({:?})", self.format.name());
        let (output, rejected) = self.run(context, content, true);
        let accepted: bool = !rejected && !output.events.is_empty();
        defx!("return {}", accepted);
        accepted
    }

    pub fn parse(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> ParseOutput {
        defn!("({:?}, {} bytes)", self.format.name(), content.len());
        let (mut output, rejected) = self.run(context, content, false);
        if rejected {
            output.errors.push(ParseError {
                plugin: self.format.name().to_string(),
                pathspec: Some(context.pathspec.clone()),
                message: format!(
                    "unable to parse; {} lexer errors before any successful line",
                    MAX_LINES * 2,
                ),
            });
        }
        defx!("{} events, {} skipped", output.events.len(), output.skipped);
        output
    }

    /// The machine proper. Returns the output plus whether the file was
    /// rejected (error budget exhausted before any success).
    fn run(
        &self,
        context: &ParseContext,
        content: &[u8],
        stop_after_first: bool,
    ) -> (ParseOutput, bool) {
        let text: String = String::from_utf8_lossy(content).into_owned();
        let mut output: ParseOutput = ParseOutput::new();
        let mut year: YearTracker = self.format.initial_year(context);
        let mut accumulator: LineAccumulator = LineAccumulator::default();
        let mut state: &'static str = STATE_INITIAL;
        let mut verified: bool = false;
        let mut error_count: usize = 0;
        let mut pos: usize = 0;
        while pos < text.len() {
            let rest: &str = &text[pos..];
            let token_match: Option<(usize, &LexToken)> = self.next_token(state, rest);
            let (consumed, token) = match token_match {
                Some(val) => val,
                None => {
                    error_count += 1;
                    if !verified && error_count >= MAX_LINES * 2 {
                        defo!("error budget exhausted before first success; reject");
                        return (output, true);
                    }
                    // resynchronize to the next line boundary
                    pos = advance_one_line(&text, pos);
                    state = STATE_INITIAL;
                    accumulator.clear();
                    output.skipped += 1;
                    continue;
                }
            };
            match token.action {
                TokenAction::EmitLine => {
                    match self.format.build_event(context, &accumulator, &mut year) {
                        Ok(event) => {
                            output.events.push(event);
                            verified = true;
                            if stop_after_first {
                                return (output, false);
                            }
                        }
                        Err(message) => {
                            defo!("timestamp formation failed: {}", message);
                            error_count += 1;
                            if !verified && error_count >= MAX_LINES * 2 {
                                defo!("error budget exhausted before first success; reject");
                                return (output, true);
                            }
                            output.errors.push(ParseError {
                                plugin: self.format.name().to_string(),
                                pathspec: Some(context.pathspec.clone()),
                                message,
                            });
                            output.skipped += 1;
                        }
                    }
                    accumulator.clear();
                }
                action => {
                    if let Err(message) = apply_action(action, &mut accumulator, &rest[..consumed])
                    {
                        defo!("token action failed: {}", message);
                    }
                }
            }
            state = token.next_state;
            pos += consumed;
        }
        // content without a trailing newline: emit what accumulated
        if accumulator.hour.is_some() {
            match self.format.build_event(context, &accumulator, &mut year) {
                Ok(event) => output.events.push(event),
                Err(_message) => {
                    defo!("trailing line failed: {}", _message);
                    output.skipped += 1;
                }
            }
        }
        (output, false)
    }

    /// The longest-matching token for `state` at the start of `rest`
    /// (earliest table row on ties).
    fn next_token<'t>(
        &'t self,
        state: &'static str,
        rest: &str,
    ) -> Option<(usize, &'t LexToken)> {
        let mut best: Option<(usize, &LexToken)> = None;
        for token in self.format.tokens().iter() {
            if token.state != state {
                continue;
            }
            let matched = match token.regex.find(rest) {
                Some(val) if val.start() == 0 && !val.is_empty() => val,
                _ => continue,
            };
            match best {
                Some((best_len, _)) if matched.end() <= best_len => {}
                _ => best = Some((matched.end(), token)),
            }
        }
        best
    }
}

/// Apply a non-terminal token action to the accumulator.
fn apply_action(
    action: TokenAction,
    accumulator: &mut LineAccumulator,
    matched: &str,
) -> Result<(), String> {
    let matched: &str = matched.trim();
    match action {
        TokenAction::SetYear => {
            accumulator.year = Some(
                matched
                    .parse::<Year>()
                    .map_err(|err| format!("bad year {:?}: {}", matched, err))?,
            );
        }
        TokenAction::SetMonthName => {
            accumulator.month =
                Some(month_from_name(matched).ok_or_else(|| format!("bad month {:?}", matched))?);
        }
        TokenAction::SetMonthDigits => {
            accumulator.month = Some(
                matched
                    .parse::<Month>()
                    .map_err(|err| format!("bad month {:?}: {}", matched, err))?,
            );
        }
        TokenAction::SetDay => {
            accumulator.day = Some(
                matched
                    .parse::<u32>()
                    .map_err(|err| format!("bad day {:?}: {}", matched, err))?,
            );
        }
        TokenAction::SetTime => {
            let mut parts = matched.split(':');
            let hour: &str = parts.next().unwrap_or("");
            let minute: &str = parts.next().unwrap_or("");
            let second: &str = parts.next().unwrap_or("");
            accumulator.hour =
                Some(hour.parse::<u32>().map_err(|_| format!("bad time {:?}", matched))?);
            accumulator.minute =
                Some(minute.parse::<u32>().map_err(|_| format!("bad time {:?}", matched))?);
            accumulator.second =
                Some(second.parse::<u32>().map_err(|_| format!("bad time {:?}", matched))?);
        }
        TokenAction::SetHostname => {
            accumulator.hostname = Some(matched.to_string());
        }
        TokenAction::SetReporter => {
            accumulator.reporter = Some(matched.to_string());
        }
        TokenAction::AppendBody => {
            if !accumulator.body.is_empty() {
                accumulator.body.push(' ');
            }
            accumulator.body.push_str(matched);
        }
        TokenAction::EmitLine | TokenAction::Ignore => {}
    }
    Ok(())
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
