// src/parsers/dpkg.rs

//! Debian package manager log (`/var/log/dpkg.log`), e.g.
//!
//! ```text
//! 2016-08-03 15:25:53 install base-passwd:amd64 <none> 3.5.39
//! ```
//!
//! Fully-dated single lines with a free-form action tail; parsed with
//! the lexer-driven strategy.

use crate::data::datetime::{datetime_from_ymd_hms, datetime_to_micros, YearTracker, FIXEDOFFSET0};
use crate::data::event::{EventData, Timestamp, Value};
use crate::parsers::lexer::{
    LexToken,
    LexerFormat,
    LexerParser,
    LineAccumulator,
    TokenAction,
    STATE_INITIAL,
};
use crate::parsers::{ParseContext, ParseOutput, ParserPlugin};

const DATA_TYPE: &str = "linux:dpkg:line";

struct DpkgFormat {
    tokens: Vec<LexToken>,
}

impl DpkgFormat {
    fn new() -> DpkgFormat {
        DpkgFormat {
            tokens: vec![
                LexToken::new(STATE_INITIAL, r"^\d{4}", TokenAction::SetYear, "YEAR"),
                LexToken::new("YEAR", r"^-", TokenAction::Ignore, "MONTH"),
                LexToken::new("MONTH", r"^\d{2}", TokenAction::SetMonthDigits, "MONTH_END"),
                LexToken::new("MONTH_END", r"^-", TokenAction::Ignore, "DAY"),
                LexToken::new("DAY", r"^\d{2}", TokenAction::SetDay, "DAY_END"),
                LexToken::new("DAY_END", r"^ ", TokenAction::Ignore, "TIME"),
                LexToken::new("TIME", r"^\d{2}:\d{2}:\d{2}", TokenAction::SetTime, "BODY"),
                LexToken::new("BODY", r"^[ \t]+[^\n]+", TokenAction::AppendBody, "BODY"),
                LexToken::new("BODY", r"^\n", TokenAction::EmitLine, STATE_INITIAL),
            ],
        }
    }
}

impl LexerFormat for DpkgFormat {
    fn name(&self) -> &'static str {
        "dpkg"
    }

    fn tokens(&self) -> &[LexToken] {
        &self.tokens
    }

    fn initial_year(
        &self,
        _context: &ParseContext,
    ) -> YearTracker {
        // every line carries a full year; the tracker is never consulted
        YearTracker::new(0)
    }

    fn build_event(
        &self,
        _context: &ParseContext,
        accumulator: &LineAccumulator,
        _year: &mut YearTracker,
    ) -> Result<EventData, String> {
        let year = accumulator.year.ok_or("missing year")?;
        let month = accumulator.month.ok_or("missing month")?;
        let day = accumulator.day.ok_or("missing day")?;
        let hour = accumulator.hour.ok_or("missing time")?;
        let minute = accumulator.minute.ok_or("missing time")?;
        let second = accumulator.second.ok_or("missing time")?;
        let dt = datetime_from_ymd_hms(&FIXEDOFFSET0, year, month, day, hour, minute, second)
            .ok_or_else(|| {
                format!(
                    "invalid date {}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second,
                )
            })?;
        let mut event = EventData::new(DATA_TYPE, Timestamp::At(datetime_to_micros(&dt)));
        event.set_attr("body", Value::from(accumulator.body.as_str()));
        Ok(event)
    }
}

/// Registry-facing wrapper around the lexer engine.
pub struct DpkgParser {
    engine: LexerParser<DpkgFormat>,
}

impl Default for DpkgParser {
    fn default() -> DpkgParser {
        DpkgParser::new()
    }
}

impl DpkgParser {
    pub fn new() -> DpkgParser {
        DpkgParser {
            engine: LexerParser::new(DpkgFormat::new()),
        }
    }
}

impl ParserPlugin for DpkgParser {
    fn name(&self) -> &'static str {
        "dpkg"
    }

    fn data_type(&self) -> &'static str {
        DATA_TYPE
    }

    fn check_required_format(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> bool {
        self.engine.check_required_format(context, content)
    }

    fn parse(
        &self,
        context: &ParseContext,
        content: &[u8],
    ) -> ParseOutput {
        self.engine.parse(context, content)
    }
}
