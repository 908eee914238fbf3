// src/parsers/syslog.rs

//! Classic RFC 3164 style syslog lines, e.g.
//!
//! ```text
//! Jan 22 07:54:24 host sshd[1234]: Accepted password for root
//! ```
//!
//! The timestamp omits the year; year inference rolls the tracked year
//! forward across a December to January wrap.

use ::chrono::Datelike;
use ::regex::Captures;

use crate::data::datetime::{
    datetime_from_ymd_hms,
    datetime_to_micros,
    month_from_name,
    Month,
    Utc,
    YearTracker,
    FIXEDOFFSET0,
};
use crate::data::event::{EventData, Timestamp, Value};
use crate::parsers::textparser::{LineGrammar, SingleLineFormat, SingleLineParser};
use crate::parsers::{ParseContext, ParseOutput, ParserPlugin};

const DATA_TYPE: &str = "linux:syslog:line";

/// The whole-line grammar. The reporter may carry a bracketed PID and an
/// optional trailing colon.
const GRAMMAR_LINE: &str = r"^(?P<month>[A-Za-z]{3})\s+(?P<day>\d{1,2})\s+(?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2})\s+(?P<hostname>\S+)\s+(?P<reporter>[^\s:\[]+)(?:\[(?P<pid>\d+)\])?:?\s*(?P<body>.*)$";

struct SyslogFormat {
    grammars: Vec<LineGrammar>,
}

impl SyslogFormat {
    fn new() -> SyslogFormat {
        SyslogFormat {
            grammars: vec![LineGrammar::new("line", GRAMMAR_LINE)],
        }
    }
}

fn capture_u32(
    captures: &Captures,
    name: &str,
) -> Result<u32, String> {
    captures
        .name(name)
        .ok_or_else(|| format!("missing capture {:?}", name))?
        .as_str()
        .parse::<u32>()
        .map_err(|err| format!("bad capture {:?}: {}", name, err))
}

impl SingleLineFormat for SyslogFormat {
    fn name(&self) -> &'static str {
        "syslog"
    }

    fn grammars(&self) -> &[LineGrammar] {
        &self.grammars
    }

    fn initial_year(
        &self,
        _context: &ParseContext,
    ) -> YearTracker {
        // no year in-band; seed from the wall clock
        YearTracker::new(Utc::now().year())
    }

    fn parse_record(
        &self,
        _context: &ParseContext,
        _key: &'static str,
        captures: &Captures,
        year: &mut YearTracker,
    ) -> Result<EventData, String> {
        let month_name: &str = captures.name("month").unwrap().as_str();
        let month: Month =
            month_from_name(month_name).ok_or_else(|| format!("bad month {:?}", month_name))?;
        let day: u32 = capture_u32(captures, "day")?;
        let hour: u32 = capture_u32(captures, "hour")?;
        let minute: u32 = capture_u32(captures, "minute")?;
        let second: u32 = capture_u32(captures, "second")?;
        let inferred_year = year.year_for_month(month);
        let dt = datetime_from_ymd_hms(
            &FIXEDOFFSET0,
            inferred_year,
            month,
            day,
            hour,
            minute,
            second,
        )
        .ok_or_else(|| {
            format!(
                "invalid date {}-{:02}-{:02} {:02}:{:02}:{:02}",
                inferred_year, month, day, hour, minute, second,
            )
        })?;
        let mut event = EventData::new(DATA_TYPE, Timestamp::At(datetime_to_micros(&dt)));
        event.set_attr(
            "hostname",
            Value::from(captures.name("hostname").unwrap().as_str()),
        );
        event.set_attr(
            "reporter",
            Value::from(captures.name("reporter").unwrap().as_str()),
        );
        if let Some(pid) = captures.name("pid") {
            match pid.as_str().parse::<i64>() {
                Ok(pid) => event.set_attr("pid", Value::Int(pid)),
                Err(_) => {}
            }
        }
        event.set_attr("body", Value::from(captures.name("body").unwrap().as_str()));
        Ok(event)
    }
}

/// Registry-facing wrapper around the single-line engine.
pub struct SyslogParser {
    engine: SingleLineParser<SyslogFormat>,
}

impl Default for SyslogParser {
    fn default() -> SyslogParser {
        SyslogParser::new()
    }
}

impl SyslogParser {
    pub fn new() -> SyslogParser {
        SyslogParser {
            engine: SingleLineParser::new(SyslogFormat::new()),
        }
    }
}

impl ParserPlugin for SyslogParser {
    fn name(&self) -> &'static str {
        "syslog"
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
