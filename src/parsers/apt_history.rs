// src/parsers/apt_history.rs

//! APT transaction history (`/var/log/apt/history.log`): blank-line
//! separated blocks spanning several physical lines, e.g.
//!
//! ```text
//! Start-Date: 2019-07-10  16:38:12
//! Commandline: apt-get install rolldice
//! Install: rolldice:amd64 (1.16-1build1)
//! End-Date: 2019-07-10  16:38:14
//! ```
//!
//! A block cannot be recognized one physical line at a time, so this
//! format uses the multi-line buffered strategy.

use ::regex::Captures;

use crate::data::datetime::{datetime_from_ymd_hms, datetime_to_micros, DateTimeL, FIXEDOFFSET0};
use crate::data::event::{EventData, Timestamp, Value};
use crate::parsers::multiline::{MultiLineFormat, MultiLineParser, RecordGrammar};
use crate::parsers::{ParseContext, ParseOutput, ParserPlugin};

const DATA_TYPE: &str = "linux:apt_history:record";

/// One whole transaction block, `Start-Date` through `End-Date`.
/// `(?s)` so the body may span physical lines.
const GRAMMAR_RECORD: &str = r"(?s)^Start-Date: (?P<start_date>\d{4}-\d{2}-\d{2}) +(?P<start_time>\d{2}:\d{2}:\d{2})\n(?P<body>.*?)End-Date: (?P<end_date>\d{4}-\d{2}-\d{2}) +(?P<end_time>\d{2}:\d{2}:\d{2})(?:\n+|$)";

/// Body keys copied onto the event as string attributes.
const BODY_KEYS: [&str; 7] = [
    "Commandline",
    "Error",
    "Install",
    "Purge",
    "Remove",
    "Requested-By",
    "Upgrade",
];

struct AptHistoryFormat {
    grammars: Vec<RecordGrammar>,
}

impl AptHistoryFormat {
    fn new() -> AptHistoryFormat {
        AptHistoryFormat {
            grammars: vec![RecordGrammar::new("record", GRAMMAR_RECORD)],
        }
    }
}

/// Parse `YYYY-MM-DD` + `HH:MM:SS` capture pairs to an instant.
fn datetime_from_captures(
    captures: &Captures,
    date_name: &str,
    time_name: &str,
) -> Result<DateTimeL, String> {
    let date: &str = captures.name(date_name).unwrap().as_str();
    let time: &str = captures.name(time_name).unwrap().as_str();
    let mut date_parts = date.split('-');
    let year: i32 = date_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad date {:?}", date))?;
    let month: u32 = date_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad date {:?}", date))?;
    let day: u32 = date_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad date {:?}", date))?;
    let mut time_parts = time.split(':');
    let hour: u32 = time_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad time {:?}", time))?;
    let minute: u32 = time_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad time {:?}", time))?;
    let second: u32 = time_parts
        .next()
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| format!("bad time {:?}", time))?;
    datetime_from_ymd_hms(&FIXEDOFFSET0, year, month, day, hour, minute, second)
        .ok_or_else(|| format!("invalid date {} {}", date, time))
}

impl MultiLineFormat for AptHistoryFormat {
    fn name(&self) -> &'static str {
        "apt_history"
    }

    fn grammars(&self) -> &[RecordGrammar] {
        &self.grammars
    }

    fn parse_record(
        &self,
        _context: &ParseContext,
        _key: &'static str,
        captures: &Captures,
    ) -> Result<EventData, String> {
        let start = datetime_from_captures(captures, "start_date", "start_time")?;
        let end = datetime_from_captures(captures, "end_date", "end_time")?;
        let mut event = EventData::new(DATA_TYPE, Timestamp::At(datetime_to_micros(&start)));
        event.set_attr("end_time", Value::DateTime(datetime_to_micros(&end)));
        for line in captures.name("body").unwrap().as_str().lines() {
            let (key, value) = match line.split_once(": ") {
                Some(val) => val,
                None => continue,
            };
            if !BODY_KEYS.contains(&key) {
                continue;
            }
            let attribute: String = key.to_lowercase().replace('-', "_");
            event.set_attr(attribute.as_str(), Value::from(value.trim()));
        }
        Ok(event)
    }
}

/// Registry-facing wrapper around the multi-line engine.
pub struct AptHistoryParser {
    engine: MultiLineParser<AptHistoryFormat>,
}

impl Default for AptHistoryParser {
    fn default() -> AptHistoryParser {
        AptHistoryParser::new()
    }
}

impl AptHistoryParser {
    pub fn new() -> AptHistoryParser {
        AptHistoryParser {
            engine: MultiLineParser::new(AptHistoryFormat::new()),
        }
    }
}

impl ParserPlugin for AptHistoryParser {
    fn name(&self) -> &'static str {
        "apt_history"
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
