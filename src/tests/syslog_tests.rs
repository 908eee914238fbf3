// src/tests/syslog_tests.rs

//! tests for `syslog.rs`

use ::chrono::Datelike;
use ::test_case::test_case;

use crate::data::datetime::{
    datetime_from_ymd_hms,
    datetime_to_micros,
    EpochMicros,
    Utc,
    Year,
    FIXEDOFFSET0,
};
use crate::data::event::{Timestamp, Value};
use crate::engine::knowledge::KnowledgeBase;
use crate::parsers::syslog::SyslogParser;
use crate::parsers::{ParseContext, ParseOutput, ParserPlugin};
use crate::tests::common::{os_pathspec, DPKG_LINES, SYSLOG_LINES};

fn with_context<T>(run: impl FnOnce(&SyslogParser, &ParseContext) -> T) -> T {
    let knowledge = KnowledgeBase::new();
    let pathspec = os_pathspec("/var/log/syslog");
    let context = ParseContext {
        knowledge: &knowledge,
        pathspec: &pathspec,
    };
    run(&SyslogParser::new(), &context)
}

fn check(content: &[u8]) -> bool {
    with_context(|parser, context| parser.check_required_format(context, content))
}

fn parse(content: &[u8]) -> ParseOutput {
    with_context(|parser, context| parser.parse(context, content))
}

fn micros_at(
    year: Year,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> EpochMicros {
    datetime_to_micros(
        &datetime_from_ymd_hms(&FIXEDOFFSET0, year, month, day, hour, minute, second).unwrap(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test_case(b"Jan 22 07:54:24 host sshd[1234]: Accepted password for root\n", true)]
#[test_case(b"Jan  2 07:54:24 host kernel: space-padded day\n", true; "space padded day")]
#[test_case(b"Dec 31 23:59:59 host cron: no pid\n", true; "no pid")]
#[test_case(b"", false; "empty")]
#[test_case(b"no timestamp here at all\n", false; "no timestamp")]
#[test_case(b"Xxx 22 07:54:24 host sshd: bad month\n", false; "bad month name")]
#[test_case(b"Feb 31 07:54:24 host sshd: impossible day\n", false; "shape matches but date invalid")]
fn test_check_required_format(
    content: &[u8],
    expected: bool,
) {
    assert_eq!(check(content), expected);
}

/// Verification looks at the first line only.
#[test]
fn test_check_first_line_only() {
    let content: &[u8] = b"garbage first line\nJan 22 07:54:24 host sshd: real\n";
    assert!(!check(content));
}

#[test]
fn test_check_rejects_dpkg_content() {
    assert!(!check(DPKG_LINES.as_bytes()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The December lines get the seed year, the January line the next year.
#[test]
fn test_parse_year_rollover() {
    let output: ParseOutput = parse(SYSLOG_LINES.as_bytes());
    assert_eq!(output.events.len(), 3);
    assert!(output.errors.is_empty());
    let seed_year: Year = Utc::now().year();
    assert_eq!(
        output.events[0].timestamp,
        Timestamp::At(micros_at(seed_year, 12, 30, 8, 1, 2)),
    );
    assert_eq!(
        output.events[1].timestamp,
        Timestamp::At(micros_at(seed_year, 12, 31, 9, 0, 0)),
    );
    assert_eq!(
        output.events[2].timestamp,
        Timestamp::At(micros_at(seed_year + 1, 1, 1, 0, 0, 10)),
    );
}

#[test]
fn test_parse_attributes() {
    let output: ParseOutput = parse(SYSLOG_LINES.as_bytes());
    let event = &output.events[0];
    assert_eq!(event.data_type, "linux:syslog:line");
    assert_eq!(event.attr("hostname"), Some(&Value::String("host1".to_string())));
    assert_eq!(event.attr("reporter"), Some(&Value::String("sshd".to_string())));
    assert_eq!(event.attr("pid"), Some(&Value::Int(42)));
    assert_eq!(
        event.attr("body"),
        Some(&Value::String("Accepted password for root".to_string())),
    );
    // the cron line has no pid
    assert_eq!(output.events[1].attr("pid"), None);
}

/// A corrupt line is skipped; surrounding lines still parse.
#[test]
fn test_parse_skips_corrupt_lines() {
    let content: &str = "\
Jan 22 07:54:24 host sshd[1234]: first
\x01\x02 corrupt line
Jan 22 07:54:25 host sshd[1234]: second
";
    let output: ParseOutput = parse(content.as_bytes());
    assert_eq!(output.events.len(), 2);
    assert_eq!(output.skipped, 1);
}

/// A line whose shape matches but whose date is impossible is recorded
/// as a parse error, not silently dropped.
#[test]
fn test_parse_invalid_date_is_error() {
    let content: &str = "\
Jan 22 07:54:24 host sshd: good
Feb 31 07:54:24 host sshd: impossible
";
    let output: ParseOutput = parse(content.as_bytes());
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.skipped, 1);
    assert_eq!(output.errors[0].plugin, "syslog");
}

#[test]
fn test_parse_blank_lines_ignored() {
    let content: &str = "\nJan 22 07:54:24 host sshd: one\n\n\n";
    let output: ParseOutput = parse(content.as_bytes());
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.skipped, 0);
}

/// Parsing the same content twice yields identical events.
#[test]
fn test_parse_deterministic() {
    let a: ParseOutput = parse(SYSLOG_LINES.as_bytes());
    let b: ParseOutput = parse(SYSLOG_LINES.as_bytes());
    assert_eq!(a.events, b.events);
}
