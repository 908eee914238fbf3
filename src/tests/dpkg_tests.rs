// src/tests/dpkg_tests.rs

//! tests for `dpkg.rs` and the lexer strategy underneath it

use ::test_case::test_case;

use crate::data::event::{Timestamp, Value};
use crate::engine::knowledge::KnowledgeBase;
use crate::parsers::dpkg::DpkgParser;
use crate::parsers::{ParseContext, ParseOutput, ParserPlugin, MAX_LINES};
use crate::tests::common::{os_pathspec, DPKG_LINES, SYSLOG_LINES};

// `date -u -d '2016-08-03 15:25:53' +%s`, in microseconds
const MICROS_LINE1: i64 = 1_470_237_953_000_000;
const MICROS_LINE2: i64 = 1_470_237_954_000_000;
const MICROS_LINE3: i64 = 1_470_237_957_000_000;

fn with_context<T>(run: impl FnOnce(&DpkgParser, &ParseContext) -> T) -> T {
    let knowledge = KnowledgeBase::new();
    let pathspec = os_pathspec("/var/log/dpkg.log");
    let context = ParseContext {
        knowledge: &knowledge,
        pathspec: &pathspec,
    };
    run(&DpkgParser::new(), &context)
}

fn check(content: &[u8]) -> bool {
    with_context(|parser, context| parser.check_required_format(context, content))
}

fn parse(content: &[u8]) -> ParseOutput {
    with_context(|parser, context| parser.parse(context, content))
}

fn garbage_lines(count: usize) -> String {
    "not a dpkg line\n".repeat(count)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_check_accepts_dpkg() {
    assert!(check(DPKG_LINES.as_bytes()));
}

#[test_case(b""; "empty")]
#[test_case(b"not a dpkg line\n"; "one garbage line")]
fn test_check_rejects(content: &[u8]) {
    assert!(!check(content));
}

#[test]
fn test_check_rejects_syslog_content() {
    assert!(!check(SYSLOG_LINES.as_bytes()));
}

/// A good line within the error budget still verifies.
#[test]
fn test_check_accepts_after_some_garbage() {
    let content: String = format!("{}{}", garbage_lines(5), DPKG_LINES);
    assert!(check(content.as_bytes()));
}

/// `2 * MAX_LINES` lexer errors before any successful line reject the
/// file, even if a parseable line follows.
#[test]
fn test_check_rejects_at_error_budget() {
    let content: String = format!("{}{}", garbage_lines(MAX_LINES * 2), DPKG_LINES);
    assert!(!check(content.as_bytes()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_parse_lines() {
    let output: ParseOutput = parse(DPKG_LINES.as_bytes());
    assert_eq!(output.events.len(), 3);
    assert!(output.errors.is_empty());
    assert_eq!(output.events[0].timestamp, Timestamp::At(MICROS_LINE1));
    assert_eq!(output.events[1].timestamp, Timestamp::At(MICROS_LINE2));
    assert_eq!(output.events[2].timestamp, Timestamp::At(MICROS_LINE3));
    assert_eq!(output.events[0].data_type, "linux:dpkg:line");
    assert_eq!(
        output.events[0].attr("body"),
        Some(&Value::String("startup archives unpack".to_string())),
    );
    assert_eq!(
        output.events[1].attr("body"),
        Some(&Value::String("install base-passwd:amd64 <none> 3.5.39".to_string())),
    );
}

/// After the first successful line, corrupt lines are skipped without
/// rejecting the file, regardless of how many there are.
#[test]
fn test_parse_lenient_after_first_success() {
    let content: String = format!(
        "2016-08-03 15:25:53 startup archives unpack\n{}",
        garbage_lines(MAX_LINES * 3),
    );
    let output: ParseOutput = parse(content.as_bytes());
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.skipped, (MAX_LINES * 3) as u64);
    assert!(output.errors.is_empty());
}

/// A rejected file reports one parse error and no events.
#[test]
fn test_parse_rejected_reports_error() {
    let content: String = garbage_lines(MAX_LINES * 2 + 5);
    let output: ParseOutput = parse(content.as_bytes());
    assert!(output.events.is_empty());
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].plugin, "dpkg");
}

/// A final line without a trailing newline is still emitted.
#[test]
fn test_parse_trailing_line_without_newline() {
    let content: &[u8] = b"2016-08-03 15:25:53 startup archives unpack";
    let output: ParseOutput = parse(content);
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.events[0].timestamp, Timestamp::At(MICROS_LINE1));
}

/// An impossible date on a line is an error for that line only.
#[test]
fn test_parse_invalid_date_line() {
    let content: &[u8] = b"\
2016-08-03 15:25:53 startup archives unpack
2016-13-40 15:25:54 impossible date
2016-08-03 15:25:57 status half-installed base-passwd:amd64 3.5.39
";
    let output: ParseOutput = parse(content);
    assert_eq!(output.events.len(), 2);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.skipped, 1);
}
