// src/bin/fae.rs

//! Driver program _fae_.
//!
//! Processes user-passed command-line arguments, then scans the passed
//! evidence source: the collector thread walks the source (and any
//! requested volume-shadow stores) pushing tasks onto a bounded queue, a
//! pool of extraction worker threads pulls tasks and runs each file
//! through the parser registry, and the main thread drains the result
//! queue, printing one line per normalized event record.
//!
//! If passed CLI option `--summary`, prints a summary of collector and
//! per-worker counters after the run.

#![allow(non_camel_case_types)]

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

extern crate anyhow;

extern crate chrono;
use chrono::{TimeZone, Utc};

extern crate clap;
use clap::Parser;

extern crate const_format;
use const_format::concatcp;

extern crate ctrlc;

extern crate si_trace_print;
use si_trace_print::{defn, defo, defx};
use si_trace_print::stack::stack_offset_set;

extern crate faelib;

use faelib::common::{AbortFlag, FPath, ResultFind, RESULT_QUEUE_SZ, TASK_QUEUE_SZ};
use faelib::collectors::collector::{Collector, CollectorOptions, StoreSelection, SummaryCollector};
use faelib::collectors::findspec::{load_filter_file, FindSpecs};
use faelib::data::event::{ExtractionRecord, Timestamp, Value};
use faelib::debug::printers::{e_err, e_wrn};
use faelib::engine::foreman::Foreman;
use faelib::engine::knowledge::{run_preprocessing, KnowledgeBase};
use faelib::engine::queue::WorkQueue;
use faelib::engine::worker::{FileSystemP, KnowledgeBaseP, WorkerStatus};
use faelib::engine::{Task, TaskResult};
use faelib::readers::resolver::{OsFileSystem, Resolver};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// command-line parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const WORKER_COUNT_DEFAULT: usize = 4;

/// `--help` _afterword_ message.
const CLI_HELP_AFTER: &str = concatcp!(
    "\
Built-in parsers: apt_history, dpkg, syslog (preset \"linux\" selects all).
The --parsers expression is comma-separated names, \"*\" globs, or preset
names; a \"-\" prefix excludes, e.g. \"linux,-dpkg\".

The --filter file holds one absolute-path-style pattern per line; each
segment is a case-insensitive regular expression. Lines starting with
\"#\" are comments. Malformed lines are skipped with a warning.

Shadow stores are addressed by 1-based store number, e.g. --vss 1,3,
or \"all\" for every store the source exposes.",
);

/// Parse the user-passed `--vss` selection.
fn cli_parse_store_selection(selection: &str) -> Result<StoreSelection, String> {
    match selection.trim().to_lowercase().as_str() {
        "none" | "" => return Ok(StoreSelection::None),
        "all" => return Ok(StoreSelection::All),
        _ => {}
    }
    let mut numbers: Vec<usize> = Vec::new();
    for part in selection.split(',') {
        let number: usize = part
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("not a store number {:?}", part.trim()))?;
        if number == 0 {
            return Err(String::from("store numbers are 1-based"));
        }
        numbers.push(number);
    }
    Ok(StoreSelection::Stores(numbers))
}

#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    after_help = CLI_HELP_AFTER,
    verbatim_doc_comment,
)]
struct CLI_Args {
    /// Path of the evidence source: a directory tree or a single file.
    #[clap(required = true)]
    source: String,

    /// Path of a filter file restricting the walk to matching paths.
    #[clap(short = 'f', long = "filter", verbatim_doc_comment)]
    filter: Option<String>,

    /// Parser selection expression; default is every registered parser.
    #[clap(short = 'p', long = "parsers", verbatim_doc_comment)]
    parsers: Option<String>,

    /// Count of extraction worker threads.
    #[clap(
        short = 'w',
        long = "workers",
        default_value_t = WORKER_COUNT_DEFAULT,
    )]
    workers: usize,

    /// Volume-shadow stores to walk after the primary volume:
    /// "none", "all", or 1-based store numbers like "1,3".
    #[clap(
        long = "vss",
        verbatim_doc_comment,
        value_parser = cli_parse_store_selection,
        default_value = "none",
    )]
    vss: StoreSelection,

    /// Classify and expand embedded containers (ZIP/TAR/GZIP) into
    /// member tasks.
    #[clap(short = 'c', long = "classify", verbatim_doc_comment)]
    classify: bool,

    /// Also emit a metadata task per directory.
    #[clap(long = "directory-metadata")]
    directory_metadata: bool,

    /// Print a processing summary after the run.
    #[clap(short = 's', long = "summary")]
    summary: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// printing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One line per event: timestamp, data type, then the attributes.
fn print_record(record: &ExtractionRecord) {
    match record {
        ExtractionRecord::Event(event) => {
            let stamp: String = match event.timestamp {
                Timestamp::At(micros) => match Utc.timestamp_micros(micros).single() {
                    Some(dt) => dt.to_rfc3339(),
                    None => format!("@{}", micros),
                },
                Timestamp::NotYetResolved => String::from("(unresolved)"),
            };
            let mut line: String = format!("{} {}", stamp, event.data_type);
            for (name, value) in event.attributes().iter() {
                match value {
                    Value::String(text) => line.push_str(&format!(" {}={:?}", name, text)),
                    other => line.push_str(&format!(" {}={}", name, other)),
                }
            }
            println!("{}", line);
        }
        ExtractionRecord::Error(error) => {
            e_wrn!("{}", error);
        }
    }
}

fn print_summary(
    summary_collector: &SummaryCollector,
    statuses: &[WorkerStatus],
) {
    eprintln!("Collector:");
    eprintln!("  files emitted         {}", summary_collector.files_emitted);
    eprintln!("  directories emitted   {}", summary_collector.directories_emitted);
    eprintln!("  container members     {}", summary_collector.members_emitted);
    eprintln!("  entries skipped       {}", summary_collector.entries_skipped);
    eprintln!("  duplicates suppressed {}", summary_collector.duplicates_suppressed);
    eprintln!("  subtrees abandoned    {}", summary_collector.subtrees_abandoned);
    eprintln!("  shadow stores walked  {}", summary_collector.stores_walked);
    for status in statuses.iter() {
        eprintln!("Worker {}:", status.identifier);
        eprintln!("  tasks consumed        {}", status.tasks_consumed);
        eprintln!("  events produced       {}", status.events_produced);
        eprintln!("  errors produced       {}", status.errors_produced);
        eprintln!("  files unparsed        {}", status.files_unparsed);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// main
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Set a signal handler for a cooperative abort: set the shared flag and
/// close both queues so every blocked queue wait unblocks. In-flight
/// tasks finish; new ones are not started.
fn set_signal_handler(
    abort: AbortFlag,
    task_queue: WorkQueue<Task>,
    result_queue: WorkQueue<TaskResult>,
) -> anyhow::Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        abort.store(true, Ordering::Relaxed);
        task_queue.close(true);
        result_queue.close(true);
    })?;
    Ok(())
}

fn main() -> ExitCode {
    stack_offset_set(Some(2));
    defn!();
    let args = CLI_Args::parse();

    // configuration errors are fatal before any processing starts
    let source: FPath = args.source.clone();
    if !std::path::Path::new(&source).exists() {
        e_err!("source does not exist {:?}", source);
        return ExitCode::FAILURE;
    }
    let find_specs: Option<FindSpecs> = match &args.filter {
        Some(filter_path) => match load_filter_file(filter_path) {
            Ok(specs) => Some(specs),
            Err(err) => {
                e_err!("cannot load filter file {:?}: {}", filter_path, err);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    if args.workers == 0 {
        e_err!("--workers must be at least 1");
        return ExitCode::FAILURE;
    }

    let fs: FileSystemP = Arc::new(OsFileSystem::new(source));
    let abort: AbortFlag = Arc::new(AtomicBool::new(false));
    let task_queue: WorkQueue<Task> = WorkQueue::new(TASK_QUEUE_SZ);
    let result_queue: WorkQueue<TaskResult> = WorkQueue::new(RESULT_QUEUE_SZ);

    if let Err(err) =
        set_signal_handler(abort.clone(), task_queue.clone(), result_queue.clone())
    {
        e_wrn!("cannot set interrupt handler: {}", err);
    }

    // preprocessing runs before any extraction; single writer
    let knowledge: KnowledgeBaseP = {
        let mut knowledge = KnowledgeBase::new();
        let mut resolver = Resolver::new();
        run_preprocessing(&mut resolver, fs.as_ref(), &mut knowledge);
        Arc::new(knowledge)
    };
    defo!("knowledge: {:?}", knowledge);

    let mut foreman = Foreman::new(task_queue.clone(), result_queue.clone(), abort.clone());
    if let Err(err) = foreman.spawn_workers(
        args.workers,
        fs.clone(),
        knowledge.clone(),
        args.parsers.clone(),
    ) {
        e_err!("cannot spawn workers: {}", err);
        return ExitCode::FAILURE;
    }

    // collector thread; the collector closes the task queue when done
    let collector_handle = {
        let options = CollectorOptions {
            session_id: std::process::id() as u64,
            collect_directory_metadata: args.directory_metadata,
            classify_containers: args.classify,
            stores: args.vss.clone(),
        };
        let abort = abort.clone();
        let fs = fs.clone();
        let task_queue = task_queue.clone();
        thread::spawn(move || -> std::io::Result<SummaryCollector> {
            let mut collector = Collector::new(options, abort);
            collector.collect(fs.as_ref(), find_specs.as_ref(), &task_queue)?;
            Ok(collector.summary)
        })
    };

    // monitor thread joins workers and closes the result queue; the main
    // thread is then free to block on draining results
    let foreman_shared = Arc::new(RwLock::new(foreman));
    let monitor_handle = {
        let foreman_shared = foreman_shared.clone();
        thread::spawn(move || {
            let mut guard = match foreman_shared.write() {
                Ok(val) => val,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.join_all();
        })
    };

    loop {
        match result_queue.pop() {
            ResultFind::Found(result) => print_record(&result.record),
            ResultFind::Done => break,
            ResultFind::Err(err) => {
                e_err!("result queue failed: {}", err);
                break;
            }
        }
    }

    let summary_collector: SummaryCollector = match collector_handle.join() {
        Ok(Ok(summary)) => summary,
        Ok(Err(err)) => {
            e_err!("collector failed: {}", err);
            SummaryCollector::default()
        }
        Err(_) => {
            e_err!("collector thread panicked");
            SummaryCollector::default()
        }
    };
    if monitor_handle.join().is_err() {
        e_err!("worker monitor thread panicked");
    }

    let (statuses, unexpected_exits): (Vec<WorkerStatus>, usize) = {
        let guard = match foreman_shared.read() {
            Ok(val) => val,
            Err(poisoned) => poisoned.into_inner(),
        };
        (guard.poll_status(), guard.unexpected_exits)
    };
    if args.summary {
        print_summary(&summary_collector, &statuses);
    }
    defx!();
    match unexpected_exits {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
