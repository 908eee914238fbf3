// src/engine/worker.rs

//! The extraction worker: pops [`Task`]s, resolves each path
//! specification to a file entry, runs the parser registry over the
//! content, enriches the produced events, and pushes
//! [`TaskResult`]s onto the result queue.
//!
//! Each worker owns its own [`Resolver`] (no shared file-handle cache
//! across workers) and builds its own parser registry after spawn.
//! A panicking plugin is caught at the task boundary and converted into
//! a [`ParseError`] record; it never terminates the worker.
//!
//! [`Task`]: crate::engine::Task
//! [`TaskResult`]: crate::engine::TaskResult
//! [`Resolver`]: crate::readers::resolver::Resolver
//! [`ParseError`]: crate::data::event::ParseError

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use ::si_trace_print::{defn, defo, defx};

use crate::common::{AbortFlag, Count, FPath, ResultFind};
use crate::data::event::{EventData, ExtractionRecord, ParseError, Timestamp, Value};
use crate::data::pathspec::{PathSpecP, TypeIndicator};
use crate::engine::knowledge::KnowledgeBase;
use crate::engine::queue::WorkQueue;
use crate::engine::{Task, TaskResult};
use crate::parsers::{parse_with_registry, ParseContext, ParseOutput, ParserRegistry};
use crate::readers::helpers::basename;
use crate::readers::resolver::{EntryStat, FileEntry, FileSystem, Resolver};

/// Shared handle to the evidence backend. The backend itself is
/// stateless; all per-worker mutable state lives in the [`Resolver`].
///
/// [`Resolver`]: crate::readers::resolver::Resolver
pub type FileSystemP = Arc<dyn FileSystem + Send + Sync>;

/// Shared handle to the read-only session knowledge.
pub type KnowledgeBaseP = Arc<KnowledgeBase>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pollable status record of one worker, updated by the worker and read
/// by the foreman. Never used for data transfer.
#[derive(Clone, Debug)]
pub struct WorkerStatus {
    pub identifier: String,
    pub is_running: bool,
    /// Display name of the file currently being processed.
    pub current_file: Option<FPath>,
    pub tasks_consumed: Count,
    pub events_produced: Count,
    pub errors_produced: Count,
    pub files_unparsed: Count,
    pub last_activity: Instant,
}

impl WorkerStatus {
    pub fn new(identifier: String) -> WorkerStatus {
        WorkerStatus {
            identifier,
            is_running: true,
            current_file: None,
            tasks_consumed: 0,
            events_produced: 0,
            errors_produced: 0,
            files_unparsed: 0,
            last_activity: Instant::now(),
        }
    }
}

pub type WorkerStatusP = Arc<RwLock<WorkerStatus>>;

fn with_status<Fn_: FnOnce(&mut WorkerStatus)>(
    status: &WorkerStatusP,
    func: Fn_,
) {
    let mut guard = match status.write() {
        Ok(val) => val,
        Err(poisoned) => poisoned.into_inner(),
    };
    func(&mut guard);
    guard.last_activity = Instant::now();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// worker loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything one worker thread needs. Constructed by the foreman,
/// consumed by [`worker_loop`].
///
/// [`worker_loop`]: worker_loop
pub struct WorkerContext {
    pub identifier: String,
    pub fs: FileSystemP,
    pub knowledge: KnowledgeBaseP,
    pub task_queue: WorkQueue<Task>,
    pub result_queue: WorkQueue<TaskResult>,
    pub abort: AbortFlag,
    pub status: WorkerStatusP,
    /// Parser selection expression, applied when building this worker's
    /// registry.
    pub parser_filter: Option<String>,
}

/// Main loop of one worker thread. Runs until the task queue reports
/// done or the abort flag is observed between tasks; in-flight tasks
/// finish, new ones are not started.
pub fn worker_loop(context: WorkerContext) {
    defn!("({:?})", context.identifier);
    // parser plugins are constructed after spawn, locally to this worker
    let registry: ParserRegistry = crate::parsers::select_parsers(
        crate::parsers::build_registry(),
        context.parser_filter.as_deref(),
    );
    let mut resolver: Resolver = Resolver::new();
    loop {
        if context.abort.load(Ordering::Relaxed) {
            defo!("{:?}: abort observed between tasks", context.identifier);
            break;
        }
        let task: Task = match context.task_queue.pop() {
            ResultFind::Found(val) => val,
            ResultFind::Done => {
                defo!("{:?}: task queue done", context.identifier);
                break;
            }
            ResultFind::Err(_err) => {
                defo!("{:?}: task queue error {:?}", context.identifier, _err);
                break;
            }
        };
        process_task(&context, &registry, &mut resolver, task);
    }
    with_status(&context.status, |status| {
        status.is_running = false;
        status.current_file = None;
    });
    defx!("({:?})", context.identifier);
}

/// Process one task end to end; every failure mode is converted into
/// records or counters, never a worker exit.
fn process_task(
    context: &WorkerContext,
    registry: &ParserRegistry,
    resolver: &mut Resolver,
    task: Task,
) {
    defn!("({:?}, task {})", context.identifier, task.task_id);
    let display_name: FPath = task.pathspec.display_name();
    with_status(&context.status, |status| {
        status.tasks_consumed += 1;
        status.current_file = Some(display_name.clone());
    });
    let output: Option<ParseOutput> = extract_records(context, registry, resolver, &task);
    let mut events: Count = 0;
    let mut errors: Count = 0;
    match output {
        Some(output) => {
            let enriched = enrich_and_wrap(context, resolver, &task, output);
            for record in enriched.into_iter() {
                match &record {
                    ExtractionRecord::Event(_) => events += 1,
                    ExtractionRecord::Error(_) => errors += 1,
                }
                let result = TaskResult {
                    task_id: task.task_id,
                    record,
                };
                if context.result_queue.push(result).is_err() {
                    defo!("{:?}: result queue closed", context.identifier);
                    break;
                }
            }
        }
        None => {
            // not an error: the file is simply of no registered format
            defo!("{:?}: unparsed {}", context.identifier, display_name);
        }
    }
    with_status(&context.status, |status| {
        status.events_produced += events;
        status.errors_produced += errors;
        if events == 0 && errors == 0 {
            status.files_unparsed += 1;
        }
        status.current_file = None;
    });
    defx!("task {}: {} events, {} errors", task.task_id, events, errors);
}

/// Resolve, read, and parse one task's file. `None` when the file is
/// unreadable or no parser accepts it; a plugin panic becomes a
/// `ParseError` output.
fn extract_records(
    context: &WorkerContext,
    registry: &ParserRegistry,
    resolver: &mut Resolver,
    task: &Task,
) -> Option<ParseOutput> {
    let entry = match resolver.open_file_entry(context.fs.as_ref(), &task.pathspec) {
        Ok(val) => val,
        Err(err) => {
            let mut output = ParseOutput::new();
            output.errors.push(ParseError {
                plugin: String::from("resolver"),
                pathspec: Some(task.pathspec.clone()),
                message: format!("cannot open file entry: {}", err),
            });
            return Some(output);
        }
    };
    // a directory task carries no parseable content; its stat metadata
    // is the record
    if entry.is_directory() {
        return Some(directory_metadata(entry.as_ref()));
    }
    let mut content: Vec<u8> = Vec::new();
    {
        let mut stream = match entry.open_stream() {
            Ok(val) => val,
            Err(err) => {
                let mut output = ParseOutput::new();
                output.errors.push(ParseError {
                    plugin: String::from("resolver"),
                    pathspec: Some(task.pathspec.clone()),
                    message: format!("cannot open stream: {}", err),
                });
                return Some(output);
            }
        };
        if let Err(err) = stream.read_to_end(&mut content) {
            let mut output = ParseOutput::new();
            output.errors.push(ParseError {
                plugin: String::from("resolver"),
                pathspec: Some(task.pathspec.clone()),
                message: format!("read failed: {}", err),
            });
            return Some(output);
        }
    }
    let parse_context = ParseContext {
        knowledge: context.knowledge.as_ref(),
        pathspec: &task.pathspec,
    };
    // a buggy plugin must never terminate the worker
    let caught = catch_unwind(AssertUnwindSafe(|| {
        parse_with_registry(registry, &parse_context, &content)
    }));
    match caught {
        Ok(Some((_parser_name, output))) => Some(output),
        Ok(None) => None,
        Err(panic) => {
            let message: String = match panic.downcast_ref::<&str>() {
                Some(text) => (*text).to_string(),
                None => match panic.downcast_ref::<String>() {
                    Some(text) => text.clone(),
                    None => String::from("plugin panicked"),
                },
            };
            let mut output = ParseOutput::new();
            output.errors.push(ParseError {
                plugin: String::from("registry"),
                pathspec: Some(task.pathspec.clone()),
                message,
            });
            Some(output)
        }
    }
}

/// Metadata-only output for a directory task. The collector emits these
/// tasks under its directory-metadata option; the event's timestamp is
/// the directory's modification time when the backend tracks one.
fn directory_metadata(entry: &dyn FileEntry) -> ParseOutput {
    let timestamp: Timestamp = match entry.stat() {
        Ok(EntryStat {
            mtime: Some((secs, nanos)),
            ..
        }) => Timestamp::At(secs * 1_000_000 + (nanos / 1_000) as i64),
        _ => Timestamp::NotYetResolved,
    };
    let mut event = EventData::new("fs:directory:entry", timestamp);
    event.set_attr("file_entry_type", Value::from("directory"));
    let mut output = ParseOutput::new();
    output.events.push(event);
    output
}

/// Mediator step: stamp reserved attributes (filename, display name,
/// inode, source hostname, shadow store number) onto every event, then
/// wrap events and errors as queue records.
fn enrich_and_wrap(
    context: &WorkerContext,
    resolver: &mut Resolver,
    task: &Task,
    output: ParseOutput,
) -> Vec<ExtractionRecord> {
    let display_name: FPath = task.pathspec.display_name();
    let filename: FPath = match task.pathspec.location.is_empty() {
        true => basename(&task.pathspec.outermost().location),
        false => basename(&task.pathspec.location),
    };
    let inode: Option<u64> = resolver
        .open_file_entry(context.fs.as_ref(), &task.pathspec)
        .ok()
        .and_then(|entry: Box<dyn FileEntry>| entry.stat().ok())
        .map(|stat| stat.inode);
    let store_number: Option<usize> = shadow_store_number(&task.pathspec);
    let mut records: Vec<ExtractionRecord> = Vec::new();
    for mut event in output.events.into_iter() {
        event.set_attr("filename", Value::from(filename.as_str()));
        event.set_attr("display_name", Value::from(display_name.as_str()));
        event.set_attr("pathspec", Value::from(format!("{}", task.pathspec)));
        if let Some(inode) = inode {
            event.set_attr("inode", Value::Int(inode as i64));
        }
        if let Some(hostname) = &context.knowledge.hostname {
            if event.attr("hostname").is_none() {
                event.set_attr("hostname", Value::from(hostname.as_str()));
            }
        }
        if let Some(store_number) = store_number {
            event.set_attr("vss_store_number", Value::Int(store_number as i64));
        }
        records.push(ExtractionRecord::Event(event));
    }
    for error in output.errors.into_iter() {
        records.push(ExtractionRecord::Error(error));
    }
    records
}

/// The 1-based public store number when `pathspec` resides in a shadow
/// store.
fn shadow_store_number(pathspec: &PathSpecP) -> Option<usize> {
    let mut current: Option<&PathSpecP> = Some(pathspec);
    while let Some(spec) = current {
        if spec.type_indicator == TypeIndicator::VShadow {
            return spec.store_index.map(|index| index + 1);
        }
        current = spec.parent.as_ref();
    }
    None
}
