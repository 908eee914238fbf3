// src/engine/mod.rs

//! The `engine` module is the producer/consumer pipeline: bounded
//! [`WorkQueue`]s, the extraction [`worker`] loop, the [`foreman`]
//! coordinator, and the session [`KnowledgeBase`].
//!
//! Scheduling model: the collector, the worker pool, and the result
//! drain run as OS threads connected by bounded queues; each worker is
//! single-threaded internally. No ordering is guaranteed between
//! discovery order and result order; workers run independently.
//!
//! [`WorkQueue`]: crate::engine::queue::WorkQueue
//! [`worker`]: crate::engine::worker
//! [`foreman`]: crate::engine::foreman
//! [`KnowledgeBase`]: crate::engine::knowledge::KnowledgeBase

pub mod foreman;
pub mod knowledge;
pub mod queue;
pub mod worker;

use crate::common::Count;
use crate::data::pathspec::PathSpecP;

/// Identifier of one extraction session (one program run).
pub type SessionId = u64;

/// Identifier of one unit of extraction work within a session.
pub type TaskId = Count;

/// One unit of extraction work: a path specification plus session/task
/// identifiers. Handed to exactly one worker. Results are accounted
/// per-task so a failed or aborted task is isolated from other tasks'
/// output.
#[derive(Clone, Debug)]
pub struct Task {
    pub session_id: SessionId,
    pub task_id: TaskId,
    pub pathspec: PathSpecP,
}

/// One record on the result queue, tagged with the task that produced it
/// so the downstream writer can keep per-task segments independent.
#[derive(Clone, Debug)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub record: crate::data::event::ExtractionRecord,
}
