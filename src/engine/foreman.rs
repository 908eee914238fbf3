// src/engine/foreman.rs

//! The foreman: spawns the worker pool, aggregates per-worker status,
//! watches liveness, and signals global end-of-processing once the
//! collector has finished and all workers have drained the task queue.

use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

use ::si_trace_print::{defn, defo, defx};

use crate::common::AbortFlag;
use crate::e_err;
use crate::engine::queue::WorkQueue;
use crate::engine::worker::{
    worker_loop,
    FileSystemP,
    KnowledgeBaseP,
    WorkerContext,
    WorkerStatus,
    WorkerStatusP,
};
use crate::engine::{Task, TaskResult};

struct WorkerHandle {
    identifier: String,
    status: WorkerStatusP,
    join: Option<JoinHandle<()>>,
}

/// Pool coordinator. Owns the worker join handles; shares the queues and
/// abort flag with the collector side.
pub struct Foreman {
    abort: AbortFlag,
    task_queue: WorkQueue<Task>,
    result_queue: WorkQueue<TaskResult>,
    workers: Vec<WorkerHandle>,
    /// Workers that exited without reporting a clean stop.
    pub unexpected_exits: usize,
}

impl Foreman {
    pub fn new(
        task_queue: WorkQueue<Task>,
        result_queue: WorkQueue<TaskResult>,
        abort: AbortFlag,
    ) -> Foreman {
        Foreman {
            abort,
            task_queue,
            result_queue,
            workers: Vec::new(),
            unexpected_exits: 0,
        }
    }

    /// Spawn `count` workers. Each worker builds its own parser registry
    /// and resolver after spawn.
    pub fn spawn_workers(
        &mut self,
        count: usize,
        fs: FileSystemP,
        knowledge: KnowledgeBaseP,
        parser_filter: Option<String>,
    ) -> std::io::Result<()> {
        defn!("({})", count);
        for index in 0..count {
            let identifier: String = format!("worker-{}", index);
            let status: WorkerStatusP = std::sync::Arc::new(std::sync::RwLock::new(
                WorkerStatus::new(identifier.clone()),
            ));
            let context = WorkerContext {
                identifier: identifier.clone(),
                fs: fs.clone(),
                knowledge: knowledge.clone(),
                task_queue: self.task_queue.clone(),
                result_queue: self.result_queue.clone(),
                abort: self.abort.clone(),
                status: status.clone(),
                parser_filter: parser_filter.clone(),
            };
            let join: JoinHandle<()> = std::thread::Builder::new()
                .name(identifier.clone())
                .spawn(move || worker_loop(context))?;
            self.workers.push(WorkerHandle {
                identifier,
                status,
                join: Some(join),
            });
        }
        defx!();
        Ok(())
    }

    /// Snapshot every worker's status record.
    pub fn poll_status(&self) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|worker| {
                match worker.status.read() {
                    Ok(guard) => guard.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                }
            })
            .collect()
    }

    /// Count of workers not yet joined.
    pub fn live_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.join.is_some())
            .count()
    }

    /// Liveness sweep: join workers whose thread has finished. A worker
    /// that finished while still reporting `is_running` exited
    /// unexpectedly (panic outside the plugin boundary); its in-flight
    /// file is reported as a fatal task failure and the worker is removed
    /// from the pool for the remainder of the run. Processing continues
    /// with reduced parallelism.
    pub fn reap_finished(&mut self) {
        for worker in self.workers.iter_mut() {
            let finished: bool = match &worker.join {
                Some(join) => join.is_finished(),
                None => continue,
            };
            if !finished {
                continue;
            }
            let (was_running, current_file) = {
                let guard = match worker.status.read() {
                    Ok(val) => val,
                    Err(poisoned) => poisoned.into_inner(),
                };
                (guard.is_running, guard.current_file.clone())
            };
            let join: JoinHandle<()> = worker.join.take().unwrap();
            let panicked: bool = join.join().is_err();
            if was_running || panicked {
                self.unexpected_exits += 1;
                e_err!(
                    "worker {:?} exited unexpectedly; in-flight task failed: {:?}",
                    worker.identifier,
                    current_file.unwrap_or_default(),
                );
                let mut guard = match worker.status.write() {
                    Ok(val) => val,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.is_running = false;
            } else {
                defo!("worker {:?} finished cleanly", worker.identifier);
            }
        }
        // joined workers keep their status entry so a final summary can
        // still report their counters
    }

    /// Join every remaining worker, then close the result queue: the
    /// global end-of-processing signal for the result drain.
    pub fn join_all(&mut self) {
        defn!();
        loop {
            self.reap_finished();
            if self.live_workers() == 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        self.result_queue.close(false);
        defx!("{} unexpected exits", self.unexpected_exits);
    }

    /// Cooperative abort: set the flag and close both queues with
    /// `abort=true` so every blocked `pop` unblocks. In-flight tasks
    /// finish; no new tasks start.
    pub fn abort(&self) {
        defo!("abort requested");
        self.abort.store(true, Ordering::Relaxed);
        self.task_queue.close(true);
        self.result_queue.close(true);
    }
}
