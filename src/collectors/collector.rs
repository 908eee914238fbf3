// src/collectors/collector.rs

//! The [`Collector`]: breadth-first discovery of every processable file
//! entry under a root, optionally filtered by [`FindSpec`]s, optionally
//! across volume-shadow snapshot stores, producing [`Task`]s onto the
//! bounded task queue.
//!
//! The traversal uses an explicit worklist, never the call stack:
//! evidence images can have directory depths that would blow a recursive
//! call stack.
//!
//! [`Collector`]: Collector
//! [`FindSpec`]: crate::collectors::findspec::FindSpec
//! [`Task`]: crate::engine::Task

use std::collections::{HashMap, HashSet, VecDeque};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Result;
use std::sync::atomic::Ordering;

use ::si_trace_print::{defn, defo, defx};

use crate::common::{AbortFlag, Count, FPath, ORPHAN_FILES_DIR};
use crate::collectors::classifier::classify_and_expand_recursive;
use crate::collectors::findspec::FindSpecs;
use crate::data::pathspec::PathSpecP;
use crate::de_wrn;
use crate::engine::queue::WorkQueue;
use crate::engine::{SessionId, Task, TaskId};
use crate::readers::resolver::{EntryStat, FileEntry, FileSystem, Resolver};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// shadow store selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which volume-shadow snapshot stores to walk after the primary volume.
/// Store numbers in this public selection are **1-based** (matching what
/// operators see in tooling); the engine translates to zero-based store
/// indexes internally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreSelection {
    None,
    All,
    Stores(Vec<usize>),
}

/// Translate a 1-based public [`StoreSelection`] to the zero-based store
/// indexes to open, given the backend's store count. Out-of-range store
/// numbers are dropped with a warning.
pub fn resolve_store_indexes(
    selection: &StoreSelection,
    store_count: usize,
) -> Vec<usize> {
    match selection {
        StoreSelection::None => Vec::new(),
        StoreSelection::All => (0..store_count).collect(),
        StoreSelection::Stores(numbers) => {
            let mut indexes: Vec<usize> = Vec::with_capacity(numbers.len());
            for number in numbers.iter() {
                if *number == 0 || *number > store_count {
                    de_wrn!("shadow store {} does not exist (have {})", number, store_count);
                    continue;
                }
                indexes.push(number - 1);
            }
            indexes
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug)]
pub struct CollectorOptions {
    pub session_id: SessionId,
    /// Emit a metadata task for each directory in addition to files.
    pub collect_directory_metadata: bool,
    /// Expand embedded containers (ZIP/TAR/GZIP) into member tasks.
    pub classify_containers: bool,
    pub stores: StoreSelection,
}

impl Default for CollectorOptions {
    fn default() -> CollectorOptions {
        CollectorOptions {
            session_id: 0,
            collect_directory_metadata: false,
            classify_containers: false,
            stores: StoreSelection::None,
        }
    }
}

/// Counters accumulated over one `collect` run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SummaryCollector {
    pub files_emitted: Count,
    pub directories_emitted: Count,
    pub members_emitted: Count,
    pub entries_skipped: Count,
    pub duplicates_suppressed: Count,
    pub subtrees_abandoned: Count,
    pub stores_walked: Count,
}

/// Breadth-first file discoverer. See the [module documentation].
///
/// [module documentation]: self
pub struct Collector {
    options: CollectorOptions,
    abort: AbortFlag,
    resolver: Resolver,
    task_seq: TaskId,
    /// Per-inode history of timestamp fingerprints already emitted,
    /// for duplicate suppression across shadow snapshots.
    fingerprints: HashMap<u64, HashSet<u64>>,
    pub summary: SummaryCollector,
}

impl Collector {
    pub fn new(
        options: CollectorOptions,
        abort: AbortFlag,
    ) -> Collector {
        Collector {
            options,
            abort,
            resolver: Resolver::new(),
            task_seq: 0,
            fingerprints: HashMap::new(),
            summary: SummaryCollector::default(),
        }
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Walk `fs` (and any selected shadow stores) and push every
    /// discovered `Task` onto `queue`. Signals end-of-input by closing
    /// `queue` exactly once, on completion or abort.
    pub fn collect(
        &mut self,
        fs: &dyn FileSystem,
        find_specs: Option<&FindSpecs>,
        queue: &WorkQueue<Task>,
    ) -> Result<()> {
        defn!();
        let result = self.collect_inner(fs, find_specs, queue);
        // end-of-input, exactly once
        queue.close(false);
        defx!("summary {:?}", self.summary);
        result
    }

    fn collect_inner(
        &mut self,
        fs: &dyn FileSystem,
        find_specs: Option<&FindSpecs>,
        queue: &WorkQueue<Task>,
    ) -> Result<()> {
        let root = fs.open_root()?;
        // single-file source: emit it directly, no walk
        if root.is_file() {
            self.emit_file(fs, root.as_ref(), queue, false);
            return Ok(());
        }
        // record fingerprints on the primary walk only if shadow stores
        // will be walked afterwards
        let store_count: usize = fs.shadow_store_count();
        let store_indexes: Vec<usize> = resolve_store_indexes(&self.options.stores, store_count);
        let dedupe_primary: bool = !store_indexes.is_empty();
        self.walk(fs, root, find_specs, queue, dedupe_primary)?;
        for store_index in store_indexes.into_iter() {
            if self.aborted() {
                defo!("abort observed between shadow stores");
                break;
            }
            let store_fs: Box<dyn FileSystem> = match fs.open_shadow_store(store_index) {
                Ok(val) => val,
                Err(err) => {
                    de_wrn!("cannot open shadow store index {}: {}", store_index, err);
                    continue;
                }
            };
            let store_root = store_fs.open_root()?;
            self.walk(store_fs.as_ref(), store_root, find_specs, queue, true)?;
            self.summary.stores_walked += 1;
        }
        Ok(())
    }

    /// Breadth-first walk from `root` using an explicit worklist.
    fn walk(
        &mut self,
        fs: &dyn FileSystem,
        root: Box<dyn FileEntry>,
        find_specs: Option<&FindSpecs>,
        queue: &WorkQueue<Task>,
        dedupe: bool,
    ) -> Result<()> {
        defn!("(dedupe {})", dedupe);
        let root_location: FPath = root.pathspec().location.clone();
        let mut worklist: VecDeque<(Box<dyn FileEntry>, usize)> = VecDeque::new();
        worklist.push_back((root, 0));
        'layers: while let Some((dir, dir_depth)) = worklist.pop_front() {
            if self.aborted() {
                defo!("abort observed between BFS layers");
                break;
            }
            let children: Vec<Box<dyn FileEntry>> = match dir.sub_entries() {
                Ok(val) => val,
                Err(err) => {
                    // abandon this subtree, continue the walk
                    de_wrn!("cannot enumerate {}: {}", dir.pathspec(), err);
                    self.summary.subtrees_abandoned += 1;
                    continue;
                }
            };
            for child in children.into_iter() {
                if self.aborted() {
                    defo!("abort observed between children");
                    break 'layers;
                }
                if child.is_symlink() || !child.is_allocated() {
                    defo!("skip symlink/non-allocated {}", child.pathspec());
                    self.summary.entries_skipped += 1;
                    continue;
                }
                if child.is_directory() {
                    if dir_depth == 0 && child.name() == ORPHAN_FILES_DIR {
                        defo!("skip reserved directory {}", ORPHAN_FILES_DIR);
                        self.summary.entries_skipped += 1;
                        continue;
                    }
                    if let Some(specs) = find_specs {
                        let rel: FPath = relative_location(&root_location, &child.pathspec().location);
                        let segments: Vec<&str> = rel.split('/').collect();
                        if !specs.iter().any(|spec| spec.matches_prefix(&segments)) {
                            defo!("prune directory {}", child.pathspec());
                            continue;
                        }
                    }
                    if self.options.collect_directory_metadata && find_specs.is_none() {
                        self.emit_task(child.pathspec().clone(), queue);
                        self.summary.directories_emitted += 1;
                    }
                    // defer contents to the next BFS layer
                    worklist.push_back((child, dir_depth + 1));
                    continue;
                }
                if child.is_device() || !child.is_file() {
                    defo!("skip non-file {}", child.pathspec());
                    self.summary.entries_skipped += 1;
                    continue;
                }
                if let Some(specs) = find_specs {
                    let rel: FPath = relative_location(&root_location, &child.pathspec().location);
                    let segments: Vec<&str> = rel.split('/').collect();
                    if !specs.iter().any(|spec| spec.matches(&segments)) {
                        continue;
                    }
                }
                self.emit_file(fs, child.as_ref(), queue, dedupe);
            }
        }
        defx!();
        Ok(())
    }

    /// Emit one file entry (and, when classification is enabled, its
    /// expanded container members) onto the task queue.
    fn emit_file(
        &mut self,
        fs: &dyn FileSystem,
        entry: &dyn FileEntry,
        queue: &WorkQueue<Task>,
        dedupe: bool,
    ) {
        if dedupe && self.suppress_duplicate(entry) {
            self.summary.duplicates_suppressed += 1;
            return;
        }
        let pathspec: PathSpecP = entry.pathspec().clone();
        self.emit_task(pathspec.clone(), queue);
        self.summary.files_emitted += 1;
        if self.options.classify_containers {
            let members: Vec<PathSpecP> =
                classify_and_expand_recursive(&mut self.resolver, fs, &pathspec, 0);
            for member in members.into_iter() {
                self.emit_task(member, queue);
                self.summary.members_emitted += 1;
            }
        }
    }

    fn emit_task(
        &mut self,
        pathspec: PathSpecP,
        queue: &WorkQueue<Task>,
    ) {
        self.task_seq += 1;
        let task = Task {
            session_id: self.options.session_id,
            task_id: self.task_seq,
            pathspec,
        };
        if queue.push(task).is_err() {
            defo!("task queue closed; dropping task");
        }
    }

    /// "Has this file changed since the last snapshot we scanned?"
    /// heuristic: a fingerprint over the stat timestamps, keyed by inode.
    /// Returns `true` when the fingerprint was already emitted for this
    /// inode. A content change that alters none of the four tracked
    /// timestamps is missed; that false negative is an accepted,
    /// documented limitation.
    fn suppress_duplicate(
        &mut self,
        entry: &dyn FileEntry,
    ) -> bool {
        let stat: EntryStat = match entry.stat() {
            Ok(val) => val,
            Err(_err) => {
                defo!("stat failed for {}; no suppression", entry.pathspec());
                return false;
            }
        };
        if stat.inode == 0 {
            // no stable identifier to key a history on
            return false;
        }
        let fingerprint: u64 = Self::fingerprint_entry(&stat);
        let history: &mut HashSet<u64> = self.fingerprints.entry(stat.inode).or_default();
        !history.insert(fingerprint)
    }

    /// Content-independent fingerprint from the available timestamp
    /// fields, each as seconds+subseconds, hashed together.
    fn fingerprint_entry(stat: &EntryStat) -> u64 {
        let mut hasher = DefaultHasher::new();
        stat.atime.hash(&mut hasher);
        stat.crtime.hash(&mut hasher);
        stat.mtime.hash(&mut hasher);
        stat.ctime.hash(&mut hasher);
        hasher.finish()
    }
}

/// The location of `entry` relative to `root_location`, `/`-separated.
fn relative_location(
    root_location: &FPath,
    location: &FPath,
) -> FPath {
    let stripped: &str = location
        .strip_prefix(root_location.as_str())
        .unwrap_or(location.as_str());
    stripped.trim_start_matches('/').to_string()
}
