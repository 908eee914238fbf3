// src/common.rs
//
// common imports, type aliases, and other globals (avoids circular imports)

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// file-handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `F`ile `Path`, the printable location string of one path-spec segment
pub type FPath = String;

/// Size of a file in bytes
pub type FileSz = u64;

/// Sequence of bytes
pub type Bytes = Vec<u8>;

/// A general-purpose counter
pub type Count = u64;

/// Cooperative abort flag shared by the collector, the workers, and the
/// signal handler. Set once, never cleared.
pub type AbortFlag = Arc<AtomicBool>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// global tunables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Maximum depth of nested container expansion
/// ("file inside archive inside archive…").
/// Hard cutoff; expansion beyond this depth yields nothing.
pub const MAX_FILE_DEPTH: usize = 3;

/// Maximum accepted length of one physical text line in bytes.
/// A line at this cap is processed but noted as a diagnostic.
pub const MAX_LINE_SZ: usize = 16384;

/// Capacity of the per-worker cache of open container filesystem handles.
pub const FILE_SYSTEM_CACHE_SZ: usize = 3;

/// Default capacity of the bounded task queue (collector → workers).
pub const TASK_QUEUE_SZ: usize = 512;

/// Default capacity of the bounded result queue (workers → storage writer).
pub const RESULT_QUEUE_SZ: usize = 2048;

/// Name of the virtual directory some filesystem backends synthesize at the
/// volume root for unallocated ("orphaned") file entries. Never walked.
pub const ORPHAN_FILES_DIR: &str = "$OrphanFiles";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// custom Result enum for search-like functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `Result` extended with an explicit "nothing left, and that is fine" state.
/// Used by functions that repeatedly retrieve the next item of a sequence
/// (queue pops, record finds) where exhaustion is not an error.
#[derive(Debug, PartialEq)]
pub enum ResultFind<T, E> {
    /// Contains the success data
    Found(T),
    /// Sequence exhausted, or other condition that means "Done";
    /// nothing to return but no bad errors happened
    Done,
    /// Contains the error value, something bad happened
    Err(E),
}

impl<T, E> ResultFind<T, E> {
    /// Returns `true` if the result is [`Found`] or [`Done`].
    #[must_use = "if you intended to assert that this is ok, consider `.unwrap()` instead"]
    #[inline(always)]
    pub const fn is_ok(&self) -> bool {
        matches!(*self, ResultFind::Found(_) | ResultFind::Done)
    }

    /// Returns `true` if the result is [`Found`].
    #[inline(always)]
    pub const fn is_found(&self) -> bool {
        matches!(*self, ResultFind::Found(_))
    }

    /// Returns `true` if the result is [`Err`].
    #[must_use = "if you intended to assert that this is err, consider `.unwrap_err()` instead"]
    #[inline(always)]
    pub const fn is_err(&self) -> bool {
        matches!(*self, ResultFind::Err(_))
    }

    /// Returns `true` if the result is [`Done`].
    #[inline(always)]
    pub const fn is_done(&self) -> bool {
        matches!(*self, ResultFind::Done)
    }

    /// Converts from `ResultFind<T, E>` to [`Option<T>`], consuming `self`
    /// and discarding any error.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn ok(self) -> Option<T> {
        match self {
            ResultFind::Found(x) => Some(x),
            ResultFind::Done => None,
            ResultFind::Err(_) => None,
        }
    }

    /// Converts from `ResultFind<T, E>` to [`Option<E>`], consuming `self`
    /// and discarding any success value.
    #[allow(dead_code)]
    #[inline(always)]
    pub fn err(self) -> Option<E> {
        match self {
            ResultFind::Found(_) => None,
            ResultFind::Done => None,
            ResultFind::Err(x) => Some(x),
        }
    }
}

impl<T, E> std::fmt::Display for ResultFind<T, E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultFind::Found(_) => write!(f, "ResultFind::Found"),
            ResultFind::Done => write!(f, "ResultFind::Done"),
            ResultFind::Err(err) => write!(f, "ResultFind::Err({})", err),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// newline helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single-byte newline char as u8
#[allow(non_upper_case_globals)]
pub const NLu8: u8 = b'\n';
