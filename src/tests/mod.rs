// src/tests/mod.rs

//! Tests for _faelib_.
//!
//! Tests are placed at `src/tests/`, inside the `faelib`. The author
//! concluded this is a reasonable trade-off of separation and access.
//!
//! Tests placed at top-level path `tests/` do not have crate-internal
//! visibility. While it is recommended to not require internal visibility
//! for testing, in practice that often makes tests difficult or impossible
//! to implement.

pub mod classifier_tests;
pub mod common;
pub mod dpkg_tests;
pub mod event_tests;
pub mod pathspec_tests;
pub mod queue_tests;
pub mod syslog_tests;
