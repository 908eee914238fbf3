// src/data/mod.rs

//! The `data` module is the plain data containers of the engine:
//! [`PathSpec`]s, [`EventData`] records, and datetime value helpers.
//!
//! [`PathSpec`]: crate::data::pathspec::PathSpec
//! [`EventData`]: crate::data::event::EventData

pub mod datetime;
pub mod event;
pub mod pathspec;
