// src/lib.rs

pub mod common;
pub mod collectors;
pub mod data;
pub mod debug;
pub mod engine;
pub mod parsers;
pub mod readers;
#[cfg(test)]
pub mod tests;
