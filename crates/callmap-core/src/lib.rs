//! Callmap Core: turns a directory of Python sources into a call/import graph.
//!
//! This crate contains the analysis logic: discovery, tree-sitter extraction with
//! lexical scope attribution, graph merging with deterministic identity rules, and
//! the rendering-friendly export.

pub mod config;
pub mod error;
pub mod graph;
pub mod languages;
pub mod output;
pub mod phases;
pub mod pipeline;
