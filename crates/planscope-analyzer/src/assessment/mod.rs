//! Performance Assessment Module
//!
//! This module derives qualitative performance signals from an analyzed plan
//! or plan summary: cost and cardinality tiers, the I/O versus CPU balance of
//! the parent node, and per-step warnings such as full table scans and
//! expensive sorts. Every signal carries canned recommendation text.

mod engine;

pub use engine::*;
