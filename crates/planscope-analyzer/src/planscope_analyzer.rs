//! planscope analyzer - execution plan retrieval, assessment and reporting
//!
//! This crate provides functionality for:
//! - Generating an optimizer plan for a statement and reading it back from plan storage
//! - Parsing the tabular plan rendering and the optimizer's magnitude notation
//! - Assessing cost, cardinality and I/O-vs-CPU balance of a plan
//! - Rendering a fixed-layout diagnostic report

pub mod assessment;
pub mod config;
pub mod explain;
pub mod inspector;
pub mod logging;
pub mod report;

pub use assessment::*;
pub use config::{AnalysisMode, AnalyzerConfig};
pub use explain::*;
pub use inspector::{QueryInspector, capture_call_stack};
pub use report::*;
