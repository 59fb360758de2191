//! Execution Plan Module
//!
//! This module acquires and parses optimizer execution plans:
//! - Magnitude notation used in the tabular rendering (`1.2K`, `3M`)
//! - Rows of the pipe-delimited tabular rendering
//! - Structured plan-storage rows, with the rendering as the primary source
//! - Orchestration of a single analysis with guaranteed plan-storage cleanup
//!
//! # Example
//!
//! ```
//! use planscope_analyzer::explain::{parse_notation, parse_plan_line};
//!
//! assert_eq!(parse_notation("1.2K").unwrap(), 1_200);
//!
//! let step = parse_plan_line("|*  2 |   INDEX RANGE SCAN | EMP_IDX | 10 | 130 | 1 (0)| 00:00:01 |").unwrap();
//! assert_eq!(step.id, 2);
//! assert_eq!(step.object_name.as_deref(), Some("EMP_IDX"));
//! ```

pub mod analyzer;
pub mod notation;
pub mod plan;
pub mod plan_line;
pub mod plan_table;

pub use analyzer::PlanAnalyzer;
pub use notation::{NotationError, parse_notation, parse_or_zero};
pub use plan::{ExecutionPlan, ExecutionStep, ExecutionSummary, NodeEstimate};
pub use plan_line::{
    PredicateCollector, PredicateKind, attach_predicate, parse_plan_line,
    parse_predicate_continuation, parse_predicate_line,
};
pub use plan_table::{
    PlanReadout, PlanTableReader, RetrievalStrategy, StatementId, DEFAULT_PLAN_TABLE,
};
