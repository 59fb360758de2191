//! Execution Plan Model - Data structures for analyzed optimizer plans
//!
//! A detailed analysis produces an [`ExecutionPlan`] holding every step the
//! optimizer chose. A summary analysis produces an [`ExecutionSummary`]
//! carrying only the parent node's estimate.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Operation marker for a full table scan
pub const FULL_SCAN_MARKER: &str = "TABLE ACCESS FULL";

/// Operation marker for sort operations
pub const SORT_MARKER: &str = "SORT";

/// One row of a multi-step plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionStep {
    /// Step id, unique within a plan, defines display order
    pub id: u32,
    /// Operator name (e.g. "TABLE ACCESS FULL")
    pub operation: String,
    /// Table, index or view touched by this step
    pub object_name: Option<String>,
    /// Optimizer-estimated relative cost, 0 when not reported
    pub cost: f64,
    /// Optimizer-estimated row count
    pub cardinality: u64,
    /// Optimizer-estimated byte volume, 0 when not reported
    pub bytes: u64,
    /// Access predicate applied by this step
    pub access_predicates: Option<String>,
    /// Filter predicate applied by this step
    pub filter_predicates: Option<String>,
}

impl ExecutionStep {
    /// Creates a step with the given id and operation
    pub fn new(id: u32, operation: impl Into<String>) -> Self {
        Self {
            id,
            operation: operation.into(),
            object_name: None,
            cost: 0.0,
            cardinality: 0,
            bytes: 0,
            access_predicates: None,
            filter_predicates: None,
        }
    }

    /// Sets the object name
    pub fn with_object(mut self, object_name: impl Into<String>) -> Self {
        self.object_name = Some(object_name.into());
        self
    }

    /// Sets the cost
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the cardinality
    pub fn with_cardinality(mut self, cardinality: u64) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Sets the byte estimate
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    /// Sets the access predicate
    pub fn with_access_predicates(mut self, predicate: impl Into<String>) -> Self {
        self.access_predicates = Some(predicate.into());
        self
    }

    /// Sets the filter predicate
    pub fn with_filter_predicates(mut self, predicate: impl Into<String>) -> Self {
        self.filter_predicates = Some(predicate.into());
        self
    }

    /// Returns true if this step reads a whole table
    pub fn is_full_scan(&self) -> bool {
        self.operation.to_ascii_uppercase().contains(FULL_SCAN_MARKER)
    }

    /// Returns true if this step sorts its input
    pub fn is_sort(&self) -> bool {
        self.operation.to_ascii_uppercase().contains(SORT_MARKER)
    }

    /// Returns true if this step applies any predicate
    pub fn has_predicates(&self) -> bool {
        self.access_predicates.is_some() || self.filter_predicates.is_some()
    }
}

/// Cost estimate of a single plan node, usually the parent (id = 0)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeEstimate {
    /// Optimizer cost
    pub cost: f64,
    /// Estimated rows
    pub cardinality: u64,
    /// Estimated bytes
    pub bytes: u64,
    /// CPU component of the cost
    pub cpu_cost: f64,
    /// I/O component of the cost
    pub io_cost: f64,
    /// Optimizer elapsed-time estimate in microseconds
    pub time_us: u64,
}

/// Returns the plan's total cost: the largest positive step cost
///
/// Per-step costs are cumulative over their subtrees, so the most expensive
/// node already accounts for its children. Returns 0.0 when no step
/// reports a cost.
pub fn max_positive_cost(steps: &[ExecutionStep]) -> f64 {
    steps
        .iter()
        .map(|s| s.cost)
        .filter(|c| *c > 0.0)
        .fold(0.0, f64::max)
}

/// Represents a complete multi-step execution plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    /// Statement identifier the plan was stored under
    pub statement_id: String,
    /// SQL text that was explained
    pub sql: String,
    /// Steps ordered by id
    pub steps: Vec<ExecutionStep>,
    /// Largest positive step cost
    pub total_cost: f64,
    /// Parent node estimate, when plan storage reported one
    pub parent: Option<NodeEstimate>,
    /// Wall-clock duration of the analysis in milliseconds
    pub execution_time_ms: u64,
    /// Local time the plan was captured
    pub captured_at: NaiveDateTime,
    /// Caller stack at the time of analysis
    pub stack_trace: Option<String>,
}

impl ExecutionPlan {
    /// Creates a plan from steps in any order
    ///
    /// Steps are sorted by id; if two steps share an id only the first is
    /// kept.
    pub fn new(
        statement_id: impl Into<String>,
        sql: impl Into<String>,
        mut steps: Vec<ExecutionStep>,
    ) -> Self {
        let before = steps.len();
        steps.sort_by_key(|s| s.id);
        steps.dedup_by_key(|s| s.id);
        if steps.len() != before {
            tracing::debug!(
                dropped = before - steps.len(),
                "dropped plan steps with duplicate ids"
            );
        }

        let total_cost = max_positive_cost(&steps);
        Self {
            statement_id: statement_id.into(),
            sql: sql.into(),
            steps,
            total_cost,
            parent: None,
            execution_time_ms: 0,
            captured_at: Local::now().naive_local(),
            stack_trace: None,
        }
    }

    /// Sets the parent node estimate
    pub fn with_parent(mut self, parent: Option<NodeEstimate>) -> Self {
        self.parent = parent;
        self
    }

    /// Sets the analysis duration
    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// Sets the capture timestamp
    pub fn with_captured_at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Sets the caller stack text
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Returns the step with the given id
    pub fn step(&self, id: u32) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the estimated row count of the whole statement
    ///
    /// Prefers the parent estimate from plan storage, then the id 0 step.
    pub fn root_cardinality(&self) -> u64 {
        self.parent
            .map(|p| p.cardinality)
            .or_else(|| self.step(0).map(|s| s.cardinality))
            .unwrap_or(0)
    }

    /// Returns all steps that read a whole table
    pub fn full_scans(&self) -> Vec<&ExecutionStep> {
        self.steps.iter().filter(|s| s.is_full_scan()).collect()
    }

    /// Returns true if the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parent-node-only result of a summary analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    /// Statement identifier the plan was stored under
    pub statement_id: String,
    /// SQL text, when the caller chose to keep it
    pub sql: Option<String>,
    /// Parent node estimate (all zero if plan storage had no id 0 row)
    pub estimate: NodeEstimate,
    /// Wall-clock duration of the analysis in milliseconds
    pub analysis_time_ms: u64,
    /// Local time the summary was captured
    pub captured_at: NaiveDateTime,
    /// Caller stack at the time of analysis
    pub stack_trace: Option<String>,
}

impl ExecutionSummary {
    /// Creates a summary for the given statement id and estimate
    pub fn new(statement_id: impl Into<String>, estimate: NodeEstimate) -> Self {
        Self {
            statement_id: statement_id.into(),
            sql: None,
            estimate,
            analysis_time_ms: 0,
            captured_at: Local::now().naive_local(),
            stack_trace: None,
        }
    }

    /// Sets the SQL text
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Sets the analysis duration
    pub fn with_analysis_time(mut self, ms: u64) -> Self {
        self.analysis_time_ms = ms;
        self
    }

    /// Sets the capture timestamp
    pub fn with_captured_at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Sets the caller stack text
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}
