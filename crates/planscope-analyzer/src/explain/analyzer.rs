//! Plan Analyzer - Runs one analysis against plan storage
//!
//! Each call generates a fresh [`StatementId`], explains the statement into
//! plan storage, reads the result back and releases the storage rows on
//! every exit path.

use crate::explain::plan::{ExecutionPlan, ExecutionSummary};
use crate::explain::plan_table::{PlanTableReader, StatementId};
use planscope_core::{Connection, Result};
use std::time::Instant;

/// Orchestrates detailed and summary plan analyses
#[derive(Debug, Clone, Default)]
pub struct PlanAnalyzer {
    reader: PlanTableReader,
}

impl PlanAnalyzer {
    /// Creates an analyzer reading the default plan table
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer with a custom plan storage reader
    pub fn with_reader(reader: PlanTableReader) -> Self {
        Self { reader }
    }

    /// Returns the plan storage reader
    pub fn reader(&self) -> &PlanTableReader {
        &self.reader
    }

    /// Produces the full multi-step plan for `sql`
    ///
    /// Database errors from generation or retrieval are returned unchanged.
    /// An empty plan is not an error.
    pub async fn analyze(&self, conn: &dyn Connection, sql: &str) -> Result<ExecutionPlan> {
        let statement_id = StatementId::generate();
        let started = Instant::now();

        let readout = self
            .reader
            .scoped(conn, &statement_id, async {
                self.reader.generate(conn, &statement_id, sql).await?;
                self.reader.read(conn, &statement_id).await
            })
            .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if readout.steps.is_empty() {
            tracing::warn!(statement_id = %statement_id, "plan storage returned no steps");
        }

        let plan = ExecutionPlan::new(statement_id.as_str(), sql, readout.steps)
            .with_parent(readout.parent)
            .with_execution_time(elapsed_ms);

        tracing::debug!(
            statement_id = %statement_id,
            steps = plan.steps.len(),
            total_cost = plan.total_cost,
            elapsed_ms,
            "analyzed execution plan"
        );
        Ok(plan)
    }

    /// Produces only the parent node estimate for `sql`
    ///
    /// When plan storage has no id 0 row the estimate is all zeros.
    pub async fn analyze_summary(
        &self,
        conn: &dyn Connection,
        sql: &str,
    ) -> Result<ExecutionSummary> {
        let statement_id = StatementId::generate();
        let started = Instant::now();

        let parent = self
            .reader
            .scoped(conn, &statement_id, async {
                self.reader.generate(conn, &statement_id, sql).await?;
                self.reader.read_parent(conn, &statement_id).await
            })
            .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if parent.is_none() {
            tracing::debug!(statement_id = %statement_id, "no parent node in plan storage");
        }

        let summary = ExecutionSummary::new(statement_id.as_str(), parent.unwrap_or_default())
            .with_analysis_time(elapsed_ms);

        tracing::debug!(
            statement_id = %statement_id,
            cost = summary.estimate.cost,
            cardinality = summary.estimate.cardinality,
            elapsed_ms,
            "analyzed execution plan summary"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests;
