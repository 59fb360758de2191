//! Plan Storage Reader
//!
//! The optimizer writes explained plans into a shared plan table keyed by a
//! caller-chosen statement id. This module issues the plan-generation
//! statement, reads the rows back, and deletes them again.
//!
//! Steps are read with an ordered list of [`RetrievalStrategy`] values; the
//! first strategy that yields any step wins:
//!
//! 1. [`RetrievalStrategy::RenderedPlan`] parses the tabular text produced by
//!    `DBMS_XPLAN.DISPLAY`
//! 2. [`RetrievalStrategy::PlanTableColumns`] reads the plan table's columns
//!    directly
//!
//! The parent node (id 0) is read by a separate query so a summary analysis
//! never has to fetch child steps.

use crate::explain::plan::{ExecutionStep, NodeEstimate};
use crate::explain::plan_line::{PredicateCollector, attach_predicate, parse_plan_line};
use planscope_core::{Connection, PlanscopeError, Result, Row, Value};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Plan table used when none is configured
pub const DEFAULT_PLAN_TABLE: &str = "PLAN_TABLE";

/// Detail requested from the rendering function; yields the
/// `Id | Operation | Name | Rows | Bytes | Cost (%CPU)` layout plus predicates
const DISPLAY_FORMAT: &str = "BASIC +ROWS +BYTES +COST +PREDICATE";

/// Oracle's STATEMENT_ID column is VARCHAR2(30)
const MAX_STATEMENT_ID_LEN: usize = 30;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Identifier scoping one analysis's rows in the shared plan table
///
/// Combines a microsecond clock reading, a hash of the current thread id
/// and a process-wide sequence number, so concurrent analyses never share
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementId(String);

impl StatementId {
    /// Generates a fresh identifier
    pub fn generate() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
        let id = format!(
            "STMT_{:X}_{:04X}_{:04X}",
            micros,
            thread_discriminator(),
            sequence
        );
        debug_assert!(id.len() <= MAX_STATEMENT_ID_LEN);
        Self(id)
    }

    /// Returns the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StatementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn thread_discriminator() -> u16 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    (hasher.finish() & 0xFFFF) as u16
}

/// A way of reading plan steps back from plan storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Parse the tabular text produced by the rendering function
    RenderedPlan,
    /// Read the plan table's structured columns
    PlanTableColumns,
}

impl RetrievalStrategy {
    /// Returns the strategy name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RenderedPlan => "rendered_plan",
            Self::PlanTableColumns => "plan_table_columns",
        }
    }
}

/// Steps and parent estimate read for one statement id
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReadout {
    /// Steps in the order they were read
    pub steps: Vec<ExecutionStep>,
    /// Parent node estimate, if plan storage has an id 0 row
    pub parent: Option<NodeEstimate>,
    /// Strategy that produced the steps, if any did
    pub strategy: Option<RetrievalStrategy>,
}

/// Reads explained plans from a plan table
#[derive(Debug, Clone)]
pub struct PlanTableReader {
    table: String,
    strategies: Vec<RetrievalStrategy>,
}

impl Default for PlanTableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanTableReader {
    /// Creates a reader for the default plan table
    pub fn new() -> Self {
        Self {
            table: DEFAULT_PLAN_TABLE.to_string(),
            strategies: vec![
                RetrievalStrategy::RenderedPlan,
                RetrievalStrategy::PlanTableColumns,
            ],
        }
    }

    /// Uses a different plan table
    ///
    /// The name is interpolated into SQL, so only plain (optionally
    /// schema-qualified) identifiers are accepted.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(PlanscopeError::Configuration(format!(
                "invalid plan table name '{}'",
                table
            )));
        }
        self.table = table;
        Ok(self)
    }

    /// Replaces the ordered list of retrieval strategies
    pub fn with_strategies(mut self, strategies: Vec<RetrievalStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Returns the plan table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the retrieval strategies in the order they are tried
    pub fn strategies(&self) -> &[RetrievalStrategy] {
        &self.strategies
    }

    /// Asks the optimizer to explain `sql` into plan storage under `statement_id`
    pub async fn generate(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
        sql: &str,
    ) -> Result<()> {
        let statement = sql.trim().trim_end_matches(';').trim_end();
        let explain_sql = format!(
            "EXPLAIN PLAN SET STATEMENT_ID = '{}' INTO {} FOR {}",
            statement_id, self.table, statement
        );
        tracing::debug!(statement_id = %statement_id, "generating execution plan");
        conn.execute(&explain_sql, &[]).await?;
        Ok(())
    }

    /// Reads both the steps and the parent estimate
    pub async fn read(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<PlanReadout> {
        let (steps, strategy) = self.read_steps(conn, statement_id).await?;
        let parent = self.read_parent(conn, statement_id).await?;
        Ok(PlanReadout {
            steps,
            parent,
            strategy,
        })
    }

    /// Reads steps using the first strategy that yields any
    pub async fn read_steps(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<(Vec<ExecutionStep>, Option<RetrievalStrategy>)> {
        for strategy in &self.strategies {
            let steps = self.retrieve(*strategy, conn, statement_id).await?;
            if !steps.is_empty() {
                tracing::debug!(
                    statement_id = %statement_id,
                    strategy = strategy.as_str(),
                    steps = steps.len(),
                    "retrieved execution plan"
                );
                return Ok((steps, Some(*strategy)));
            }
            tracing::debug!(
                statement_id = %statement_id,
                strategy = strategy.as_str(),
                "strategy yielded no plan steps"
            );
        }
        Ok((Vec::new(), None))
    }

    /// Reads steps with a single strategy
    pub async fn retrieve(
        &self,
        strategy: RetrievalStrategy,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<Vec<ExecutionStep>> {
        match strategy {
            RetrievalStrategy::RenderedPlan => self.read_rendered(conn, statement_id).await,
            RetrievalStrategy::PlanTableColumns => self.read_columns(conn, statement_id).await,
        }
    }

    async fn read_rendered(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<Vec<ExecutionStep>> {
        let sql = format!(
            "SELECT PLAN_TABLE_OUTPUT FROM TABLE(DBMS_XPLAN.DISPLAY('{}', :1, '{}'))",
            self.table, DISPLAY_FORMAT
        );
        let result = conn.query(&sql, &[statement_param(statement_id)]).await?;
        let lines = result
            .rows
            .iter()
            .filter_map(|row| row.get(0).and_then(Value::as_str));
        Ok(steps_from_rendered_lines(lines))
    }

    async fn read_columns(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<Vec<ExecutionStep>> {
        let sql = format!(
            "SELECT ID, OPERATION, OPTIONS, OBJECT_NAME, COST, CARDINALITY, BYTES, \
             ACCESS_PREDICATES, FILTER_PREDICATES \
             FROM {} WHERE STATEMENT_ID = :1 ORDER BY ID",
            self.table
        );
        let result = conn.query(&sql, &[statement_param(statement_id)]).await?;
        Ok(result.rows.iter().map(step_from_row).collect())
    }

    /// Reads the parent node (id 0) estimate
    pub async fn read_parent(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
    ) -> Result<Option<NodeEstimate>> {
        let sql = format!(
            "SELECT COST, CARDINALITY, BYTES, CPU_COST, IO_COST, TIME \
             FROM {} WHERE STATEMENT_ID = :1 AND ID = 0",
            self.table
        );
        let result = conn.query(&sql, &[statement_param(statement_id)]).await?;
        Ok(result.rows.first().map(estimate_from_row))
    }

    /// Deletes every plan-storage row for `statement_id`
    ///
    /// Failures are logged and swallowed.
    pub async fn release(&self, conn: &dyn Connection, statement_id: &StatementId) {
        let sql = format!("DELETE FROM {} WHERE STATEMENT_ID = :1", self.table);
        match conn.execute(&sql, &[statement_param(statement_id)]).await {
            Ok(result) => tracing::trace!(
                statement_id = %statement_id,
                deleted = result.affected_rows,
                "released plan storage"
            ),
            Err(err) => tracing::warn!(
                statement_id = %statement_id,
                error = %err,
                "failed to clean up plan storage"
            ),
        }
    }

    /// Runs `work` against plan storage and releases `statement_id` afterwards
    ///
    /// Release happens whether `work` succeeds or fails, and the outcome of
    /// `work` is returned unchanged.
    pub async fn scoped<T, F>(
        &self,
        conn: &dyn Connection,
        statement_id: &StatementId,
        work: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = work.await;
        self.release(conn, statement_id).await;
        outcome
    }
}

fn statement_param(statement_id: &StatementId) -> Value {
    Value::String(statement_id.as_str().to_string())
}

/// Extracts steps and their predicates from rendered plan text
///
/// Separator and header lines are skipped, as are lines the row parser
/// rejects.
pub fn steps_from_rendered_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<ExecutionStep> {
    let mut steps = Vec::new();
    let mut predicates = PredicateCollector::new();

    for line in lines {
        if predicates.push_line(line) {
            continue;
        }
        if !line.contains('|') || line.contains("---") || line.contains("Id") {
            continue;
        }
        match parse_plan_line(line) {
            Some(step) => steps.push(step),
            None => tracing::trace!(line, "skipping unparsable plan line"),
        }
    }

    for (id, kind, text) in predicates.finish() {
        attach_predicate(&mut steps, id, kind, text);
    }
    steps
}

fn step_from_row(row: &Row) -> ExecutionStep {
    let operation = match (
        text_column(row, "OPERATION"),
        text_column(row, "OPTIONS"),
    ) {
        (Some(operation), Some(options)) => format!("{} {}", operation, options),
        (Some(operation), None) => operation,
        (None, _) => String::new(),
    };

    ExecutionStep {
        id: u32::try_from(count_column(row, "ID")).unwrap_or(u32::MAX),
        operation,
        object_name: text_column(row, "OBJECT_NAME"),
        cost: numeric_column(row, "COST"),
        cardinality: count_column(row, "CARDINALITY"),
        bytes: count_column(row, "BYTES"),
        access_predicates: text_column(row, "ACCESS_PREDICATES"),
        filter_predicates: text_column(row, "FILTER_PREDICATES"),
    }
}

fn estimate_from_row(row: &Row) -> NodeEstimate {
    NodeEstimate {
        cost: numeric_column(row, "COST"),
        cardinality: count_column(row, "CARDINALITY"),
        bytes: count_column(row, "BYTES"),
        cpu_cost: numeric_column(row, "CPU_COST"),
        io_cost: numeric_column(row, "IO_COST"),
        time_us: count_column(row, "TIME"),
    }
}

/// Reads a real-valued column; NULL, missing or non-numeric becomes 0.0
pub fn numeric_column(row: &Row, column: &str) -> f64 {
    row.get_by_name(column)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Reads a count column; NULL, missing, negative or non-numeric becomes 0
pub fn count_column(row: &Row, column: &str) -> u64 {
    row.get_by_name(column)
        .and_then(Value::as_i64)
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}

/// Reads a text column; NULL, missing or blank becomes `None`
pub fn text_column(row: &Row, column: &str) -> Option<String> {
    let text = match row.get_by_name(column)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        })
}
