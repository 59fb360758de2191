//! In-memory stand-in for an Oracle plan table
//!
//! Understands exactly the statements the analyzer issues: plan generation,
//! the rendering function, the two plan-table selects and the cleanup
//! delete. Every statement is recorded, and failures can be injected.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use planscope_core::{
    Connection, PlanSource, PlanscopeError, QueryResult, Result, StatementResult, Value,
};
use regex::Regex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

static EXPLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^EXPLAIN PLAN SET STATEMENT_ID = '([^']+)' INTO (\S+) FOR (.+)$")
        .expect("valid regex")
});

/// One plan-table row the fake writes on generation
#[derive(Debug, Clone, Default)]
pub struct PlanRow {
    pub id: u32,
    pub operation: &'static str,
    pub options: Option<&'static str>,
    pub object: Option<&'static str>,
    pub cost: Option<f64>,
    pub cardinality: Option<u64>,
    pub bytes: Option<u64>,
    pub cpu_cost: Option<f64>,
    pub io_cost: Option<f64>,
    pub time: Option<u64>,
    pub access: Option<&'static str>,
    pub filter: Option<&'static str>,
}

impl PlanRow {
    pub fn new(id: u32, operation: &'static str) -> Self {
        Self {
            id,
            operation,
            ..Default::default()
        }
    }

    pub fn options(mut self, options: &'static str) -> Self {
        self.options = Some(options);
        self
    }

    pub fn object(mut self, object: &'static str) -> Self {
        self.object = Some(object);
        self
    }

    pub fn estimates(mut self, cost: f64, cardinality: u64, bytes: u64) -> Self {
        self.cost = Some(cost);
        self.cardinality = Some(cardinality);
        self.bytes = Some(bytes);
        self
    }

    pub fn split(mut self, io_cost: f64, cpu_cost: f64, time: u64) -> Self {
        self.io_cost = Some(io_cost);
        self.cpu_cost = Some(cpu_cost);
        self.time = Some(time);
        self
    }

    pub fn access(mut self, predicate: &'static str) -> Self {
        self.access = Some(predicate);
        self
    }

    pub fn filter(mut self, predicate: &'static str) -> Self {
        self.filter = Some(predicate);
        self
    }

    fn full_operation(&self) -> String {
        match self.options {
            Some(options) => format!("{} {}", self.operation, options),
            None => self.operation.to_string(),
        }
    }
}

/// The employees/departments join used across tests
pub fn join_plan() -> Vec<PlanRow> {
    vec![
        PlanRow::new(0, "SELECT STATEMENT")
            .estimates(6.0, 106, 2_862)
            .split(5.0, 1_200_000.0, 1),
        PlanRow::new(1, "HASH")
            .options("JOIN")
            .estimates(6.0, 106, 2_862)
            .access(r#""E"."DEPARTMENT_ID"="D"."DEPARTMENT_ID""#),
        PlanRow::new(2, "TABLE ACCESS")
            .options("FULL")
            .object("DEPARTMENTS")
            .estimates(3.0, 27, 432),
        PlanRow::new(3, "TABLE ACCESS")
            .options("FULL")
            .object("EMPLOYEES")
            .estimates(3.0, 107, 1_177)
            .filter(r#""E"."SALARY">1000"#),
    ]
}

#[derive(Default)]
struct State {
    plan: Vec<PlanRow>,
    table: Vec<(String, PlanRow)>,
    statements: Vec<String>,
}

#[derive(Default)]
struct Flags {
    fail_generation: AtomicBool,
    fail_cleanup: AtomicBool,
    render_unavailable: AtomicBool,
    fail_render: AtomicBool,
}

/// Shared fake database; clones see the same plan table
#[derive(Clone, Default)]
pub struct FakeOracle {
    state: Arc<Mutex<State>>,
    flags: Arc<Flags>,
    acquired: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeOracle {
    /// Creates a fake whose optimizer always produces `plan`
    pub fn with_plan(plan: Vec<PlanRow>) -> Self {
        let fake = Self::default();
        fake.state.lock().plan = plan;
        fake
    }

    /// Generation writes its rows, then fails
    pub fn fail_generation(self) -> Self {
        self.flags.fail_generation.store(true, Ordering::SeqCst);
        self
    }

    /// The cleanup delete fails and leaves the rows behind
    pub fn fail_cleanup(self) -> Self {
        self.flags.fail_cleanup.store(true, Ordering::SeqCst);
        self
    }

    /// The rendering function returns no data rows
    pub fn render_unavailable(self) -> Self {
        self.flags.render_unavailable.store(true, Ordering::SeqCst);
        self
    }

    /// The rendering function raises a database error
    pub fn fail_render(self) -> Self {
        self.flags.fail_render.store(true, Ordering::SeqCst);
        self
    }

    /// Rows currently stored in the plan table
    pub fn stored_rows(&self) -> usize {
        self.state.lock().table.len()
    }

    /// Rows stored under `statement_id`
    pub fn rows_for(&self, statement_id: &str) -> usize {
        self.state
            .lock()
            .table
            .iter()
            .filter(|(id, _)| id == statement_id)
            .count()
    }

    /// Every statement issued so far
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    pub fn statements_matching(&self, needle: &str) -> usize {
        self.statements().iter().filter(|s| s.contains(needle)).count()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn statement_id(params: &[Value]) -> Result<String> {
        params
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlanscopeError::Query("ORA-01008: not all variables bound".into()))
    }

    fn rows_by_id(&self, statement_id: &str) -> Vec<PlanRow> {
        let mut rows: Vec<PlanRow> = self
            .state
            .lock()
            .table
            .iter()
            .filter(|(id, _)| id == statement_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    fn render(&self, statement_id: &str) -> Vec<String> {
        let rows = self.rows_by_id(statement_id);
        if rows.is_empty() || self.flags.render_unavailable.load(Ordering::SeqCst) {
            return vec![
                "Error: cannot fetch last explain plan from PLAN_TABLE".to_string(),
            ];
        }

        let rule = "-".repeat(86);
        let mut lines = vec![
            "Plan hash value: 2052257371".to_string(),
            String::new(),
            rule.clone(),
            "| Id  | Operation                    | Name        | Rows  | Bytes | Cost (%CPU)| Time     |"
                .to_string(),
            rule.clone(),
        ];
        for row in &rows {
            let marker = if row.access.is_some() || row.filter.is_some() {
                "*"
            } else {
                " "
            };
            lines.push(format!(
                "|{}{:>3} | {:<28} | {:<11} | {:>5} | {:>5} | {:>6} (0)| 00:00:01 |",
                marker,
                row.id,
                format!("{}{}", " ".repeat(row.id as usize), row.full_operation()),
                row.object.unwrap_or(""),
                row.cardinality.map(magnitude).unwrap_or_default(),
                row.bytes.map(magnitude).unwrap_or_default(),
                row.cost.map(|c| format!("{:.0}", c)).unwrap_or_default(),
            ));
        }
        lines.push(rule);

        let predicated: Vec<_> = rows
            .iter()
            .filter(|r| r.access.is_some() || r.filter.is_some())
            .collect();
        if !predicated.is_empty() {
            lines.push(String::new());
            lines.push("Predicate Information (identified by operation id):".to_string());
            lines.push("-".repeat(51));
            lines.push(String::new());
            for row in predicated {
                let mut first = true;
                for (kind, text) in [("access", row.access), ("filter", row.filter)] {
                    let Some(text) = text else { continue };
                    if first {
                        lines.push(format!("{:>4} - {}({})", row.id, kind, text));
                        first = false;
                    } else {
                        lines.push(format!("       {}({})", kind, text));
                    }
                }
            }
        }
        lines
    }
}

/// Renders counts the way the display function does
fn magnitude(value: u64) -> String {
    match value {
        v if v >= 100_000_000 => format!("{}M", v / 1_000_000),
        v if v >= 100_000 => format!("{}K", v / 1_000),
        v => v.to_string(),
    }
}

fn opt_f64(value: Option<f64>) -> Value {
    value.map(Value::Float64).unwrap_or(Value::Null)
}

fn opt_u64(value: Option<u64>) -> Value {
    value
        .map(|v| Value::Decimal(v.to_string()))
        .unwrap_or(Value::Null)
}

fn opt_str(value: Option<&str>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[async_trait]
impl Connection for FakeOracle {
    fn driver_name(&self) -> &str {
        "fake-oracle"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.state.lock().statements.push(sql.to_string());

        if let Some(captures) = EXPLAIN.captures(sql) {
            let statement_id = captures[1].to_string();
            let mut state = self.state.lock();
            let rows: Vec<_> = state
                .plan
                .iter()
                .cloned()
                .map(|row| (statement_id.clone(), row))
                .collect();
            state.table.extend(rows);
            if self.flags.fail_generation.load(Ordering::SeqCst) {
                return Err(PlanscopeError::Query(
                    "ORA-01039: insufficient privileges on underlying objects of the view".into(),
                ));
            }
            return Ok(StatementResult::default());
        }

        if sql.starts_with("DELETE FROM") {
            if self.flags.fail_cleanup.load(Ordering::SeqCst) {
                return Err(PlanscopeError::Query(
                    "ORA-00054: resource busy and acquire with NOWAIT specified".into(),
                ));
            }
            let statement_id = Self::statement_id(params)?;
            let mut state = self.state.lock();
            let before = state.table.len();
            state.table.retain(|(id, _)| *id != statement_id);
            return Ok(StatementResult {
                affected_rows: (before - state.table.len()) as u64,
            });
        }

        Err(PlanscopeError::Query(format!(
            "ORA-00900: invalid SQL statement: {}",
            sql
        )))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.state.lock().statements.push(sql.to_string());
        let statement_id = Self::statement_id(params)?;

        if sql.contains("DBMS_XPLAN.DISPLAY") {
            if self.flags.fail_render.load(Ordering::SeqCst) {
                return Err(PlanscopeError::Query(
                    "ORA-00904: \"DBMS_XPLAN\".\"DISPLAY\": invalid identifier".into(),
                ));
            }
            let rows = self
                .render(&statement_id)
                .into_iter()
                .map(|line| vec![Value::String(line)])
                .collect();
            return Ok(QueryResult::from_rows(columns(&["PLAN_TABLE_OUTPUT"]), rows));
        }

        let rows = self.rows_by_id(&statement_id);

        if sql.contains("AND ID = 0") {
            let rows = rows
                .iter()
                .filter(|r| r.id == 0)
                .map(|r| {
                    vec![
                        opt_f64(r.cost),
                        opt_u64(r.cardinality),
                        opt_u64(r.bytes),
                        opt_f64(r.cpu_cost),
                        opt_f64(r.io_cost),
                        opt_u64(r.time),
                    ]
                })
                .collect();
            return Ok(QueryResult::from_rows(
                columns(&["COST", "CARDINALITY", "BYTES", "CPU_COST", "IO_COST", "TIME"]),
                rows,
            ));
        }

        let rows = rows
            .iter()
            .map(|r| {
                vec![
                    Value::Decimal(r.id.to_string()),
                    Value::from(r.operation),
                    opt_str(r.options),
                    opt_str(r.object),
                    opt_f64(r.cost),
                    opt_u64(r.cardinality),
                    opt_u64(r.bytes),
                    opt_str(r.access),
                    opt_str(r.filter),
                ]
            })
            .collect();
        Ok(QueryResult::from_rows(
            columns(&[
                "ID",
                "OPERATION",
                "OPTIONS",
                "OBJECT_NAME",
                "COST",
                "CARDINALITY",
                "BYTES",
                "ACCESS_PREDICATES",
                "FILTER_PREDICATES",
            ]),
            rows,
        ))
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

#[async_trait]
impl PlanSource for FakeOracle {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}
