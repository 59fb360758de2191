//! Tests for the Plan Analyzer

use super::*;
use crate::explain::NodeEstimate;
use async_trait::async_trait;
use parking_lot::Mutex;
use planscope_core::{PlanscopeError, QueryResult, StatementResult, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock connection that serves a fixed rendering and records every statement
#[derive(Default)]
struct RecordingConnection {
    rendered: Vec<&'static str>,
    reject_explain: bool,
    statements: Mutex<Vec<String>>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.statements.lock().push(sql.to_string());
        if sql.starts_with("EXPLAIN PLAN") && self.reject_explain {
            return Err(PlanscopeError::Query("ORA-00942: table or view does not exist".into()));
        }
        Ok(StatementResult::default())
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.statements.lock().push(sql.to_string());
        if sql.contains("DBMS_XPLAN.DISPLAY") {
            let rows = self.rendered.iter().map(|l| vec![Value::from(*l)]).collect();
            return Ok(QueryResult::from_rows(vec!["PLAN_TABLE_OUTPUT".into()], rows));
        }
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_analyze_builds_plan_and_releases_storage() {
    let conn = RecordingConnection {
        rendered: vec![
            "| Id  | Operation          | Name | Rows | Bytes | Cost (%CPU)| Time     |",
            "|   0 | SELECT STATEMENT   |      |    1 |    13 |    50   (2)| 00:00:01 |",
            "|   1 |  SORT ORDER BY     |      |    1 |    13 |   200   (1)| 00:00:01 |",
        ],
        ..Default::default()
    };

    let plan = PlanAnalyzer::new()
        .analyze(&conn, "SELECT dummy FROM dual ORDER BY 1")
        .await
        .expect("analysis failed");

    assert!(plan.statement_id.starts_with("STMT_"));
    assert_eq!(plan.sql, "SELECT dummy FROM dual ORDER BY 1");
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.total_cost, 200.0);
    assert!(plan.parent.is_none());

    let statements = conn.statements.lock().clone();
    assert!(statements[0].starts_with("EXPLAIN PLAN SET STATEMENT_ID"));
    assert_eq!(
        statements.last().map(String::as_str),
        Some("DELETE FROM PLAN_TABLE WHERE STATEMENT_ID = :1")
    );
}

#[tokio::test]
async fn test_generation_failure_surfaces_after_cleanup() {
    let conn = RecordingConnection {
        reject_explain: true,
        ..Default::default()
    };

    let err = PlanAnalyzer::new()
        .analyze(&conn, "SELECT * FROM missing_table")
        .await
        .expect_err("generation should fail");

    assert_eq!(err.to_string(), "Query error: ORA-00942: table or view does not exist");
    let statements = conn.statements.lock().clone();
    assert_eq!(statements.len(), 2);
    assert!(statements[1].starts_with("DELETE FROM PLAN_TABLE"));
}

#[tokio::test]
async fn test_summary_without_parent_row_is_zeroed() {
    let conn = RecordingConnection::default();

    let summary = PlanAnalyzer::new()
        .analyze_summary(&conn, "SELECT 1 FROM dual")
        .await
        .expect("analysis failed");

    assert_eq!(summary.estimate, NodeEstimate::default());
    assert!(summary.sql.is_none());
    assert!(
        conn.statements
            .lock()
            .iter()
            .all(|s| !s.contains("DBMS_XPLAN"))
    );
}

#[tokio::test]
async fn test_each_analysis_uses_fresh_statement_id() {
    let conn = RecordingConnection::default();
    let analyzer = PlanAnalyzer::new();

    let first = analyzer.analyze(&conn, "SELECT 1 FROM dual").await.expect("analysis failed");
    let second = analyzer.analyze(&conn, "SELECT 1 FROM dual").await.expect("analysis failed");

    assert_ne!(first.statement_id, second.statement_id);
    assert!(first.is_empty());
}
