//! Tests for the Query Inspector

use super::*;
use async_trait::async_trait;
use planscope_core::{PlanscopeError, QueryResult, StatementResult, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

struct EmptyConnection {
    closed: AtomicBool,
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for EmptyConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::default())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock source that counts acquisitions
#[derive(Default)]
struct CountingSource {
    acquired: AtomicUsize,
    close_calls: Arc<AtomicUsize>,
    unavailable: bool,
    closed_by_driver: bool,
}

#[async_trait]
impl PlanSource for CountingSource {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(PlanscopeError::Connection("pool exhausted".into()));
        }
        Ok(Arc::new(EmptyConnection {
            closed: AtomicBool::new(self.closed_by_driver),
            close_calls: Arc::clone(&self.close_calls),
        }))
    }
}

fn enabled_config() -> AnalyzerConfig {
    AnalyzerConfig::new()
        .with_enabled(true)
        .with_log_to_console(false)
        .with_include_stack_trace(false)
}

#[test]
fn test_is_analyzable() {
    type Inspector = QueryInspector<CountingSource>;

    assert!(Inspector::is_analyzable("SELECT * FROM emp"));
    assert!(Inspector::is_analyzable("  \n select 1 from dual"));
    assert!(Inspector::is_analyzable("Insert into t values (1)"));
    assert!(Inspector::is_analyzable("update t set a = 1"));
    assert!(Inspector::is_analyzable("DELETE FROM t"));
    assert!(!Inspector::is_analyzable("CREATE TABLE t (a NUMBER)"));
    assert!(!Inspector::is_analyzable("BEGIN proc; END;"));
    assert!(!Inspector::is_analyzable("SEL"));
    assert!(!Inspector::is_analyzable(""));
}

#[test]
fn test_invalid_config_rejected() {
    let result = QueryInspector::new(
        CountingSource::default(),
        enabled_config().with_plan_table("bad name"),
    );
    assert!(matches!(result, Err(PlanscopeError::Configuration(_))));
}

#[tokio::test]
async fn test_disabled_inspector_does_nothing() {
    let inspector = QueryInspector::new(CountingSource::default(), AnalyzerConfig::default())
        .expect("valid config");

    let report = inspector.inspect("SELECT 1 FROM dual").await.expect("inspect failed");

    assert!(report.is_none());
    assert_eq!(inspector.source.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_analyzable_statement_skipped() {
    let inspector =
        QueryInspector::new(CountingSource::default(), enabled_config()).expect("valid config");

    let report = inspector.inspect("COMMIT").await.expect("inspect failed");

    assert!(report.is_none());
    assert_eq!(inspector.source.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_acquire_failure_propagates() {
    let source = CountingSource {
        unavailable: true,
        ..Default::default()
    };
    let inspector = QueryInspector::new(source, enabled_config()).expect("valid config");

    let err = inspector
        .inspect("SELECT 1 FROM dual")
        .await
        .expect_err("acquire should fail");

    assert!(matches!(err, PlanscopeError::Connection(_)));
}

#[tokio::test]
async fn test_summary_mode_report() {
    let config = enabled_config().with_mode(AnalysisMode::Summary);
    let inspector = QueryInspector::new(CountingSource::default(), config).expect("valid config");

    let report = inspector
        .inspect("SELECT * FROM emp")
        .await
        .expect("inspect failed")
        .expect("report produced");

    assert!(report.contains("QUERY PLAN SUMMARY"));
    assert!(report.contains("SQL QUERY:\n"));
    assert!(!report.contains("CALL STACK:"));
}

#[tokio::test]
async fn test_connection_closed_after_inspection() {
    let inspector =
        QueryInspector::new(CountingSource::default(), enabled_config()).expect("valid config");

    inspector.inspect("SELECT 1 FROM dual").await.expect("inspect failed");

    assert_eq!(inspector.source.close_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_closed_by_driver_is_not_closed_again() {
    let source = CountingSource {
        closed_by_driver: true,
        ..Default::default()
    };
    let inspector = QueryInspector::new(source, enabled_config()).expect("valid config");

    let report = inspector.inspect("SELECT 1 FROM dual").await.expect("inspect failed");

    assert!(report.is_some());
    assert_eq!(inspector.source.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(inspector.source.close_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_capture_call_stack_shape() {
    let stack = capture_call_stack(3);

    let lines: Vec<_> = stack.lines().collect();
    assert!(lines.len() <= 3);
    for line in lines {
        assert!(line.starts_with("  at "), "unexpected frame line {:?}", line);
        assert!(!line.contains("planscope_analyzer::"));
        assert!(!line.starts_with("  at std::"));
    }
    assert!(capture_call_stack(0).is_empty());
}

#[test]
fn test_skipped_frames() {
    assert!(is_skipped_frame("std::rt::lang_start"));
    assert!(is_skipped_frame(
        "<core::pin::Pin<P> as core::future::future::Future>::poll"
    ));
    assert!(is_skipped_frame("tokio::runtime::park::CachedParkThread::block_on"));
    assert!(!is_skipped_frame("orders_service::handlers::list_orders"));
}
