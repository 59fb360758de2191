//! Connection and plan source traits

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection
///
/// This is the whole contract the analyzer needs: run a statement, run a
/// query, and give the connection back. Pooling, transactions and driver
/// specifics stay with the implementor.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "oracle")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows (EXPLAIN PLAN, DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Supplies a live connection for each analysis
///
/// The caller owns the returned connection for the duration of one
/// analysis and closes it afterwards.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Acquire a connection
    async fn acquire(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: PlanSource + ?Sized> PlanSource for Arc<T> {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        (**self).acquire().await
    }
}
