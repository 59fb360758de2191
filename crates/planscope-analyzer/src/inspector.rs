//! Query Inspector - Host-facing entry point
//!
//! Wires one statement through the whole pipeline: acquire a connection,
//! analyze, assess, format and emit the report according to
//! [`AnalyzerConfig`].

use crate::assessment::AssessmentEngine;
use crate::config::{AnalysisMode, AnalyzerConfig};
use crate::explain::PlanAnalyzer;
use crate::logging::REPORT_TARGET;
use crate::report::ReportFormatter;
use planscope_core::{Connection, PlanSource, Result};
use regex::Regex;
use std::backtrace::Backtrace;
use std::sync::LazyLock;

/// Statement prefixes the optimizer can explain
const ANALYZABLE_PREFIXES: [&str; 4] = ["SELECT", "INSERT", "UPDATE", "DELETE"];

/// Frames from these crates never appear in a captured call stack
const SKIPPED_FRAME_PREFIXES: [&str; 14] = [
    "planscope_analyzer::",
    "planscope_core::",
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "futures",
    "async_trait::",
    "test::",
    "backtrace::",
    "__rust",
    "rust_begin_unwind",
    "__libc",
    "_start",
];

static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("valid regex"));

static LOCATION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+at\s+(.+?)\s*$").expect("valid regex"));

static SYMBOL_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid regex"));

/// Analyzes statements for a host application
pub struct QueryInspector<S> {
    source: S,
    config: AnalyzerConfig,
    analyzer: PlanAnalyzer,
    engine: AssessmentEngine,
    formatter: ReportFormatter,
}

impl<S: PlanSource> QueryInspector<S> {
    /// Creates an inspector; fails if `config` does not validate
    pub fn new(source: S, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = PlanAnalyzer::with_reader(config.plan_table_reader()?);
        let engine = AssessmentEngine::with_thresholds(config.thresholds);
        Ok(Self {
            source,
            config,
            analyzer,
            engine,
            formatter: ReportFormatter::new(),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Returns true if `sql` is a statement worth explaining
    pub fn is_analyzable(sql: &str) -> bool {
        let head: String = sql
            .trim_start()
            .chars()
            .take(6)
            .collect::<String>()
            .to_ascii_uppercase();
        ANALYZABLE_PREFIXES.iter().any(|p| head == *p)
    }

    /// Analyzes `sql` and returns the report
    ///
    /// Returns `Ok(None)` when analysis is disabled or the statement is not
    /// analyzable. The connection is closed on every path.
    pub async fn inspect(&self, sql: &str) -> Result<Option<String>> {
        if !self.config.enabled || !Self::is_analyzable(sql) {
            return Ok(None);
        }

        let stack_trace = self
            .config
            .include_stack_trace
            .then(|| capture_call_stack(self.config.max_stack_frames))
            .filter(|s| !s.is_empty());

        let conn = self.source.acquire().await?;
        let driver = conn.driver_name().to_string();
        tracing::debug!(driver = %driver, mode = ?self.config.mode, "inspecting statement");

        let outcome = self.report(conn.as_ref(), sql, stack_trace).await;
        if conn.is_closed() {
            tracing::debug!(driver = %driver, "connection already closed by driver");
        } else if let Err(err) = conn.close().await {
            tracing::warn!(driver = %driver, error = %err, "failed to close analysis connection");
        }

        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(error = %err, "query analysis failed");
                return Err(err);
            }
        };
        self.emit(&report);
        Ok(Some(report))
    }

    async fn report(
        &self,
        conn: &dyn Connection,
        sql: &str,
        stack_trace: Option<String>,
    ) -> Result<String> {
        match self.config.mode {
            AnalysisMode::Detailed => {
                let mut plan = self.analyzer.analyze(conn, sql).await?;
                plan.stack_trace = stack_trace;
                let assessment = self.engine.assess(&plan);
                Ok(self.formatter.format_plan(&plan, &assessment))
            }
            AnalysisMode::Summary => {
                let mut summary = self.analyzer.analyze_summary(conn, sql).await?;
                if self.config.include_query_text {
                    summary.sql = Some(sql.to_string());
                }
                summary.stack_trace = stack_trace;
                let assessment = self.engine.assess(&summary);
                Ok(self.formatter.format_summary(&summary, &assessment))
            }
        }
    }

    fn emit(&self, report: &str) {
        if self.config.log_to_console {
            println!("{}", report);
        }
        if self.config.log_to_file {
            tracing::info!(target: REPORT_TARGET, "\n{}", report);
        }
    }
}

/// Renders the caller's stack as `  at <frame>` lines
///
/// Frames from this workspace, the standard library and the async runtime
/// are skipped; at most `max_frames` frames are kept. Returns an empty
/// string when symbols are unavailable.
pub fn capture_call_stack(max_frames: usize) -> String {
    let backtrace = Backtrace::force_capture().to_string();
    let mut frames: Vec<String> = Vec::new();
    let mut keep_location = false;

    for line in backtrace.lines() {
        if frames.len() >= max_frames && !keep_location {
            break;
        }
        if let Some(captures) = FRAME_LINE.captures(line) {
            let symbol = SYMBOL_HASH.replace(&captures[1], "").into_owned();
            keep_location = !is_skipped_frame(&symbol) && frames.len() < max_frames;
            if keep_location {
                frames.push(format!("  at {}", symbol));
            }
            continue;
        }
        if keep_location {
            if let (Some(captures), Some(last)) = (LOCATION_LINE.captures(line), frames.last_mut()) {
                last.push_str(&format!(" ({})", &captures[1]));
            }
            keep_location = false;
        }
    }

    frames.join("\n")
}

fn is_skipped_frame(symbol: &str) -> bool {
    let symbol = symbol.trim_start_matches('<');
    SKIPPED_FRAME_PREFIXES.iter().any(|p| symbol.starts_with(p))
}

#[cfg(test)]
mod tests;
